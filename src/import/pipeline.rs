//! The six-stage import run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::batch::{ms_per_record, BatchReport};
use super::dataset::Dataset;
use super::linker::{genre_links, link_rows, rating_link, tag_link};
use super::loader::{
    collect_genres, collect_movies, collect_users, genre_properties, load_vertices,
    movie_properties, user_properties,
};
use super::schema::{
    movielens_schema, reset_dataset, reset_edge_type, reset_vertex_type, DatasetSchema, GENRE,
    IS_GENRE, MOVIE, RATE, TAG, USER,
};
use crate::config::ImportOptions;
use crate::error::{ImportError, ImportResult};
use crate::graph::{EdgeType, Label};
use crate::session::GraphSession;

/// One step of an import run, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    AddGenres,
    AddUsers,
    AddMovies,
    ConnectMoviesWithGenres,
    RateMovies,
    TagMovies,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::AddGenres,
        Stage::AddUsers,
        Stage::AddMovies,
        Stage::ConnectMoviesWithGenres,
        Stage::RateMovies,
        Stage::TagMovies,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::AddGenres => "AddGenres",
            Stage::AddUsers => "AddUsers",
            Stage::AddMovies => "AddMovies",
            Stage::ConnectMoviesWithGenres => "ConnectMoviesWithGenres",
            Stage::RateMovies => "RateMovies",
            Stage::TagMovies => "TagMovies",
        }
    }

    /// The vertex or edge type this stage fills
    pub fn type_name(&self) -> &'static str {
        match self {
            Stage::AddGenres => GENRE,
            Stage::AddUsers => USER,
            Stage::AddMovies => MOVIE,
            Stage::ConnectMoviesWithGenres => IS_GENRE,
            Stage::RateMovies => RATE,
            Stage::TagMovies => TAG,
        }
    }

    pub fn creates_edges(&self) -> bool {
        matches!(
            self,
            Stage::ConnectMoviesWithGenres | Stage::RateMovies | Stage::TagMovies
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When the dataset's types are dropped and declared again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetMode {
    /// All types once, before the first stage
    #[default]
    RunStart,
    /// Each stage resets its own type when it starts
    PerStage,
}

impl FromStr for ResetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run-start" | "run_start" => Ok(ResetMode::RunStart),
            "per-stage" | "per_stage" => Ok(ResetMode::PerStage),
            other => Err(format!(
                "unknown reset mode '{}', expected run-start or per-stage",
                other
            )),
        }
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub report: BatchReport,
    /// Instances of the stage's type present afterwards
    pub count: usize,
    pub elapsed: Duration,
}

impl StageReport {
    pub fn ms_per_record(&self) -> f64 {
        ms_per_record(self.elapsed, self.count)
    }
}

/// Outcome of a whole run, one report per completed stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    pub fn total(&self) -> BatchReport {
        let mut total = BatchReport::default();
        for stage in &self.stages {
            total += stage.report;
        }
        total
    }

    pub fn elapsed(&self) -> Duration {
        self.stages.iter().map(|stage| stage.elapsed).sum()
    }
}

/// Imports a MovieLens dataset through one session
pub struct Pipeline<'a, S: GraphSession + ?Sized> {
    session: &'a mut S,
    dataset: Dataset,
    schema: DatasetSchema,
    options: ImportOptions,
}

impl<'a, S: GraphSession + ?Sized> Pipeline<'a, S> {
    pub fn new(session: &'a mut S, dataset: Dataset, options: ImportOptions) -> Self {
        Self {
            session,
            dataset,
            schema: movielens_schema(),
            options,
        }
    }

    /// Run every stage in order. The first error aborts the run; stages
    /// that already finished keep their committed data.
    pub fn run(&mut self) -> ImportResult<RunReport> {
        info!(
            "Importing MovieLens dataset from {:?} ({:?}, {:?} links, {:?} reset)",
            self.dataset.root(),
            self.options.commit,
            self.options.link_mode,
            self.options.reset
        );

        if self.options.reset == ResetMode::RunStart {
            reset_dataset(&mut *self.session, &self.schema)?;
        }

        let mut run = RunReport::default();
        for stage in Stage::ALL {
            run.stages.push(self.run_stage(stage)?);
        }

        let total = run.total();
        info!(
            "Import finished in {} ms: {} inserted, {} skipped, {} failed",
            run.elapsed().as_millis(),
            total.inserted,
            total.skipped,
            total.failed
        );
        Ok(run)
    }

    /// Run a single stage
    pub fn run_stage(&mut self, stage: Stage) -> ImportResult<StageReport> {
        info!("{}: started", stage);
        if self.options.reset == ResetMode::PerStage {
            self.reset_stage_type(stage)?;
        }

        let start = Instant::now();
        let (report, count) = match self.load_stage(stage) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.abandon_stage(stage);
                return Err(e);
            }
        };
        let elapsed = start.elapsed();

        let stage_report = StageReport {
            stage,
            report,
            count,
            elapsed,
        };
        info!(
            "{} finished [{} in {} ms ({:.3} ms/record)]",
            stage,
            count,
            elapsed.as_millis(),
            stage_report.ms_per_record()
        );
        if report.skipped > 0 || report.failed > 0 {
            info!("{}: {} skipped, {} failed", stage, report.skipped, report.failed);
        }
        Ok(stage_report)
    }

    /// Write one stage's vertices or edges; returns its report and the
    /// number of instances of its type afterwards
    fn load_stage(&mut self, stage: Stage) -> ImportResult<(BatchReport, usize)> {
        let policy = self.options.commit;
        let mode = self.options.link_mode;
        let session = &mut *self.session;

        let loaded = match stage {
            Stage::AddGenres => {
                let genres = collect_genres(self.dataset.movies()?)?;
                info!("{} distinct genres read from movies", genres.len());
                let outcome = load_vertices(
                    &mut *session,
                    &Label::new(GENRE),
                    genres.into_iter().map(genre_properties),
                    policy,
                )?;
                (outcome.report, outcome.count)
            }
            Stage::AddUsers => {
                let users = collect_users(self.dataset.ratings()?)?;
                info!("{} distinct users read from ratings", users.len());
                let outcome = load_vertices(
                    &mut *session,
                    &Label::new(USER),
                    users.into_iter().map(user_properties),
                    policy,
                )?;
                (outcome.report, outcome.count)
            }
            Stage::AddMovies => {
                let movies = collect_movies(self.dataset.movies()?)?;
                info!("{} distinct movies read from movies", movies.len());
                let outcome = load_vertices(
                    &mut *session,
                    &Label::new(MOVIE),
                    movies.into_iter().map(|(id, title)| movie_properties(id, title)),
                    policy,
                )?;
                (outcome.report, outcome.count)
            }
            Stage::ConnectMoviesWithGenres => {
                let edge_type = EdgeType::new(IS_GENRE);
                let rows = self.dataset.movies()?;
                let report = link_rows(&mut *session, &edge_type, rows, genre_links, mode, policy)?;
                (report, session.count_edges(&edge_type)?)
            }
            Stage::RateMovies => {
                let edge_type = EdgeType::new(RATE);
                let rows = self.dataset.ratings()?;
                let report = link_rows(&mut *session, &edge_type, rows, rating_link, mode, policy)?;
                (report, session.count_edges(&edge_type)?)
            }
            Stage::TagMovies => {
                let edge_type = EdgeType::new(TAG);
                let rows = self.dataset.tags()?;
                let report = link_rows(&mut *session, &edge_type, rows, tag_link, mode, policy)?;
                (report, session.count_edges(&edge_type)?)
            }
        };
        Ok(loaded)
    }

    /// Roll back whatever a failed stage left uncommitted
    fn abandon_stage(&mut self, stage: Stage) {
        let pending = self.session.pending_writes();
        if pending == 0 {
            return;
        }
        warn!("{} failed, rolling back {} uncommitted writes", stage, pending);
        if let Err(e) = self.session.rollback() {
            warn!("{}: rollback after failure failed: {}", stage, e);
        }
    }

    fn reset_stage_type(&mut self, stage: Stage) -> ImportResult<()> {
        let name = stage.type_name();
        let missing = || ImportError::Config(format!("no type definition for {}", name));

        if stage.creates_edges() {
            let def = self.schema.edge_type(name).ok_or_else(missing)?;
            reset_edge_type(&mut *self.session, def)?;
        } else {
            let def = self.schema.vertex_type(name).ok_or_else(missing)?;
            reset_vertex_type(&mut *self.session, def)?;
        }
        Ok(())
    }
}

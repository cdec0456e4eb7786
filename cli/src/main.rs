//! lensgraph-import: load a MovieLens dataset into a graph database
//!
//! Positional arguments override, in order, the database URL, user name,
//! password, pool min, pool max and dataset directory.

use anyhow::Context;
use clap::{ArgAction, Parser};
use comfy_table::{ContentArrangement, Table};
use lensgraph::config::ImportConfig;
use lensgraph::import::{CommitPolicy, Dataset, LinkMode, Pipeline, ResetMode, RunReport};
use lensgraph::session::GraphFactory;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(
    name = "lensgraph-import",
    version,
    about = "Import the MovieLens dataset into a graph database"
)]
struct Cli {
    /// Database URL (memory:<name> or plocal:<dir>)
    url: Option<String>,

    /// User name
    username: Option<String>,

    /// Password
    password: Option<String>,

    /// Minimum number of pooled sessions
    pool_min: Option<String>,

    /// Maximum number of pooled sessions
    pool_max: Option<String>,

    /// Directory holding movies.csv, ratings.csv and tags.csv
    dataset: Option<String>,

    /// YAML configuration file
    #[arg(long, env = "LENSGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Commit after this many records
    #[arg(long, conflicts_with = "random_commit")]
    batch_size: Option<usize>,

    /// Commit at random, once in this many records on average
    #[arg(long)]
    random_commit: Option<u32>,

    /// Seed for --random-commit
    #[arg(long, requires = "random_commit")]
    seed: Option<u64>,

    /// Fail when an edge endpoint cannot be found instead of skipping it
    #[arg(long)]
    strict: bool,

    /// When to drop and recreate the dataset's types (run-start or per-stage)
    #[arg(long)]
    reset: Option<ResetMode>,

    /// Output format
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl Cli {
    /// Positional arguments up to the first one left out
    fn positional(&self) -> Vec<String> {
        [
            &self.url,
            &self.username,
            &self.password,
            &self.pool_min,
            &self.pool_max,
            &self.dataset,
        ]
        .into_iter()
        .map_while(|arg| arg.clone())
        .collect()
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    info!("lensgraph-import {}", lensgraph::VERSION);

    let mut config = match &cli.config {
        Some(path) => ImportConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ImportConfig::default(),
    };

    config.apply_positional(&cli.positional())?;
    if let Some(size) = cli.batch_size {
        config.import.commit = CommitPolicy::EveryN { size };
    }
    if let Some(one_in) = cli.random_commit {
        config.import.commit = CommitPolicy::Random {
            one_in,
            seed: cli.seed,
        };
    }
    if cli.strict {
        config.import.link_mode = LinkMode::Strict;
    }
    if let Some(reset) = cli.reset {
        config.import.reset = reset;
    }
    config.validate()?;

    let factory = GraphFactory::open(&config.store)
        .with_context(|| format!("opening database {}", config.store.url))?;
    let mut session = factory.session()?;

    let dataset = Dataset::new(&config.dataset_path);
    let report = Pipeline::new(&mut session, dataset, config.import).run()?;
    session.close()?;

    print_report(&report, &cli.format)
}

fn print_report(report: &RunReport, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let stages: Vec<_> = report
                .stages
                .iter()
                .map(|stage| {
                    serde_json::json!({
                        "stage": stage.stage.name(),
                        "type": stage.stage.type_name(),
                        "count": stage.count,
                        "inserted": stage.report.inserted,
                        "skipped": stage.report.skipped,
                        "failed": stage.report.failed,
                        "commits": stage.report.commits,
                        "elapsed_ms": stage.elapsed.as_millis() as u64,
                        "ms_per_record": stage.ms_per_record(),
                    })
                })
                .collect();
            let total = report.total();
            let summary = serde_json::json!({
                "stages": stages,
                "total": {
                    "inserted": total.inserted,
                    "skipped": total.skipped,
                    "failed": total.failed,
                    "elapsed_ms": report.elapsed().as_millis() as u64,
                },
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                "Stage", "Type", "Count", "Inserted", "Skipped", "Failed", "Commits", "Time (ms)",
                "ms/record",
            ]);

            for stage in &report.stages {
                table.add_row(vec![
                    stage.stage.name().to_string(),
                    stage.stage.type_name().to_string(),
                    stage.count.to_string(),
                    stage.report.inserted.to_string(),
                    stage.report.skipped.to_string(),
                    stage.report.failed.to_string(),
                    stage.report.commits.to_string(),
                    stage.elapsed.as_millis().to_string(),
                    format!("{:.3}", stage.ms_per_record()),
                ]);
            }

            println!("{}", table);
            let total = report.total();
            println!(
                "{} inserted, {} skipped, {} failed in {} ms",
                total.inserted,
                total.skipped,
                total.failed,
                report.elapsed().as_millis()
            );
        }
    }

    Ok(())
}

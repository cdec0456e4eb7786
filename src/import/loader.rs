//! Vertex extraction and batch loading
//!
//! The `collect_*` functions stage the distinct entities of a file in
//! insertion order; [`load_vertices`] writes them out under a commit policy.

use indexmap::{IndexMap, IndexSet};
use std::time::{Duration, Instant};

use super::batch::{ms_per_record, BatchReport, CommitPolicy, Committer};
use super::dataset::{MovieRow, RatingRow};
use crate::error::ImportResult;
use crate::graph::{property_map, Label, PropertyMap};
use crate::session::{GraphSession, SessionError, SessionResult};

/// Result of loading one vertex type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOutcome {
    pub report: BatchReport,
    /// Vertices of the type present after the load
    pub count: usize,
    pub elapsed: Duration,
}

impl LoadOutcome {
    pub fn ms_per_record(&self) -> f64 {
        ms_per_record(self.elapsed, self.count)
    }
}

/// Distinct genre tokens, in order of first appearance
pub fn collect_genres(
    movies: impl IntoIterator<Item = ImportResult<MovieRow>>,
) -> ImportResult<IndexSet<String>> {
    let mut genres = IndexSet::new();
    for movie in movies {
        genres.extend(movie?.genres);
    }
    Ok(genres)
}

/// Distinct user ids, in order of first appearance
pub fn collect_users(
    ratings: impl IntoIterator<Item = ImportResult<RatingRow>>,
) -> ImportResult<IndexSet<i64>> {
    let mut users = IndexSet::new();
    for rating in ratings {
        users.insert(rating?.user_id);
    }
    Ok(users)
}

/// Movie titles by id; a repeated id keeps its first position and the
/// title of its last row
pub fn collect_movies(
    movies: impl IntoIterator<Item = ImportResult<MovieRow>>,
) -> ImportResult<IndexMap<i64, String>> {
    let mut titles = IndexMap::new();
    for movie in movies {
        let movie = movie?;
        titles.insert(movie.movie_id, movie.title);
    }
    Ok(titles)
}

pub fn genre_properties(name: String) -> PropertyMap {
    property_map([("name", name.into())])
}

pub fn user_properties(user_id: i64) -> PropertyMap {
    property_map([("userId", user_id.into())])
}

pub fn movie_properties(movie_id: i64, title: String) -> PropertyMap {
    property_map([("movieId", movie_id.into()), ("name", title.into())])
}

/// Insert one vertex of `label` per entity.
///
/// A failed insert (a unique violation, say) rolls back the uncommitted
/// segment and the load goes on with the next entity. Errors from the
/// session itself abort the load.
pub fn load_vertices<S, I>(
    session: &mut S,
    label: &Label,
    entities: I,
    policy: CommitPolicy,
) -> SessionResult<LoadOutcome>
where
    S: GraphSession + ?Sized,
    I: IntoIterator<Item = PropertyMap>,
{
    let start = Instant::now();
    let mut committer = Committer::new(&mut *session, policy);

    for properties in entities {
        match committer.session().add_vertex(label, properties) {
            Ok(_) => committer.record(),
            Err(SessionError::Graph(e)) => committer.fail(label.as_str(), &e)?,
            Err(e) => return Err(e),
        }
        committer.tick()?;
    }

    let report = committer.finish()?;
    let elapsed = start.elapsed();
    let count = session.count_vertices(label)?;

    Ok(LoadOutcome {
        report,
        count,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::schema::{movielens_schema, reset_dataset, GENRE, MOVIE, USER};
    use crate::graph::PropertyValue;
    use crate::session::EmbeddedSession;

    fn movie(id: i64, title: &str, genres: &[&str]) -> ImportResult<MovieRow> {
        Ok(MovieRow {
            movie_id: id,
            title: title.to_string(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
        })
    }

    fn rating(user_id: i64, movie_id: i64) -> ImportResult<RatingRow> {
        Ok(RatingRow {
            user_id,
            movie_id,
            rating: 3.5,
            timestamp: 1,
        })
    }

    fn imported_session() -> EmbeddedSession {
        let mut session = EmbeddedSession::in_memory();
        reset_dataset(&mut session, &movielens_schema()).unwrap();
        session
    }

    #[test]
    fn test_collect_genres_dedups_in_order() {
        let genres = collect_genres(vec![
            movie(1, "Toy Story (1995)", &["Adventure", "Animation", "Comedy"]),
            movie(2, "Jumanji (1995)", &["Adventure", "Children"]),
        ])
        .unwrap();
        let genres: Vec<_> = genres.into_iter().collect();
        assert_eq!(genres, vec!["Adventure", "Animation", "Comedy", "Children"]);
    }

    #[test]
    fn test_collect_users_and_movies() {
        let users = collect_users(vec![rating(3, 1), rating(1, 1), rating(3, 2)]).unwrap();
        assert_eq!(users.into_iter().collect::<Vec<_>>(), vec![3, 1]);

        let movies = collect_movies(vec![
            movie(5, "Draft Title", &[]),
            movie(6, "Heat (1995)", &[]),
            movie(5, "Final Title", &[]),
        ])
        .unwrap();
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[&5], "Final Title");
        assert_eq!(movies.get_index(0).map(|(id, _)| *id), Some(5));
    }

    #[test]
    fn test_collect_stops_at_first_error() {
        let rows = vec![
            rating(1, 1),
            Err(crate::error::ImportError::Config("bad row".to_string())),
        ];
        assert!(collect_users(rows).is_err());
    }

    #[test]
    fn test_load_vertices() {
        let mut session = imported_session();
        let genres = ["Action", "Comedy", "Drama"].map(|g| genre_properties(g.to_string()));

        let outcome = load_vertices(
            &mut session,
            &Label::new(GENRE),
            genres,
            CommitPolicy::EveryN { size: 2 },
        )
        .unwrap();

        assert_eq!(outcome.count, 3);
        assert_eq!(outcome.report.inserted, 3);
        assert_eq!(outcome.report.commits, 2);
        assert_eq!(session.pending_writes(), 0);
    }

    #[test]
    fn test_unique_violation_rolls_back_segment() {
        let mut session = imported_session();
        let users = [1, 2, 2, 3].map(user_properties);

        let outcome = load_vertices(
            &mut session,
            &Label::new(USER),
            users,
            CommitPolicy::EveryN { size: 100 },
        )
        .unwrap();

        // Users 1 and 2 were uncommitted when the duplicate failed
        assert_eq!(outcome.report.failed, 3);
        assert_eq!(outcome.report.inserted, 1);
        assert_eq!(outcome.count, 1);
        let ids: Vec<_> = session
            .vertices(&Label::new(USER))
            .unwrap()
            .into_iter()
            .map(|n| n.get_property("userId").cloned())
            .collect();
        assert_eq!(ids, vec![Some(PropertyValue::Integer(3))]);
    }

    #[test]
    fn test_movie_properties() {
        let mut session = imported_session();
        let movies = [(1, "Toy Story (1995)".to_string())]
            .map(|(id, title)| movie_properties(id, title));
        load_vertices(&mut session, &Label::new(MOVIE), movies, CommitPolicy::default()).unwrap();

        let movie = session
            .find_vertex(&Label::new(MOVIE), "movieId", &1i64.into())
            .unwrap()
            .and_then(|id| session.vertex(id).unwrap())
            .unwrap();
        assert_eq!(movie.get_property("name"), Some(&PropertyValue::from("Toy Story (1995)")));
    }
}

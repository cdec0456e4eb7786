//! The MovieLens files and their typed rows

use std::path::{Path, PathBuf};

use super::csv::{read_records, Record};
use crate::error::ImportResult;

pub const MOVIES_FILE: &str = "movies.csv";
pub const RATINGS_FILE: &str = "ratings.csv";
pub const TAGS_FILE: &str = "tags.csv";

/// Separator of the genre list in `movies.csv`
pub const GENRE_SEPARATOR: char = '|';

/// `movieId,title,genres`
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRow {
    pub movie_id: i64,
    pub title: String,
    pub genres: Vec<String>,
}

impl MovieRow {
    pub fn from_record(record: &Record) -> ImportResult<Self> {
        let genres = record
            .text(2, "genres")?
            .split(GENRE_SEPARATOR)
            .filter(|genre| !genre.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            movie_id: record.parse(0, "movieId")?,
            title: record.text(1, "title")?,
            genres,
        })
    }
}

/// `userId,movieId,rating,timestamp`
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow {
    pub user_id: i64,
    pub movie_id: i64,
    pub rating: f64,
    pub timestamp: i64,
}

impl RatingRow {
    pub fn from_record(record: &Record) -> ImportResult<Self> {
        Ok(Self {
            user_id: record.parse(0, "userId")?,
            movie_id: record.parse(1, "movieId")?,
            rating: record.parse(2, "rating")?,
            timestamp: record.parse(3, "timestamp")?,
        })
    }
}

/// `userId,movieId,tag,timestamp`
#[derive(Debug, Clone, PartialEq)]
pub struct TagRow {
    pub user_id: i64,
    pub movie_id: i64,
    pub tag: String,
    pub timestamp: i64,
}

impl TagRow {
    pub fn from_record(record: &Record) -> ImportResult<Self> {
        Ok(Self {
            user_id: record.parse(0, "userId")?,
            movie_id: record.parse(1, "movieId")?,
            tag: record.text(2, "tag")?,
            timestamp: record.parse(3, "timestamp")?,
        })
    }
}

/// A MovieLens dataset directory
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn movies_path(&self) -> PathBuf {
        self.root.join(MOVIES_FILE)
    }

    pub fn ratings_path(&self) -> PathBuf {
        self.root.join(RATINGS_FILE)
    }

    pub fn tags_path(&self) -> PathBuf {
        self.root.join(TAGS_FILE)
    }

    pub fn movies(&self) -> ImportResult<impl Iterator<Item = ImportResult<MovieRow>>> {
        Ok(read_records(self.movies_path(), true)?
            .map(|record| record.and_then(|r| MovieRow::from_record(&r))))
    }

    pub fn ratings(&self) -> ImportResult<impl Iterator<Item = ImportResult<RatingRow>>> {
        Ok(read_records(self.ratings_path(), true)?
            .map(|record| record.and_then(|r| RatingRow::from_record(&r))))
    }

    pub fn tags(&self) -> ImportResult<impl Iterator<Item = ImportResult<TagRow>>> {
        Ok(read_records(self.tags_path(), true)?
            .map(|record| record.and_then(|r| TagRow::from_record(&r))))
    }
}

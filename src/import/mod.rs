//! MovieLens import pipeline
//!
//! - `csv` / `dataset`: lazy, typed reading of the three input files
//! - `schema`: the six types and their drop-and-recreate reset
//! - `loader`: deduplicated vertex staging and batch insertion
//! - `linker`: endpoint resolution and edge creation
//! - `batch`: commit cadence and per-stage accounting
//! - `pipeline`: the six stages in order

pub mod batch;
pub mod csv;
pub mod dataset;
pub mod linker;
pub mod loader;
pub mod pipeline;
pub mod schema;

pub use batch::{BatchReport, CommitPolicy, Committer};
pub use dataset::{Dataset, MovieRow, RatingRow, TagRow};
pub use linker::{Endpoint, LinkMode, LinkRequest};
pub use loader::LoadOutcome;
pub use pipeline::{Pipeline, ResetMode, RunReport, Stage, StageReport};
pub use schema::{movielens_schema, DatasetSchema, EdgeTypeDef, VertexTypeDef};

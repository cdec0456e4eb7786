//! lensgraph: MovieLens to property-graph importer
//!
//! Reads the MovieLens `movies.csv`, `ratings.csv` and `tags.csv` files and
//! loads them into a property graph:
//!
//! - `Genre {name}`, `User {userId}` and `Movie {movieId, name}` vertices,
//!   each with a unique index on its key
//! - `is_genre` edges (Movie → Genre), `Rate {rating, timestamp}` and
//!   `Tag {tag, timestamp}` edges (User → Movie)
//!
//! # Architecture
//!
//! - [`graph`]: the embedded property graph (store, schema catalog)
//! - [`index`]: unique indexes used for key constraints and endpoint lookups
//! - [`persistence`]: write-ahead log behind `plocal:` databases
//! - [`session`]: transactional sessions, the factory and its pool
//! - [`import`]: CSV reading, schema reset, batch loading, linking, pipeline
//! - [`config`]: defaults, YAML configuration, positional overrides
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lensgraph::config::ImportConfig;
//! use lensgraph::import::{Dataset, Pipeline};
//! use lensgraph::session::GraphFactory;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = ImportConfig::default();
//! config.store.url = "memory:movielens".to_string();
//!
//! let factory = GraphFactory::open(&config.store)?;
//! let mut session = factory.session()?;
//! let report = Pipeline::new(&mut session, Dataset::new("movielens"), config.import).run()?;
//! println!("{} records inserted", report.total().inserted);
//! session.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod import;
pub mod index;
pub mod persistence;
pub mod session;

pub use config::{ImportConfig, ImportOptions, StoreConfig};
pub use error::{ImportError, ImportResult};
pub use graph::{GraphError, GraphResult, GraphStore, PropertyValue};
pub use import::{CommitPolicy, Dataset, LinkMode, Pipeline, ResetMode, RunReport, Stage};
pub use session::{EmbeddedSession, GraphFactory, GraphSession, SessionError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

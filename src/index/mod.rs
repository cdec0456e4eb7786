//! Unique indexing module
//!
//! Provides the unique indexes used for key uniqueness and endpoint lookups.

pub mod manager;
pub mod unique_index;

pub use manager::{Conflict, IndexId, IndexManager};
pub use unique_index::{IndexKey, UniqueIndex};

//! Embedded property graph
//!
//! This module implements the graph model the importer writes into:
//! - Vertices with exactly one declared type and typed properties
//! - Directed edges with a declared type and properties
//! - Multiple edges between the same vertices
//! - A schema catalog shared by vertex and edge types
//! - In-memory storage with per-type membership sets and unique indexes

pub mod edge;
pub mod node;
pub mod property;
pub mod schema;
pub mod store;
pub mod types;

// Re-export main types
pub use edge::Edge;
pub use node::Node;
pub use property::{property_map, PropertyMap, PropertyValue};
pub use schema::{Catalog, ClassDef, ClassKind, PropertyType};
pub use store::{GraphError, GraphResult, GraphStore};
pub use types::{EdgeId, EdgeType, Label, NodeId};

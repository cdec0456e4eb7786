//! Sessions against a graph database
//!
//! [`GraphSession`] is the interface the importer writes through. The
//! embedded implementation ([`EmbeddedSession`]) works on an in-process
//! [`GraphStore`](crate::graph::GraphStore), optionally backed by a WAL, and
//! is handed out by a [`GraphFactory`] that enforces the pool bounds.

pub mod embedded;
pub mod factory;

pub use embedded::EmbeddedSession;
pub use factory::{GraphFactory, StoreUrl};

use crate::graph::{
    Edge, EdgeId, EdgeType, GraphError, Label, Node, NodeId, PropertyMap, PropertyType,
    PropertyValue,
};
use crate::persistence::WalError;
use thiserror::Error;

/// Errors raised by sessions and the factory
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("Schema changes are not allowed while {0} writes are uncommitted")]
    PendingTransaction(usize),

    #[error("Connection pool exhausted: all {0} sessions are in use")]
    PoolExhausted(usize),

    #[error("Invalid pool bounds: min {min}, max {max} (need 1 <= min <= max)")]
    InvalidPool { min: usize, max: usize },

    #[error("Invalid database URL '{0}': expected memory:<name> or plocal:<dir>")]
    InvalidUrl(String),

    #[error("Unsupported database URL '{0}': only memory: and plocal: databases are available")]
    UnsupportedUrl(String),

    #[error("Connection refused: {0}")]
    Connection(String),

    #[error("Database state poisoned by a panicking session")]
    Poisoned,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A transactional session on a graph database.
///
/// Data writes (`add_vertex`, `add_edge`) are buffered in the session's
/// transaction until `commit`; `rollback` undoes them. Schema changes are
/// applied immediately, are never rolled back, and are refused while the
/// session holds uncommitted writes.
pub trait GraphSession {
    fn has_vertex_type(&self, label: &Label) -> SessionResult<bool>;

    fn has_edge_type(&self, edge_type: &EdgeType) -> SessionResult<bool>;

    fn create_vertex_type(&mut self, label: &Label) -> SessionResult<()>;

    fn create_edge_type(&mut self, edge_type: &EdgeType) -> SessionResult<()>;

    /// Drop a vertex type with its vertices, their edges and its indexes.
    /// Returns the number of vertices removed.
    fn drop_vertex_type(&mut self, label: &Label) -> SessionResult<usize>;

    /// Drop an edge type with its edges. Returns the number of edges removed.
    fn drop_edge_type(&mut self, edge_type: &EdgeType) -> SessionResult<usize>;

    /// Declare a typed property on a vertex or edge type
    fn create_property(&mut self, class: &str, name: &str, ty: PropertyType) -> SessionResult<()>;

    fn create_unique_index(&mut self, label: &Label, property: &str) -> SessionResult<()>;

    fn add_vertex(&mut self, label: &Label, properties: PropertyMap) -> SessionResult<NodeId>;

    fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: &EdgeType,
        properties: PropertyMap,
    ) -> SessionResult<EdgeId>;

    /// First vertex of `label` whose `key` equals `value`
    fn find_vertex(
        &self,
        label: &Label,
        key: &str,
        value: &PropertyValue,
    ) -> SessionResult<Option<NodeId>>;

    fn vertex(&self, id: NodeId) -> SessionResult<Option<Node>>;

    /// All vertices of a type, in id order
    fn vertices(&self, label: &Label) -> SessionResult<Vec<Node>>;

    /// All edges of a type, in id order
    fn edges(&self, edge_type: &EdgeType) -> SessionResult<Vec<Edge>>;

    fn count_vertices(&self, label: &Label) -> SessionResult<usize>;

    fn count_edges(&self, edge_type: &EdgeType) -> SessionResult<usize>;

    /// Number of writes in the open transaction
    fn pending_writes(&self) -> usize;

    fn commit(&mut self) -> SessionResult<()>;

    fn rollback(&mut self) -> SessionResult<()>;
}

//! EmbeddedSession: in-process session on a shared graph store

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use super::factory::PoolPermit;
use super::{GraphSession, SessionError, SessionResult};
use crate::graph::{
    Edge, EdgeId, EdgeType, GraphResult, GraphStore, Label, Node, NodeId, PropertyMap,
    PropertyType, PropertyValue,
};
use crate::persistence::{Wal, WalEntry};

/// A database as seen by its sessions: the store plus its WAL, if durable
#[derive(Default)]
pub struct Backend {
    pub store: GraphStore,
    pub wal: Option<Wal>,
}

impl Backend {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn durable(store: GraphStore, wal: Wal) -> Self {
        Self {
            store,
            wal: Some(wal),
        }
    }
}

/// Shared handle on a database
pub type SharedBackend = Arc<Mutex<Backend>>;

/// One uncommitted write, as needed to undo it
#[derive(Debug, Clone, Copy)]
enum Undo {
    Vertex(NodeId),
    Edge(EdgeId),
}

/// In-process session.
///
/// Writes go straight into the shared store and are remembered in an undo
/// log; durable databases also keep a redo log that `commit` appends to the
/// WAL. Dropping a session with uncommitted writes rolls them back.
pub struct EmbeddedSession {
    backend: SharedBackend,
    undo: Vec<Undo>,
    redo: Vec<WalEntry>,
    _permit: Option<PoolPermit>,
}

fn lock(backend: &Mutex<Backend>) -> SessionResult<MutexGuard<'_, Backend>> {
    backend.lock().map_err(|_| SessionError::Poisoned)
}

impl EmbeddedSession {
    pub(crate) fn new(backend: SharedBackend, permit: Option<PoolPermit>) -> Self {
        Self {
            backend,
            undo: Vec::new(),
            redo: Vec::new(),
            _permit: permit,
        }
    }

    /// Session on a fresh, private in-memory database
    pub fn in_memory() -> Self {
        Self::new(Arc::new(Mutex::new(Backend::in_memory())), None)
    }

    /// Commit outstanding writes, flush the WAL and release the session
    pub fn close(mut self) -> SessionResult<()> {
        self.commit()?;
        let mut backend = lock(&self.backend)?;
        if let Some(wal) = backend.wal.as_mut() {
            wal.flush()?;
        }
        Ok(())
    }

    /// Apply a schema change outside any transaction and log it at once
    fn schema_change<T>(
        &mut self,
        entry: WalEntry,
        change: impl FnOnce(&mut GraphStore) -> GraphResult<T>,
    ) -> SessionResult<T> {
        if !self.undo.is_empty() {
            return Err(SessionError::PendingTransaction(self.undo.len()));
        }

        let mut backend = lock(&self.backend)?;
        let out = change(&mut backend.store)?;
        if let Some(wal) = backend.wal.as_mut() {
            wal.append(entry)?;
            wal.flush()?;
        }
        Ok(out)
    }
}

impl GraphSession for EmbeddedSession {
    fn has_vertex_type(&self, label: &Label) -> SessionResult<bool> {
        Ok(lock(&self.backend)?.store.catalog().has_vertex_type(label))
    }

    fn has_edge_type(&self, edge_type: &EdgeType) -> SessionResult<bool> {
        Ok(lock(&self.backend)?.store.catalog().has_edge_type(edge_type))
    }

    fn create_vertex_type(&mut self, label: &Label) -> SessionResult<()> {
        let entry = WalEntry::CreateVertexType { label: label.clone() };
        self.schema_change(entry, |store| store.create_vertex_type(label))
    }

    fn create_edge_type(&mut self, edge_type: &EdgeType) -> SessionResult<()> {
        let entry = WalEntry::CreateEdgeType { edge_type: edge_type.clone() };
        self.schema_change(entry, |store| store.create_edge_type(edge_type))
    }

    fn drop_vertex_type(&mut self, label: &Label) -> SessionResult<usize> {
        let entry = WalEntry::DropVertexType { label: label.clone() };
        self.schema_change(entry, |store| store.drop_vertex_type(label))
    }

    fn drop_edge_type(&mut self, edge_type: &EdgeType) -> SessionResult<usize> {
        let entry = WalEntry::DropEdgeType { edge_type: edge_type.clone() };
        self.schema_change(entry, |store| store.drop_edge_type(edge_type))
    }

    fn create_property(&mut self, class: &str, name: &str, ty: PropertyType) -> SessionResult<()> {
        let entry = WalEntry::CreateProperty {
            class: class.to_string(),
            name: name.to_string(),
            ty,
        };
        self.schema_change(entry, |store| store.declare_property(class, name, ty))
    }

    fn create_unique_index(&mut self, label: &Label, property: &str) -> SessionResult<()> {
        let entry = WalEntry::CreateUniqueIndex {
            label: label.clone(),
            property: property.to_string(),
        };
        self.schema_change(entry, |store| store.create_unique_index(label, property))
    }

    fn add_vertex(&mut self, label: &Label, properties: PropertyMap) -> SessionResult<NodeId> {
        let mut backend = lock(&self.backend)?;
        let id = backend.store.add_node(label, properties)?;
        self.undo.push(Undo::Vertex(id));

        if backend.wal.is_some() {
            if let Some(node) = backend.store.get_node(id) {
                self.redo.push(WalEntry::CreateNode(node.clone()));
            }
        }
        Ok(id)
    }

    fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: &EdgeType,
        properties: PropertyMap,
    ) -> SessionResult<EdgeId> {
        let mut backend = lock(&self.backend)?;
        let id = backend.store.add_edge(source, target, edge_type, properties)?;
        self.undo.push(Undo::Edge(id));

        if backend.wal.is_some() {
            if let Some(edge) = backend.store.get_edge(id) {
                self.redo.push(WalEntry::CreateEdge(edge.clone()));
            }
        }
        Ok(id)
    }

    fn find_vertex(
        &self,
        label: &Label,
        key: &str,
        value: &PropertyValue,
    ) -> SessionResult<Option<NodeId>> {
        let backend = lock(&self.backend)?;
        Ok(backend.store.find_nodes(label, key, value).first().copied())
    }

    fn vertex(&self, id: NodeId) -> SessionResult<Option<Node>> {
        Ok(lock(&self.backend)?.store.get_node(id).cloned())
    }

    fn vertices(&self, label: &Label) -> SessionResult<Vec<Node>> {
        let backend = lock(&self.backend)?;
        Ok(backend.store.nodes_by_label(label).into_iter().cloned().collect())
    }

    fn edges(&self, edge_type: &EdgeType) -> SessionResult<Vec<Edge>> {
        let backend = lock(&self.backend)?;
        Ok(backend.store.edges_by_type(edge_type).into_iter().cloned().collect())
    }

    fn count_vertices(&self, label: &Label) -> SessionResult<usize> {
        Ok(lock(&self.backend)?.store.count_nodes(label))
    }

    fn count_edges(&self, edge_type: &EdgeType) -> SessionResult<usize> {
        Ok(lock(&self.backend)?.store.count_edges(edge_type))
    }

    fn pending_writes(&self) -> usize {
        self.undo.len()
    }

    fn commit(&mut self) -> SessionResult<()> {
        let mut backend = lock(&self.backend)?;
        if let Some(wal) = backend.wal.as_mut() {
            for entry in self.redo.drain(..) {
                wal.append(entry)?;
            }
            wal.flush()?;
        }

        if !self.undo.is_empty() {
            debug!("Committed {} writes", self.undo.len());
        }
        self.undo.clear();
        Ok(())
    }

    fn rollback(&mut self) -> SessionResult<()> {
        let mut backend = lock(&self.backend)?;
        let undone = self.undo.len();
        self.redo.clear();

        // Newest first, so edges go before the vertices they touch
        for undo in self.undo.drain(..).rev() {
            match undo {
                Undo::Vertex(id) => {
                    backend.store.remove_node(id)?;
                }
                Undo::Edge(id) => {
                    backend.store.remove_edge(id)?;
                }
            }
        }

        if undone > 0 {
            debug!("Rolled back {} writes", undone);
        }
        Ok(())
    }
}

impl Drop for EmbeddedSession {
    fn drop(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        warn!("Session dropped with {} uncommitted writes, rolling back", self.undo.len());
        if let Err(e) = self.rollback() {
            warn!("Rollback on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{property_map, GraphError};

    fn session_with_genres() -> EmbeddedSession {
        let mut session = EmbeddedSession::in_memory();
        let genre = Label::new("Genre");
        session.create_vertex_type(&genre).unwrap();
        session.create_property("Genre", "name", PropertyType::String).unwrap();
        session.create_unique_index(&genre, "name").unwrap();
        session
    }

    fn add_genre(session: &mut EmbeddedSession, name: &str) -> SessionResult<NodeId> {
        session.add_vertex(&Label::new("Genre"), property_map([("name", name.into())]))
    }

    #[test]
    fn test_commit_keeps_writes() {
        let mut session = session_with_genres();
        add_genre(&mut session, "Drama").unwrap();
        assert_eq!(session.pending_writes(), 1);

        session.commit().unwrap();
        assert_eq!(session.pending_writes(), 0);
        session.rollback().unwrap();
        assert_eq!(session.count_vertices(&Label::new("Genre")).unwrap(), 1);
    }

    #[test]
    fn test_rollback_undoes_uncommitted_segment() {
        let mut session = session_with_genres();
        add_genre(&mut session, "Drama").unwrap();
        session.commit().unwrap();

        add_genre(&mut session, "Comedy").unwrap();
        add_genre(&mut session, "War").unwrap();
        session.rollback().unwrap();

        let names: Vec<_> = session
            .vertices(&Label::new("Genre"))
            .unwrap()
            .into_iter()
            .map(|n| n.get_property("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![PropertyValue::from("Drama")]);

        // Rolled back keys can be inserted again
        add_genre(&mut session, "Comedy").unwrap();
        session.commit().unwrap();
        assert_eq!(session.count_vertices(&Label::new("Genre")).unwrap(), 2);
    }

    #[test]
    fn test_rollback_removes_edges_before_vertices() {
        let mut session = session_with_genres();
        session.create_vertex_type(&Label::new("Movie")).unwrap();
        session.create_edge_type(&EdgeType::new("is_genre")).unwrap();

        let genre = add_genre(&mut session, "Crime").unwrap();
        let movie = session
            .add_vertex(&Label::new("Movie"), property_map([("movieId", 6i64.into())]))
            .unwrap();
        session
            .add_edge(movie, genre, &EdgeType::new("is_genre"), PropertyMap::new())
            .unwrap();
        assert_eq!(session.pending_writes(), 3);

        session.rollback().unwrap();
        assert_eq!(session.count_edges(&EdgeType::new("is_genre")).unwrap(), 0);
        assert_eq!(session.vertex(movie).unwrap(), None);
    }

    #[test]
    fn test_schema_change_refused_with_pending_writes() {
        let mut session = session_with_genres();
        add_genre(&mut session, "Drama").unwrap();

        let result = session.create_vertex_type(&Label::new("User"));
        assert!(matches!(result, Err(SessionError::PendingTransaction(1))));

        session.commit().unwrap();
        session.create_vertex_type(&Label::new("User")).unwrap();
        assert!(session.has_vertex_type(&Label::new("User")).unwrap());
    }

    #[test]
    fn test_unique_violation_surfaces_as_graph_error() {
        let mut session = session_with_genres();
        add_genre(&mut session, "Drama").unwrap();

        let result = add_genre(&mut session, "Drama");
        assert!(matches!(
            result,
            Err(SessionError::Graph(GraphError::UniqueViolation { .. }))
        ));
        // The failed insert is not part of the transaction
        assert_eq!(session.pending_writes(), 1);
    }

    #[test]
    fn test_find_vertex() {
        let mut session = session_with_genres();
        let drama = add_genre(&mut session, "Drama").unwrap();
        let genre = Label::new("Genre");

        assert_eq!(session.find_vertex(&genre, "name", &"Drama".into()).unwrap(), Some(drama));
        assert_eq!(session.find_vertex(&genre, "name", &"Horror".into()).unwrap(), None);
    }

    #[test]
    fn test_drop_rolls_back() {
        let backend: SharedBackend = Arc::new(Mutex::new(Backend::in_memory()));
        let mut setup = EmbeddedSession::new(Arc::clone(&backend), None);
        setup.create_vertex_type(&Label::new("User")).unwrap();

        {
            let mut session = EmbeddedSession::new(Arc::clone(&backend), None);
            session
                .add_vertex(&Label::new("User"), property_map([("userId", 1i64.into())]))
                .unwrap();
        }
        assert_eq!(setup.count_vertices(&Label::new("User")).unwrap(), 0);

        let mut session = EmbeddedSession::new(Arc::clone(&backend), None);
        session
            .add_vertex(&Label::new("User"), property_map([("userId", 2i64.into())]))
            .unwrap();
        session.close().unwrap();
        assert_eq!(setup.count_vertices(&Label::new("User")).unwrap(), 1);
    }
}

//! In-memory graph storage implementation
//!
//! Vertices and edges live in id-addressed arenas with adjacency lists and
//! per-type membership sets. Every write is checked against the schema
//! catalog and the unique indexes before it touches the arenas, so a failed
//! write leaves the store unchanged.

use super::edge::Edge;
use super::node::Node;
use super::property::{PropertyMap, PropertyValue};
use super::schema::{Catalog, PropertyType};
use super::types::{EdgeId, EdgeType, Label, NodeId};
use crate::index::{IndexId, IndexKey, IndexManager, UniqueIndex};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Vertex {0} not found")]
    NodeNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Vertex {0} already exists")]
    NodeAlreadyExists(NodeId),

    #[error("Edge {0} already exists")]
    EdgeAlreadyExists(EdgeId),

    #[error("Invalid edge: source vertex {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("Invalid edge: target vertex {0} does not exist")]
    InvalidEdgeTarget(NodeId),

    #[error("Type {0} not found")]
    TypeNotFound(String),

    #[error("Type {0} already exists")]
    TypeExists(String),

    #[error("Property {class}.{property} is already declared with another type")]
    PropertyExists { class: String, property: String },

    #[error("Property {class}.{property} expects {expected}, got {found}")]
    PropertyTypeMismatch {
        class: String,
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Index {0} already exists")]
    IndexExists(String),

    #[error("Cannot index {class}.{property}: property is not declared")]
    IndexOnUndeclaredProperty { class: String, property: String },

    #[error("Cannot index {class}.{property}: {ty} values are not indexable")]
    NotIndexable {
        class: String,
        property: String,
        ty: PropertyType,
    },

    #[error("Duplicate key {key} in index {index}, already held by {owner}")]
    UniqueViolation {
        index: String,
        key: String,
        owner: NodeId,
    },
}

pub type GraphResult<T> = Result<T, GraphError>;

/// In-memory graph storage
///
/// - nodes / edges: arenas addressed by id (slot 0 is never used)
/// - outgoing / incoming: adjacency lists per vertex slot
/// - label_index: vertex type -> member ids
/// - edge_type_index: edge type -> member ids
#[derive(Debug)]
pub struct GraphStore {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    label_index: FxHashMap<Label, BTreeSet<NodeId>>,
    edge_type_index: FxHashMap<EdgeType, BTreeSet<EdgeId>>,
    catalog: Catalog,
    indexes: IndexManager,
    next_node_id: u64,
    next_edge_id: u64,
}

impl GraphStore {
    /// Create a new empty graph store
    pub fn new() -> Self {
        GraphStore {
            nodes: Vec::with_capacity(1024),
            edges: Vec::with_capacity(4096),
            outgoing: Vec::with_capacity(1024),
            incoming: Vec::with_capacity(1024),
            label_index: FxHashMap::default(),
            edge_type_index: FxHashMap::default(),
            catalog: Catalog::new(),
            indexes: IndexManager::new(),
            next_node_id: 1,
            next_edge_id: 1,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    // ============================================================
    // Schema
    // ============================================================

    pub fn create_vertex_type(&mut self, label: &Label) -> GraphResult<()> {
        self.catalog.create_vertex_type(label)
    }

    pub fn create_edge_type(&mut self, edge_type: &EdgeType) -> GraphResult<()> {
        self.catalog.create_edge_type(edge_type)
    }

    pub fn declare_property(&mut self, class: &str, name: &str, ty: PropertyType) -> GraphResult<()> {
        self.catalog.declare_property(class, name, ty)
    }

    /// Build a unique index on a declared property, back-filling existing
    /// vertices. Fails without creating anything if they hold duplicates.
    pub fn create_unique_index(&mut self, label: &Label, property: &str) -> GraphResult<()> {
        let class = self
            .catalog
            .vertex_class(label)
            .ok_or_else(|| GraphError::TypeNotFound(label.to_string()))?;
        let ty = class
            .property_type(property)
            .ok_or_else(|| GraphError::IndexOnUndeclaredProperty {
                class: label.to_string(),
                property: property.to_string(),
            })?;
        if ty == PropertyType::Float {
            return Err(GraphError::NotIndexable {
                class: label.to_string(),
                property: property.to_string(),
                ty,
            });
        }

        let id = IndexId::new(label, property);
        if self.indexes.has_index(label, property) {
            return Err(GraphError::IndexExists(id.name()));
        }

        let mut index = UniqueIndex::new();
        for node in self.nodes_by_label(label) {
            let Some(key) = node.get_property(property).and_then(IndexKey::from_value) else {
                continue;
            };
            index
                .insert(key.clone(), node.id)
                .map_err(|owner| GraphError::UniqueViolation {
                    index: id.name(),
                    key: key.to_string(),
                    owner,
                })?;
        }
        self.indexes.install(id, index);
        Ok(())
    }

    /// Drop a vertex type with all its vertices, their edges and its indexes.
    /// Returns the number of vertices removed.
    pub fn drop_vertex_type(&mut self, label: &Label) -> GraphResult<usize> {
        self.catalog.drop_vertex_type(label)?;
        self.indexes.drop_label(label);
        let members = self.label_index.remove(label).unwrap_or_default();
        for id in &members {
            self.detach_node(*id);
        }
        Ok(members.len())
    }

    /// Drop an edge type with all its edges. Returns the number removed.
    pub fn drop_edge_type(&mut self, edge_type: &EdgeType) -> GraphResult<usize> {
        self.catalog.drop_edge_type(edge_type)?;
        let members = self.edge_type_index.get(edge_type).cloned().unwrap_or_default();
        for id in &members {
            self.remove_edge(*id)?;
        }
        self.edge_type_index.remove(edge_type);
        Ok(members.len())
    }

    // ============================================================
    // Vertices
    // ============================================================

    /// Create a vertex with an auto-generated id
    pub fn add_node(&mut self, label: &Label, properties: PropertyMap) -> GraphResult<NodeId> {
        let id = NodeId::new(self.next_node_id);
        self.insert_node(Node::new(id, label.clone(), properties))
    }

    /// Insert a vertex keeping its id (used by `add_node` and WAL replay)
    pub fn insert_node(&mut self, node: Node) -> GraphResult<NodeId> {
        let Node { id, label, properties } = node;
        let class = self
            .catalog
            .vertex_class(&label)
            .ok_or_else(|| GraphError::TypeNotFound(label.to_string()))?;
        let properties = class.check(label.as_str(), properties)?;
        let node = Node::new(id, label, properties);

        if self.has_node(id) {
            return Err(GraphError::NodeAlreadyExists(id));
        }
        if let Some(conflict) = self.indexes.find_conflict(&node) {
            return Err(GraphError::UniqueViolation {
                index: conflict.index.name(),
                key: conflict.key.to_string(),
                owner: conflict.owner,
            });
        }

        let idx = id.slot();
        if idx >= self.nodes.len() {
            self.nodes.resize(idx + 1, None);
            self.outgoing.resize(idx + 1, Vec::new());
            self.incoming.resize(idx + 1, Vec::new());
        }

        self.label_index.entry(node.label.clone()).or_default().insert(id);
        self.indexes.index_node(&node);
        self.nodes[idx] = Some(node);

        if id.as_u64() >= self.next_node_id {
            self.next_node_id = id.as_u64() + 1;
        }
        Ok(id)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.get_node(id).is_some()
    }

    /// Delete a vertex and all its connected edges
    pub fn remove_node(&mut self, id: NodeId) -> GraphResult<Node> {
        let label = self
            .get_node(id)
            .map(|node| node.label.clone())
            .ok_or(GraphError::NodeNotFound(id))?;
        if let Some(members) = self.label_index.get_mut(&label) {
            members.remove(&id);
        }
        self.detach_node(id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Remove a vertex from the arena, the unique indexes and the adjacency
    /// lists; the caller maintains `label_index`.
    fn detach_node(&mut self, id: NodeId) -> Option<Node> {
        let idx = id.slot();
        let node = self.nodes.get_mut(idx)?.take()?;
        self.indexes.unindex_node(&node);

        let outgoing = std::mem::take(&mut self.outgoing[idx]);
        let incoming = std::mem::take(&mut self.incoming[idx]);
        for edge_id in outgoing.iter().chain(incoming.iter()) {
            // A self-loop shows up in both lists
            let _ = self.remove_edge(*edge_id);
        }
        Some(node)
    }

    /// Ids of the vertices of `label` whose `key` property equals `value`.
    ///
    /// Served by the unique index when one exists on `(label, key)`,
    /// otherwise by a scan of the type's members.
    pub fn find_nodes(&self, label: &Label, key: &str, value: &PropertyValue) -> Vec<NodeId> {
        if let (Some(index), Some(index_key)) =
            (self.indexes.get_index(label, key), IndexKey::from_value(value))
        {
            return index.get(&index_key).into_iter().collect();
        }

        self.nodes_by_label(label)
            .into_iter()
            .filter(|node| node.get_property(key) == Some(value))
            .map(|node| node.id)
            .collect()
    }

    /// All vertices of a type, in id order
    pub fn nodes_by_label(&self, label: &Label) -> Vec<&Node> {
        self.label_index
            .get(label)
            .map(|ids| ids.iter().filter_map(|&id| self.get_node(id)).collect())
            .unwrap_or_default()
    }

    pub fn count_nodes(&self, label: &Label) -> usize {
        self.label_index.get(label).map_or(0, BTreeSet::len)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    // ============================================================
    // Edges
    // ============================================================

    /// Create an edge with an auto-generated id
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: &EdgeType,
        properties: PropertyMap,
    ) -> GraphResult<EdgeId> {
        let id = EdgeId::new(self.next_edge_id);
        self.insert_edge(Edge::new(id, source, target, edge_type.clone(), properties))
    }

    /// Insert an edge keeping its id (used by `add_edge` and WAL replay)
    pub fn insert_edge(&mut self, edge: Edge) -> GraphResult<EdgeId> {
        let Edge { id, source, target, edge_type, properties } = edge;
        let class = self
            .catalog
            .edge_class(&edge_type)
            .ok_or_else(|| GraphError::TypeNotFound(edge_type.to_string()))?;
        let properties = class.check(edge_type.as_str(), properties)?;

        if !self.has_node(source) {
            return Err(GraphError::InvalidEdgeSource(source));
        }
        if !self.has_node(target) {
            return Err(GraphError::InvalidEdgeTarget(target));
        }
        if self.has_edge(id) {
            return Err(GraphError::EdgeAlreadyExists(id));
        }

        let idx = id.slot();
        if idx >= self.edges.len() {
            self.edges.resize(idx + 1, None);
        }

        self.outgoing[source.slot()].push(id);
        self.incoming[target.slot()].push(id);
        self.edge_type_index.entry(edge_type.clone()).or_default().insert(id);
        self.edges[idx] = Some(Edge::new(id, source, target, edge_type, properties));

        if id.as_u64() >= self.next_edge_id {
            self.next_edge_id = id.as_u64() + 1;
        }
        Ok(id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn has_edge(&self, id: EdgeId) -> bool {
        self.get_edge(id).is_some()
    }

    /// Delete an edge
    pub fn remove_edge(&mut self, id: EdgeId) -> GraphResult<Edge> {
        let edge = self
            .edges
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(GraphError::EdgeNotFound(id))?;

        if let Some(members) = self.edge_type_index.get_mut(&edge.edge_type) {
            members.remove(&id);
        }
        if let Some(adj) = self.outgoing.get_mut(edge.source.slot()) {
            adj.retain(|&eid| eid != id);
        }
        if let Some(adj) = self.incoming.get_mut(edge.target.slot()) {
            adj.retain(|&eid| eid != id);
        }
        Ok(edge)
    }

    /// All edges of a type, in id order
    pub fn edges_by_type(&self, edge_type: &EdgeType) -> Vec<&Edge> {
        self.edge_type_index
            .get(edge_type)
            .map(|ids| ids.iter().filter_map(|&id| self.get_edge(id)).collect())
            .unwrap_or_default()
    }

    pub fn count_edges(&self, edge_type: &EdgeType) -> usize {
        self.edge_type_index.get(edge_type).map_or(0, BTreeSet::len)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().flatten().count()
    }

    /// All vertices, in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    /// All edges, in id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().flatten()
    }

    /// The ids the next `add_node` and `add_edge` will hand out
    pub fn next_ids(&self) -> (u64, u64) {
        (self.next_node_id, self.next_edge_id)
    }

    /// Never hand out ids below these, even if no element holds them
    pub fn reserve_ids(&mut self, next_node_id: u64, next_edge_id: u64) {
        self.next_node_id = self.next_node_id.max(next_node_id);
        self.next_edge_id = self.next_edge_id.max(next_edge_id);
    }

    /// Clear all data and schema
    pub fn clear(&mut self) {
        *self = GraphStore::new();
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

//! Directed edge representation

use super::property::{PropertyMap, PropertyValue};
use super::types::{EdgeId, EdgeType, NodeId};
use serde::{Deserialize, Serialize};

/// A directed edge in the property graph
///
/// Several edges of the same type may connect the same pair of vertices (a
/// user who tagged a movie twice has two `Tag` edges to it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Store-assigned identifier
    pub id: EdgeId,

    /// Source vertex (edge goes FROM this vertex)
    pub source: NodeId,

    /// Target vertex (edge goes TO this vertex)
    pub target: NodeId,

    /// Relationship type (e.g. "Rate", "is_genre")
    pub edge_type: EdgeType,

    /// Properties associated with this edge
    pub properties: PropertyMap,
}

impl Edge {
    pub fn new(
        id: EdgeId,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
        properties: PropertyMap,
    ) -> Self {
        Edge {
            id,
            source,
            target,
            edge_type: edge_type.into(),
            properties,
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Check if this edge touches a vertex at either end
    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.target == node
    }

    /// Check if this edge goes FROM `source` TO `target`
    pub fn links(&self, source: NodeId, target: NodeId) -> bool {
        self.source == source && self.target == target
    }
}

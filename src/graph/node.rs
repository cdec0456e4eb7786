//! Vertex representation

use super::property::{PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use serde::{Deserialize, Serialize};

/// A vertex in the property graph
///
/// Unlike a general labelled property graph, a vertex here belongs to exactly
/// one vertex type; the type decides which properties are declared and which
/// unique indexes apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Store-assigned identifier
    pub id: NodeId,

    /// Vertex type
    pub label: Label,

    /// Properties associated with this vertex
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<Label>, properties: PropertyMap) -> Self {
        Node {
            id,
            label: label.into(),
            properties,
        }
    }

    pub fn has_label(&self, label: &Label) -> bool {
        &self.label == label
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}

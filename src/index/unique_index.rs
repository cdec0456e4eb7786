//! Hash-based unique index for point lookups by key value

use crate::graph::{NodeId, PropertyValue};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Indexable form of a property value.
///
/// Only strings and integers can carry a unique index; floats have no
/// reliable equality and booleans/nulls make poor keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexKey {
    String(String),
    Integer(i64),
}

impl IndexKey {
    pub fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::String(s) => Some(IndexKey::String(s.clone())),
            PropertyValue::Integer(i) => Some(IndexKey::Integer(*i)),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::String(s) => write!(f, "\"{}\"", s),
            IndexKey::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// Unique index for one property of one vertex type
#[derive(Debug, Clone, Default)]
pub struct UniqueIndex {
    entries: FxHashMap<IndexKey, NodeId>,
}

impl UniqueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for `node_id`. On conflict the current owner is returned
    /// and the index is left unchanged.
    pub fn insert(&mut self, key: IndexKey, node_id: NodeId) -> Result<(), NodeId> {
        match self.entries.get(&key) {
            Some(&owner) if owner != node_id => Err(owner),
            _ => {
                self.entries.insert(key, node_id);
                Ok(())
            }
        }
    }

    /// Whether `key` could be claimed by `node_id`
    pub fn check(&self, key: &IndexKey, node_id: NodeId) -> Result<(), NodeId> {
        match self.entries.get(key) {
            Some(&owner) if owner != node_id => Err(owner),
            _ => Ok(()),
        }
    }

    /// Release `key` if it is held by `node_id`
    pub fn remove(&mut self, key: &IndexKey, node_id: NodeId) {
        if self.entries.get(key) == Some(&node_id) {
            self.entries.remove(key);
        }
    }

    pub fn get(&self, key: &IndexKey) -> Option<NodeId> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Identifier and type-name definitions for the embedded graph store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a vertex, assigned by the store on insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn slot(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#v{}", self.0)
    }
}

/// Identifier of an edge, assigned by the store on insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EdgeId(pub u64);

impl EdgeId {
    pub fn new(id: u64) -> Self {
        EdgeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn slot(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#e{}", self.0)
    }
}

/// Vertex type name (e.g. "Genre", "Movie")
///
/// Every vertex belongs to exactly one vertex type, which must be declared in
/// the schema catalog before the first insertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Label(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label(s)
    }
}

/// Edge type name (e.g. "Rate", "is_genre")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EdgeType(String);

impl EdgeType {
    pub fn new(edge_type: impl Into<String>) -> Self {
        EdgeType(edge_type.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeType {
    fn from(s: &str) -> Self {
        EdgeType(s.to_string())
    }
}

impl From<String> for EdgeType {
    fn from(s: String) -> Self {
        EdgeType(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_with_kind_prefix() {
        assert_eq!(NodeId::new(7).to_string(), "#v7");
        assert_eq!(EdgeId::new(7).to_string(), "#e7");
        assert_eq!(NodeId::new(3).slot(), 3);
    }

    #[test]
    fn test_type_names() {
        let label: Label = "Movie".into();
        assert_eq!(label.as_str(), "Movie");
        assert_eq!(label, Label::new(String::from("Movie")));

        let edge_type = EdgeType::new("is_genre");
        assert_eq!(format!("{}", edge_type), "is_genre");
    }

    #[test]
    fn test_id_ordering() {
        assert!(NodeId::new(1) < NodeId::new(2));
        assert!(EdgeId::new(10) > EdgeId::new(9));
    }
}

//! Manager for unique indexes
//!
//! Handles installation, dropping and maintenance of the unique indexes declared
//! on vertex types.

use super::unique_index::{IndexKey, UniqueIndex};
use crate::graph::{Label, Node, NodeId};
use rustc_hash::FxHashMap;

/// Key for identifying a unique index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexId {
    pub label: Label,
    pub property: String,
}

impl IndexId {
    pub fn new(label: &Label, property: &str) -> Self {
        Self {
            label: label.clone(),
            property: property.to_string(),
        }
    }

    /// Conventional index name, e.g. `Genre.name`
    pub fn name(&self) -> String {
        format!("{}.{}", self.label, self.property)
    }
}

/// A unique constraint a vertex would break
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub index: IndexId,
    pub key: IndexKey,
    pub owner: NodeId,
}

/// All unique indexes of a store
#[derive(Debug, Default)]
pub struct IndexManager {
    indices: FxHashMap<IndexId, UniqueIndex>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fully built index
    pub fn install(&mut self, id: IndexId, index: UniqueIndex) {
        self.indices.insert(id, index);
    }

    /// Drop every index declared on a vertex type
    pub fn drop_label(&mut self, label: &Label) -> usize {
        let before = self.indices.len();
        self.indices.retain(|id, _| &id.label != label);
        before - self.indices.len()
    }

    pub fn has_index(&self, label: &Label, property: &str) -> bool {
        self.indices.contains_key(&IndexId::new(label, property))
    }

    pub fn get_index(&self, label: &Label, property: &str) -> Option<&UniqueIndex> {
        self.indices.get(&IndexId::new(label, property))
    }

    /// Declared indexes, ordered by name
    pub fn ids(&self) -> Vec<&IndexId> {
        let mut ids: Vec<_> = self.indices.keys().collect();
        ids.sort_by_key(|id| id.name());
        ids
    }

    /// First unique constraint `node` would violate, if any
    pub fn find_conflict(&self, node: &Node) -> Option<Conflict> {
        self.indices
            .iter()
            .filter(|(id, _)| id.label == node.label)
            .find_map(|(id, index)| {
                let key = IndexKey::from_value(node.get_property(&id.property)?)?;
                index.check(&key, node.id).err().map(|owner| Conflict {
                    index: id.clone(),
                    key,
                    owner,
                })
            })
    }

    /// Index a vertex; call `find_conflict` first
    pub fn index_node(&mut self, node: &Node) {
        for (id, index) in self.indices.iter_mut().filter(|(id, _)| id.label == node.label) {
            if let Some(key) = node.get_property(&id.property).and_then(IndexKey::from_value) {
                // Conflicts were ruled out by the caller
                let _ = index.insert(key, node.id);
            }
        }
    }

    /// Remove a vertex from every index of its type
    pub fn unindex_node(&mut self, node: &Node) {
        for (id, index) in self.indices.iter_mut().filter(|(id, _)| id.label == node.label) {
            if let Some(key) = node.get_property(&id.property).and_then(IndexKey::from_value) {
                index.remove(&key, node.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::property::property_map;

    fn empty_index(manager: &mut IndexManager, label: &str, property: &str) {
        manager.install(IndexId::new(&Label::new(label), property), UniqueIndex::new());
    }

    fn genre(id: u64, name: &str) -> Node {
        Node::new(NodeId::new(id), "Genre", property_map([("name", name.into())]))
    }

    #[test]
    fn test_conflict_detection() {
        let mut manager = IndexManager::new();
        empty_index(&mut manager, "Genre", "name");

        let drama = genre(1, "Drama");
        assert_eq!(manager.find_conflict(&drama), None);
        manager.index_node(&drama);

        let conflict = manager.find_conflict(&genre(2, "Drama")).unwrap();
        assert_eq!(conflict.owner, NodeId::new(1));
        assert_eq!(conflict.index.name(), "Genre.name");
        assert_eq!(conflict.key, IndexKey::String("Drama".to_string()));

        manager.unindex_node(&drama);
        assert_eq!(manager.find_conflict(&genre(2, "Drama")), None);
    }

    #[test]
    fn test_other_labels_are_ignored() {
        let mut manager = IndexManager::new();
        empty_index(&mut manager, "Genre", "name");
        let movie = Node::new(NodeId::new(9), "Movie", property_map([("name", "Heat".into())]));

        manager.index_node(&movie);
        assert!(manager.get_index(&Label::new("Genre"), "name").unwrap().is_empty());
    }

    #[test]
    fn test_drop_label() {
        let mut manager = IndexManager::new();
        empty_index(&mut manager, "Movie", "movieId");
        empty_index(&mut manager, "Movie", "name");
        empty_index(&mut manager, "User", "userId");
        let names: Vec<_> = manager.ids().iter().map(|id| id.name()).collect();
        assert_eq!(names, vec!["Movie.movieId", "Movie.name", "User.userId"]);

        assert_eq!(manager.drop_label(&Label::new("Movie")), 2);
        assert!(manager.has_index(&Label::new("User"), "userId"));
        assert!(!manager.has_index(&Label::new("Movie"), "name"));
    }
}

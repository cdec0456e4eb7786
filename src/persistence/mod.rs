//! Persistence layer for `plocal:` databases
//!
//! A database directory holds only WAL files. Opening it replays the log
//! into a fresh [`GraphStore`], then compacts the log down to a snapshot of
//! that store when replay went through superseded history (a dataset that
//! was dropped and reloaded, rolled-forward deletes). Committed sessions
//! append to it.

pub mod wal;

pub use wal::{Wal, WalEntry, WalError, WalResult};

use crate::graph::{GraphResult, GraphStore};
use std::path::Path;
use tracing::{debug, info};

/// Apply one logged change to a store
pub fn apply_entry(store: &mut GraphStore, entry: WalEntry) -> GraphResult<()> {
    match entry {
        WalEntry::CreateVertexType { label } => store.create_vertex_type(&label),
        WalEntry::CreateEdgeType { edge_type } => store.create_edge_type(&edge_type),
        WalEntry::DropVertexType { label } => store.drop_vertex_type(&label).map(|_| ()),
        WalEntry::DropEdgeType { edge_type } => store.drop_edge_type(&edge_type).map(|_| ()),
        WalEntry::CreateProperty { class, name, ty } => store.declare_property(&class, &name, ty),
        WalEntry::CreateUniqueIndex { label, property } => {
            store.create_unique_index(&label, &property)
        }
        WalEntry::CreateNode(node) => store.insert_node(node).map(|_| ()),
        WalEntry::CreateEdge(edge) => store.insert_edge(edge).map(|_| ()),
        WalEntry::Checkpoint { next_node_id, next_edge_id } => {
            store.clear();
            store.reserve_ids(next_node_id, next_edge_id);
            Ok(())
        }
    }
}

/// The entries that rebuild `store` from nothing: a checkpoint, the schema,
/// the unique indexes, then every vertex and edge in id order
pub fn snapshot(store: &GraphStore) -> Vec<WalEntry> {
    let (next_node_id, next_edge_id) = store.next_ids();
    let mut entries = vec![WalEntry::Checkpoint { next_node_id, next_edge_id }];

    let catalog = store.catalog();
    for label in catalog.vertex_types() {
        entries.push(WalEntry::CreateVertexType { label: label.clone() });
        if let Some(class) = catalog.vertex_class(label) {
            entries.extend(class.properties().map(|(name, ty)| WalEntry::CreateProperty {
                class: label.to_string(),
                name: name.to_string(),
                ty,
            }));
        }
    }
    for edge_type in catalog.edge_types() {
        entries.push(WalEntry::CreateEdgeType { edge_type: edge_type.clone() });
        if let Some(class) = catalog.edge_class(edge_type) {
            entries.extend(class.properties().map(|(name, ty)| WalEntry::CreateProperty {
                class: edge_type.to_string(),
                name: name.to_string(),
                ty,
            }));
        }
    }
    for id in store.indexes().ids() {
        entries.push(WalEntry::CreateUniqueIndex {
            label: id.label.clone(),
            property: id.property.clone(),
        });
    }

    entries.extend(store.nodes().cloned().map(WalEntry::CreateNode));
    entries.extend(store.edges().cloned().map(WalEntry::CreateEdge));
    entries
}

/// Open the database in `dir` and rebuild its store from the WAL
pub fn recover(dir: impl AsRef<Path>) -> WalResult<(GraphStore, Wal)> {
    let mut wal = Wal::open(dir)?;
    let mut store = GraphStore::new();
    let replayed = wal.replay(|entry| apply_entry(&mut store, entry).map_err(WalError::from))?;

    let live = snapshot(&store);
    if replayed > live.len() as u64 {
        debug!(
            "WAL holds {} entries for {} live ones, compacting",
            replayed,
            live.len()
        );
        wal.compact(live)?;
    }

    info!(
        "Recovered {} vertices and {} edges from {:?}",
        store.node_count(),
        store.edge_count(),
        wal.path()
    );
    Ok((store, wal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{property_map, EdgeType, Label, Node, NodeId, PropertyType, PropertyValue};
    use tempfile::TempDir;

    #[test]
    fn test_recover_rebuilds_store() {
        let temp_dir = TempDir::new().unwrap();
        let (genre_id, movie_id) = {
            let (mut store, mut wal) = recover(temp_dir.path()).unwrap();
            let entries = vec![
                WalEntry::CreateVertexType { label: Label::new("Genre") },
                WalEntry::CreateVertexType { label: Label::new("Movie") },
                WalEntry::CreateEdgeType { edge_type: EdgeType::new("is_genre") },
                WalEntry::CreateProperty {
                    class: "Genre".to_string(),
                    name: "name".to_string(),
                    ty: PropertyType::String,
                },
                WalEntry::CreateUniqueIndex {
                    label: Label::new("Genre"),
                    property: "name".to_string(),
                },
            ];
            for entry in entries {
                apply_entry(&mut store, entry.clone()).unwrap();
                wal.append(entry).unwrap();
            }

            let genre = store
                .add_node(&Label::new("Genre"), property_map([("name", "Comedy".into())]))
                .unwrap();
            let movie = store
                .add_node(&Label::new("Movie"), property_map([("movieId", 1i64.into())]))
                .unwrap();
            let edge = store
                .add_edge(movie, genre, &EdgeType::new("is_genre"), Default::default())
                .unwrap();
            for node in [genre, movie] {
                wal.append(WalEntry::CreateNode(store.get_node(node).unwrap().clone()))
                    .unwrap();
            }
            wal.append(WalEntry::CreateEdge(store.get_edge(edge).unwrap().clone()))
                .unwrap();
            (genre, movie)
        };

        let (store, wal) = recover(temp_dir.path()).unwrap();
        assert_eq!(wal.sequence(), 8);
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edges().filter(|edge| edge.source == movie_id).count(), 1);
        assert!(store.indexes().has_index(&Label::new("Genre"), "name"));
        assert_eq!(
            store.find_nodes(&Label::new("Genre"), "name", &PropertyValue::from("Comedy")),
            vec![genre_id]
        );
    }

    fn wal_file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().flatten().count()
    }

    #[test]
    fn test_recover_compacts_superseded_history() {
        let temp_dir = TempDir::new().unwrap();
        let user = Label::new("User");
        let dropped = {
            let (mut store, mut wal) = recover(temp_dir.path()).unwrap();
            let mut log = |store: &mut GraphStore, entry: WalEntry| {
                apply_entry(store, entry.clone()).unwrap();
                wal.append(entry).unwrap();
            };
            log(&mut store, WalEntry::CreateVertexType { label: user.clone() });
            log(
                &mut store,
                WalEntry::CreateProperty {
                    class: "User".to_string(),
                    name: "userId".to_string(),
                    ty: PropertyType::Integer,
                },
            );
            for id in 1..=3u64 {
                let node = Node::new(
                    NodeId::new(id),
                    "User",
                    property_map([("userId", (id as i64).into())]),
                );
                log(&mut store, WalEntry::CreateNode(node));
            }
            // Reload: drop everything and keep one user
            log(&mut store, WalEntry::DropVertexType { label: user.clone() });
            log(&mut store, WalEntry::CreateVertexType { label: user.clone() });
            let node = Node::new(NodeId::new(4), "User", property_map([("userId", 7i64.into())]));
            log(&mut store, WalEntry::CreateNode(node));
            NodeId::new(3)
        };

        let (store, _) = recover(temp_dir.path()).unwrap();
        assert_eq!(store.count_nodes(&user), 1);
        assert!(!store.has_node(dropped));
        assert_eq!(wal_file_count(temp_dir.path()), 1);
        drop(store);

        // The compacted log replays to the same state and keeps the id floor
        let (mut store, mut wal) = recover(temp_dir.path()).unwrap();
        let mut replayed = 0;
        Wal::open(temp_dir.path())
            .unwrap()
            .replay(|_| {
                replayed += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(replayed, snapshot(&store).len());
        assert_eq!(store.count_nodes(&user), 1);
        let next = store.add_node(&user, property_map([("userId", 8i64.into())])).unwrap();
        assert_eq!(next, NodeId::new(5));
        wal.flush().unwrap();
    }

    #[test]
    fn test_snapshot_rebuilds_equal_store() {
        let mut store = GraphStore::new();
        store.create_vertex_type(&Label::new("Movie")).unwrap();
        store.declare_property("Movie", "movieId", PropertyType::Integer).unwrap();
        store.create_unique_index(&Label::new("Movie"), "movieId").unwrap();
        store.create_edge_type(&EdgeType::new("Rate")).unwrap();
        store.declare_property("Rate", "rating", PropertyType::Float).unwrap();
        let movie = store
            .add_node(&Label::new("Movie"), property_map([("movieId", 1i64.into())]))
            .unwrap();
        store
            .add_edge(movie, movie, &EdgeType::new("Rate"), property_map([("rating", 4.0.into())]))
            .unwrap();

        let mut rebuilt = GraphStore::new();
        for entry in snapshot(&store) {
            apply_entry(&mut rebuilt, entry).unwrap();
        }
        assert_eq!(rebuilt.next_ids(), store.next_ids());
        assert_eq!(rebuilt.nodes().collect::<Vec<_>>(), store.nodes().collect::<Vec<_>>());
        assert_eq!(rebuilt.edges().collect::<Vec<_>>(), store.edges().collect::<Vec<_>>());
        assert!(rebuilt.indexes().has_index(&Label::new("Movie"), "movieId"));
        assert_eq!(
            rebuilt.catalog().edge_class(&EdgeType::new("Rate")).unwrap().property_type("rating"),
            Some(PropertyType::Float)
        );
    }

    #[test]
    fn test_replayed_drop_cascades() {
        let mut store = GraphStore::new();
        apply_entry(&mut store, WalEntry::CreateVertexType { label: Label::new("User") }).unwrap();
        store
            .add_node(&Label::new("User"), property_map([("userId", 1i64.into())]))
            .unwrap();

        apply_entry(&mut store, WalEntry::DropVertexType { label: Label::new("User") }).unwrap();
        assert_eq!(store.node_count(), 0);
        assert!(apply_entry(&mut store, WalEntry::DropVertexType { label: Label::new("User") })
            .is_err());
    }
}

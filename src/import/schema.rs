//! Vertex and edge type definitions of the dataset and their reset
//!
//! Resetting a type drops it (with everything stored under it) and declares
//! it again with its typed properties and unique key. Schema changes are
//! applied outside any transaction.

use tracing::{debug, info};

use crate::graph::{EdgeType, Label, PropertyType};
use crate::session::{GraphSession, SessionResult};

pub const GENRE: &str = "Genre";
pub const USER: &str = "User";
pub const MOVIE: &str = "Movie";
pub const IS_GENRE: &str = "is_genre";
pub const RATE: &str = "Rate";
pub const TAG: &str = "Tag";

/// A vertex type with its declared properties and optional unique key
#[derive(Debug, Clone, PartialEq)]
pub struct VertexTypeDef {
    pub name: Label,
    pub properties: Vec<(String, PropertyType)>,
    pub unique_key: Option<String>,
}

impl VertexTypeDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: Label::new(name),
            properties: Vec::new(),
            unique_key: None,
        }
    }

    pub fn property(mut self, name: &str, ty: PropertyType) -> Self {
        self.properties.push((name.to_string(), ty));
        self
    }

    pub fn unique(mut self, key: &str) -> Self {
        self.unique_key = Some(key.to_string());
        self
    }
}

/// An edge type with its declared properties
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeTypeDef {
    pub name: EdgeType,
    pub properties: Vec<(String, PropertyType)>,
}

impl EdgeTypeDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: EdgeType::new(name),
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, name: &str, ty: PropertyType) -> Self {
        self.properties.push((name.to_string(), ty));
        self
    }
}

/// All types an import run manages
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchema {
    pub vertex_types: Vec<VertexTypeDef>,
    pub edge_types: Vec<EdgeTypeDef>,
}

impl DatasetSchema {
    pub fn vertex_type(&self, name: &str) -> Option<&VertexTypeDef> {
        self.vertex_types.iter().find(|def| def.name.as_str() == name)
    }

    pub fn edge_type(&self, name: &str) -> Option<&EdgeTypeDef> {
        self.edge_types.iter().find(|def| def.name.as_str() == name)
    }
}

/// Genre, User and Movie vertices linked by is_genre, Rate and Tag edges
pub fn movielens_schema() -> DatasetSchema {
    DatasetSchema {
        vertex_types: vec![
            VertexTypeDef::new(GENRE)
                .property("name", PropertyType::String)
                .unique("name"),
            VertexTypeDef::new(USER)
                .property("userId", PropertyType::Integer)
                .unique("userId"),
            VertexTypeDef::new(MOVIE)
                .property("name", PropertyType::String)
                .property("movieId", PropertyType::Integer)
                .unique("movieId"),
        ],
        edge_types: vec![
            EdgeTypeDef::new(IS_GENRE),
            EdgeTypeDef::new(RATE)
                .property("rating", PropertyType::Float)
                .property("timestamp", PropertyType::Integer),
            EdgeTypeDef::new(TAG)
                .property("tag", PropertyType::String)
                .property("timestamp", PropertyType::Integer),
        ],
    }
}

fn drop_vertex_type<S: GraphSession + ?Sized>(session: &mut S, name: &Label) -> SessionResult<()> {
    if session.has_vertex_type(name)? {
        let removed = session.drop_vertex_type(name)?;
        debug!("Dropped vertex type {} with {} vertices", name, removed);
    }
    Ok(())
}

fn drop_edge_type<S: GraphSession + ?Sized>(session: &mut S, name: &EdgeType) -> SessionResult<()> {
    if session.has_edge_type(name)? {
        let removed = session.drop_edge_type(name)?;
        debug!("Dropped edge type {} with {} edges", name, removed);
    }
    Ok(())
}

fn create_vertex_type<S: GraphSession + ?Sized>(
    session: &mut S,
    def: &VertexTypeDef,
) -> SessionResult<()> {
    session.create_vertex_type(&def.name)?;
    for (property, ty) in &def.properties {
        session.create_property(def.name.as_str(), property, *ty)?;
    }
    if let Some(key) = &def.unique_key {
        session.create_unique_index(&def.name, key)?;
    }
    Ok(())
}

fn create_edge_type<S: GraphSession + ?Sized>(session: &mut S, def: &EdgeTypeDef) -> SessionResult<()> {
    session.create_edge_type(&def.name)?;
    for (property, ty) in &def.properties {
        session.create_property(def.name.as_str(), property, *ty)?;
    }
    Ok(())
}

/// Drop a vertex type if it exists and declare it afresh
pub fn reset_vertex_type<S: GraphSession + ?Sized>(
    session: &mut S,
    def: &VertexTypeDef,
) -> SessionResult<()> {
    drop_vertex_type(session, &def.name)?;
    create_vertex_type(session, def)
}

/// Drop an edge type if it exists and declare it afresh
pub fn reset_edge_type<S: GraphSession + ?Sized>(session: &mut S, def: &EdgeTypeDef) -> SessionResult<()> {
    drop_edge_type(session, &def.name)?;
    create_edge_type(session, def)
}

/// Reset every type of `schema`: edge types are dropped before vertex types,
/// then everything is declared again
pub fn reset_dataset<S: GraphSession + ?Sized>(session: &mut S, schema: &DatasetSchema) -> SessionResult<()> {
    for def in &schema.edge_types {
        drop_edge_type(session, &def.name)?;
    }
    for def in &schema.vertex_types {
        drop_vertex_type(session, &def.name)?;
    }
    for def in &schema.vertex_types {
        create_vertex_type(session, def)?;
    }
    for def in &schema.edge_types {
        create_edge_type(session, def)?;
    }

    info!(
        "Schema reset: {} vertex types, {} edge types",
        schema.vertex_types.len(),
        schema.edge_types.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::property_map;
    use crate::session::{EmbeddedSession, SessionError};

    #[test]
    fn test_reset_dataset_declares_everything() {
        let mut session = EmbeddedSession::in_memory();
        let schema = movielens_schema();
        reset_dataset(&mut session, &schema).unwrap();

        for name in [GENRE, USER, MOVIE] {
            assert!(session.has_vertex_type(&Label::new(name)).unwrap());
        }
        for name in [IS_GENRE, RATE, TAG] {
            assert!(session.has_edge_type(&EdgeType::new(name)).unwrap());
        }
        assert_eq!(schema.vertex_type(MOVIE).unwrap().unique_key.as_deref(), Some("movieId"));
        assert!(schema.edge_type(TAG).is_some());
    }

    #[test]
    fn test_reset_vertex_type_drops_instances() {
        let mut session = EmbeddedSession::in_memory();
        let schema = movielens_schema();
        let genre = schema.vertex_type(GENRE).unwrap();
        reset_vertex_type(&mut session, genre).unwrap();

        session
            .add_vertex(&genre.name, property_map([("name", "Drama".into())]))
            .unwrap();
        session.commit().unwrap();

        reset_vertex_type(&mut session, genre).unwrap();
        assert_eq!(session.count_vertices(&genre.name).unwrap(), 0);

        // The unique index is back
        session
            .add_vertex(&genre.name, property_map([("name", "Drama".into())]))
            .unwrap();
        let dup = session.add_vertex(&genre.name, property_map([("name", "Drama".into())]));
        assert!(dup.is_err());
    }

    #[test]
    fn test_reset_edge_type_keeps_vertices() {
        let mut session = EmbeddedSession::in_memory();
        let schema = movielens_schema();
        reset_dataset(&mut session, &schema).unwrap();

        let user = session
            .add_vertex(&Label::new(USER), property_map([("userId", 1i64.into())]))
            .unwrap();
        let movie = session
            .add_vertex(&Label::new(MOVIE), property_map([("movieId", 1i64.into())]))
            .unwrap();
        session
            .add_edge(user, movie, &EdgeType::new(RATE), property_map([("rating", 4.0.into())]))
            .unwrap();
        session.commit().unwrap();

        reset_edge_type(&mut session, schema.edge_type(RATE).unwrap()).unwrap();
        assert_eq!(session.count_edges(&EdgeType::new(RATE)).unwrap(), 0);
        assert_eq!(session.count_vertices(&Label::new(USER)).unwrap(), 1);
    }

    #[test]
    fn test_reset_refused_with_pending_writes() {
        let mut session = EmbeddedSession::in_memory();
        let schema = movielens_schema();
        reset_dataset(&mut session, &schema).unwrap();
        session
            .add_vertex(&Label::new(USER), property_map([("userId", 1i64.into())]))
            .unwrap();

        let result = reset_dataset(&mut session, &schema);
        assert!(matches!(result, Err(SessionError::PendingTransaction(1))));
    }
}

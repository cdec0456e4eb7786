//! Schema catalog: declared vertex/edge types and their typed properties
//!
//! Type names share one namespace, so "Tag" cannot be both a vertex type and
//! an edge type. Properties not declared on a type are accepted untyped.

use super::property::{PropertyMap, PropertyValue};
use super::store::{GraphError, GraphResult};
use super::types::{EdgeType, Label};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a declared property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Integer,
    Float,
}

impl PropertyType {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::Integer => "Integer",
            PropertyType::Float => "Float",
        }
    }

    /// Check a value against this type, widening an integer to a float.
    /// Returns the rejected value on mismatch.
    pub fn coerce(&self, value: PropertyValue) -> Result<PropertyValue, PropertyValue> {
        match (self, value) {
            (_, PropertyValue::Null) => Ok(PropertyValue::Null),
            (PropertyType::String, v @ PropertyValue::String(_)) => Ok(v),
            (PropertyType::Integer, v @ PropertyValue::Integer(_)) => Ok(v),
            (PropertyType::Float, v @ PropertyValue::Float(_)) => Ok(v),
            (PropertyType::Float, PropertyValue::Integer(i)) => Ok(PropertyValue::Float(i as f64)),
            (_, other) => Err(other),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a catalog entry describes vertices or edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Vertex,
    Edge,
}

/// Declared properties of one vertex or edge type, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDef {
    properties: IndexMap<String, PropertyType>,
}

impl ClassDef {
    pub fn property_type(&self, name: &str) -> Option<PropertyType> {
        self.properties.get(name).copied()
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, PropertyType)> {
        self.properties.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    /// Type-check a property map against the declared properties
    pub fn check(&self, class: &str, properties: PropertyMap) -> GraphResult<PropertyMap> {
        properties
            .into_iter()
            .map(|(key, value)| match self.properties.get(&key) {
                None => Ok((key, value)),
                Some(ty) => match ty.coerce(value) {
                    Ok(value) => Ok((key, value)),
                    Err(rejected) => Err(GraphError::PropertyTypeMismatch {
                        class: class.to_string(),
                        property: key,
                        expected: ty.name(),
                        found: rejected.type_name(),
                    }),
                },
            })
            .collect()
    }
}

/// All declared types of a store
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    vertex_types: IndexMap<Label, ClassDef>,
    edge_types: IndexMap<EdgeType, ClassDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_vertex_type(&self, label: &Label) -> bool {
        self.vertex_types.contains_key(label)
    }

    pub fn has_edge_type(&self, edge_type: &EdgeType) -> bool {
        self.edge_types.contains_key(edge_type)
    }

    pub fn kind_of(&self, name: &str) -> Option<ClassKind> {
        if self.vertex_types.contains_key(&Label::new(name)) {
            Some(ClassKind::Vertex)
        } else if self.edge_types.contains_key(&EdgeType::new(name)) {
            Some(ClassKind::Edge)
        } else {
            None
        }
    }

    pub fn vertex_class(&self, label: &Label) -> Option<&ClassDef> {
        self.vertex_types.get(label)
    }

    pub fn edge_class(&self, edge_type: &EdgeType) -> Option<&ClassDef> {
        self.edge_types.get(edge_type)
    }

    pub fn vertex_types(&self) -> impl Iterator<Item = &Label> {
        self.vertex_types.keys()
    }

    pub fn edge_types(&self) -> impl Iterator<Item = &EdgeType> {
        self.edge_types.keys()
    }

    pub fn create_vertex_type(&mut self, label: &Label) -> GraphResult<()> {
        if self.kind_of(label.as_str()).is_some() {
            return Err(GraphError::TypeExists(label.to_string()));
        }
        self.vertex_types.insert(label.clone(), ClassDef::default());
        Ok(())
    }

    pub fn create_edge_type(&mut self, edge_type: &EdgeType) -> GraphResult<()> {
        if self.kind_of(edge_type.as_str()).is_some() {
            return Err(GraphError::TypeExists(edge_type.to_string()));
        }
        self.edge_types.insert(edge_type.clone(), ClassDef::default());
        Ok(())
    }

    pub fn drop_vertex_type(&mut self, label: &Label) -> GraphResult<ClassDef> {
        self.vertex_types
            .shift_remove(label)
            .ok_or_else(|| GraphError::TypeNotFound(label.to_string()))
    }

    pub fn drop_edge_type(&mut self, edge_type: &EdgeType) -> GraphResult<ClassDef> {
        self.edge_types
            .shift_remove(edge_type)
            .ok_or_else(|| GraphError::TypeNotFound(edge_type.to_string()))
    }

    /// Declare a typed property on a vertex or edge type.
    ///
    /// Re-declaring a property with the same type is a no-op; with a different
    /// type it is an error.
    pub fn declare_property(&mut self, class: &str, name: &str, ty: PropertyType) -> GraphResult<()> {
        let def = match self.kind_of(class) {
            Some(ClassKind::Vertex) => self.vertex_types.get_mut(&Label::new(class)),
            Some(ClassKind::Edge) => self.edge_types.get_mut(&EdgeType::new(class)),
            None => None,
        }
        .ok_or_else(|| GraphError::TypeNotFound(class.to_string()))?;

        match def.properties.get(name) {
            Some(existing) if *existing == ty => Ok(()),
            Some(_) => Err(GraphError::PropertyExists {
                class: class.to_string(),
                property: name.to_string(),
            }),
            None => {
                def.properties.insert(name.to_string(), ty);
                Ok(())
            }
        }
    }
}

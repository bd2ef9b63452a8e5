//! Persisted entities as returned by the data access port

use crate::core::field::FieldValue;
use indexmap::IndexMap;

/// An eager-loaded relation
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

/// A stored entity
///
/// `edge_ids` always reflects the stored relation identifiers; `relations`
/// only holds the edges that were eager-loaded by the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub fields: IndexMap<String, FieldValue>,
    pub edge_ids: IndexMap<String, Vec<i64>>,
    pub relations: IndexMap<String, Relation>,
}

impl Record {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: IndexMap::new(),
            edge_ids: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_relation(mut self, edge: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(edge.into(), relation);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn relation(&self, edge: &str) -> Option<&Relation> {
        self.relations.get(edge)
    }
}

//! Group-filtered rendering of records
//!
//! Fields without a serialization group are always rendered; grouped fields
//! only when the active [`GroupSet`] intersects their tags. Relations are
//! expanded under the `edges` key only when explicitly grouped in. The
//! `edges` object itself is always present, so clients can tell "relations
//! exist but were not expanded" apart from "no such attribute".

use crate::core::descriptor::{Cardinality, EntityDescriptor, Schema};
use crate::core::operation::Operation;
use crate::core::record::{Record, Relation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Default maximum nesting of expanded relations
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Failure to render a record. Always an internal fault.
#[derive(Debug, Error, PartialEq)]
pub enum SerializationFault {
    #[error("{entity}.{field} holds a value with no JSON representation")]
    Unrepresentable { entity: String, field: String },

    #[error("relation nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("no descriptor for entity kind '{0}'")]
    UnknownKind(String),
}

/// The set of serialization groups active for an operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSet(BTreeSet<String>);

impl GroupSet {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(groups.into_iter().map(Into::into).collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, group: &str) -> bool {
        self.0.contains(group)
    }

    /// Whether any of the given tags is active
    pub fn intersects(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.0.contains(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|g| g.as_str())
    }
}

/// Group sets active for each rendering operation of one entity kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationGroups {
    pub create: GroupSet,
    pub read: GroupSet,
    pub update: GroupSet,
    pub list: GroupSet,
}

impl OperationGroups {
    /// The same groups for every operation
    pub fn uniform(groups: GroupSet) -> Self {
        Self {
            create: groups.clone(),
            read: groups.clone(),
            update: groups.clone(),
            list: groups,
        }
    }

    pub fn with_read(mut self, groups: GroupSet) -> Self {
        self.read = groups;
        self
    }

    /// Groups for an operation; delete renders nothing and gets the empty set
    pub fn for_operation(&self, operation: Operation) -> &GroupSet {
        static NONE: GroupSet = GroupSet(BTreeSet::new());
        match operation {
            Operation::Create => &self.create,
            Operation::Read => &self.read,
            Operation::Update => &self.update,
            Operation::List => &self.list,
            Operation::Delete => &NONE,
        }
    }
}

/// Renders records of any kind known to the schema
pub struct Serializer {
    schema: Arc<Schema>,
    max_depth: usize,
}

impl Serializer {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Render a record with its eager-loaded relations
    pub fn render(
        &self,
        record: &Record,
        descriptor: &EntityDescriptor,
        groups: &GroupSet,
    ) -> Result<Value, SerializationFault> {
        self.render_at(record, descriptor, groups, 0).map(Value::Object)
    }

    /// Render a list of records into a JSON array
    pub fn render_all(
        &self,
        records: &[Record],
        descriptor: &EntityDescriptor,
        groups: &GroupSet,
    ) -> Result<Value, SerializationFault> {
        records
            .iter()
            .map(|r| self.render(r, descriptor, groups))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn render_at(
        &self,
        record: &Record,
        descriptor: &EntityDescriptor,
        groups: &GroupSet,
        depth: usize,
    ) -> Result<Map<String, Value>, SerializationFault> {
        if depth > self.max_depth {
            return Err(SerializationFault::TooDeep(self.max_depth));
        }

        let mut object = Map::new();
        object.insert("id".to_string(), Value::from(record.id));

        for field in descriptor.fields() {
            if !field.is_visible(groups) {
                continue;
            }
            let value = match record.field(&field.name) {
                Some(value) => value.to_json().ok_or_else(|| SerializationFault::Unrepresentable {
                    entity: descriptor.kind().to_string(),
                    field: field.name.clone(),
                })?,
                None => Value::Null,
            };
            object.insert(field.name.clone(), value);
        }

        let mut edges = Map::new();
        for edge in descriptor.edges() {
            if !edge.is_expanded(groups) {
                continue;
            }
            let target = self
                .schema
                .get(&edge.target)
                .ok_or_else(|| SerializationFault::UnknownKind(edge.target.clone()))?;

            let rendered = match (record.relation(&edge.name), edge.cardinality) {
                (Some(Relation::One(Some(related))), _) => {
                    Value::Object(self.render_at(related, target, groups, depth + 1)?)
                }
                (Some(Relation::Many(related)), _) => Value::Array(
                    related
                        .iter()
                        .map(|r| self.render_at(r, target, groups, depth + 1).map(Value::Object))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                (Some(Relation::One(None)), _) | (None, Cardinality::One) => Value::Null,
                (None, Cardinality::Many) => Value::Array(Vec::new()),
            };
            edges.insert(edge.name.clone(), rendered);
        }
        object.insert("edges".to_string(), Value::Object(edges));

        Ok(object)
    }
}

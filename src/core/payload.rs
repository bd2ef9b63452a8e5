//! Mutation payloads and the request decoder
//!
//! A [`MutationPayload`] is the decoded body of a create or update request.
//! Every attribute is a tri-state [`Patch`], so "not sent" and "explicitly
//! cleared" stay distinguishable all the way down to storage.

use crate::core::descriptor::{Cardinality, EntityDescriptor};
use crate::core::field::FieldValue;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// Presence state of one payload attribute
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Patch<T> {
    /// Not sent by the client
    #[default]
    Absent,
    /// Sent as `null`
    Null,
    /// Sent with a value
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    /// Absent or null
    pub fn is_empty(&self) -> bool {
        !matches!(self, Patch::Value(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Absent => Patch::Absent,
            Patch::Null => Patch::Null,
            Patch::Value(v) => Patch::Value(v),
        }
    }
}

/// Identifiers referenced by an edge in a payload
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeIds {
    One(i64),
    Many(Vec<i64>),
}

impl EdgeIds {
    pub fn ids(&self) -> &[i64] {
        match self {
            EdgeIds::One(id) => std::slice::from_ref(id),
            EdgeIds::Many(ids) => ids,
        }
    }
}

/// Failure to turn a request body into a payload
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("malformed body: {0}")]
    Malformed(String),

    #[error("invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },
}

/// Decoded create/update request for one entity kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationPayload {
    fields: IndexMap<String, Patch<FieldValue>>,
    edges: IndexMap<String, Patch<EdgeIds>>,
}

impl MutationPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw JSON body against a descriptor
    ///
    /// Unknown keys are ignored and missing keys stay [`Patch::Absent`].
    pub fn decode(body: &[u8], descriptor: &EntityDescriptor) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(DecodeError::Malformed("expected a JSON object".to_string()));
        };

        let mut payload = Self::new();

        for field in descriptor.fields() {
            let Some(raw) = object.remove(&field.name) else {
                continue;
            };
            let value = FieldValue::from_json(&raw, field.ty).map_err(|message| {
                DecodeError::InvalidField {
                    field: field.name.clone(),
                    message,
                }
            })?;
            match value {
                FieldValue::Null => payload.clear(&field.name),
                value => payload.set(&field.name, value),
            };
        }

        for edge in descriptor.edges() {
            let Some(raw) = object.remove(&edge.name) else {
                continue;
            };
            if raw.is_null() {
                payload.clear_edge(&edge.name);
                continue;
            }
            let invalid = |message: &str| DecodeError::InvalidField {
                field: edge.name.clone(),
                message: message.to_string(),
            };
            let ids = match edge.cardinality {
                Cardinality::One => {
                    EdgeIds::One(decode_id(&raw).ok_or_else(|| invalid("expected a positive id"))?)
                }
                Cardinality::Many => {
                    let items = raw
                        .as_array()
                        .ok_or_else(|| invalid("expected an array of ids"))?;
                    let ids = items
                        .iter()
                        .map(decode_id)
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| invalid("expected an array of positive ids"))?;
                    EdgeIds::Many(ids)
                }
            };
            payload.set_edge(&edge.name, ids);
        }

        Ok(payload)
    }

    pub fn set(&mut self, field: &str, value: FieldValue) -> &mut Self {
        self.fields.insert(field.to_string(), Patch::Value(value));
        self
    }

    pub fn clear(&mut self, field: &str) -> &mut Self {
        self.fields.insert(field.to_string(), Patch::Null);
        self
    }

    pub fn set_edge(&mut self, edge: &str, ids: EdgeIds) -> &mut Self {
        self.edges.insert(edge.to_string(), Patch::Value(ids));
        self
    }

    pub fn clear_edge(&mut self, edge: &str) -> &mut Self {
        self.edges.insert(edge.to_string(), Patch::Null);
        self
    }

    /// Presence state of a field
    pub fn field(&self, name: &str) -> Patch<&FieldValue> {
        self.fields
            .get(name)
            .map(Patch::as_ref)
            .unwrap_or(Patch::Absent)
    }

    /// Presence state of an edge
    pub fn edge(&self, name: &str) -> Patch<&EdgeIds> {
        self.edges
            .get(name)
            .map(Patch::as_ref)
            .unwrap_or(Patch::Absent)
    }

    /// Number of attributes that were sent, null included
    pub fn len(&self) -> usize {
        self.fields.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode_id(value: &Value) -> Option<i64> {
    value.as_i64().filter(|id| *id > 0)
}

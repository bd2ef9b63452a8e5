//! Static entity metadata
//!
//! An [`EntityDescriptor`] describes one entity kind: its fields, its edges
//! (relations to other kinds), the validation rules attached to both and the
//! serialization groups controlling what gets rendered. Descriptors are built
//! once at startup, collected into a [`Schema`] and shared read-only.

use crate::core::field::{FieldType, FieldValue};
use crate::core::operation::Operation;
use crate::core::serialize::GroupSet;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling descriptors
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("{entity}: duplicate attribute '{name}'")]
    DuplicateName { entity: String, name: String },

    #[error("{entity}: attribute name '{name}' is reserved")]
    ReservedName { entity: String, name: String },

    #[error("{entity}.{field}: default value does not match type {expected}")]
    DefaultTypeMismatch {
        entity: String,
        field: String,
        expected: FieldType,
    },

    #[error("{entity}.{edge}: unknown target entity '{target}'")]
    UnknownTarget {
        entity: String,
        edge: String,
        target: String,
    },

    #[error("{entity}.{edge}: inverse edge '{inverse}' not found on '{target}'")]
    UnknownInverse {
        entity: String,
        edge: String,
        target: String,
        inverse: String,
    },

    #[error("{entity}.{attribute}: empty serialization group")]
    EmptyGroup { entity: String, attribute: String },

    #[error("{entity}.{attribute}: invalid rule '{rule}': {message}")]
    InvalidRule {
        entity: String,
        attribute: String,
        rule: String,
        message: String,
    },

    #[error("duplicate entity kind '{0}'")]
    DuplicateEntity(String),
}

/// Relation cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one target
    One,
    /// An ordered set of targets
    Many,
}

/// A field of an entity
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: FieldType,
    pub nullable: bool,
    pub create_rule: Option<String>,
    pub update_rule: Option<String>,
    pub groups: Vec<String>,
    /// Storage-side default used when the field is absent on create
    pub default: Option<FieldValue>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            create_rule: None,
            update_rule: None,
            groups: Vec::new(),
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Time)
    }

    /// Allow the field to hold null (and to be cleared by an explicit null)
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Validation rule for both create and update
    pub fn validate(mut self, rule: impl Into<String>) -> Self {
        let rule = rule.into();
        self.update_rule = Some(rule.clone());
        self.create_rule = Some(rule);
        self
    }

    /// Override the rule applied on update
    pub fn validate_update(mut self, rule: impl Into<String>) -> Self {
        self.update_rule = Some(rule.into());
        self
    }

    pub fn groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn default_value(mut self, value: FieldValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Rule applied for the given mutation
    pub fn rule_for(&self, operation: Operation) -> Option<&str> {
        rule_for(&self.create_rule, &self.update_rule, operation)
    }

    /// Fields without a group are always rendered
    pub fn is_visible(&self, groups: &GroupSet) -> bool {
        self.groups.is_empty() || groups.intersects(&self.groups)
    }
}

/// An edge (relation) from one entity kind to another
#[derive(Debug, Clone)]
pub struct EdgeDescriptor {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub required: bool,
    pub create_rule: Option<String>,
    pub update_rule: Option<String>,
    pub groups: Vec<String>,
    /// Name of the edge on the target kind pointing back here
    pub inverse: Option<String>,
}

impl EdgeDescriptor {
    fn new(name: impl Into<String>, target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality,
            required: false,
            create_rule: None,
            update_rule: None,
            groups: Vec::new(),
            inverse: None,
        }
    }

    /// Singular edge
    pub fn one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Cardinality::One)
    }

    /// Plural edge
    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Cardinality::Many)
    }

    /// Storage refuses to create the entity without this edge
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn validate(mut self, rule: impl Into<String>) -> Self {
        let rule = rule.into();
        self.update_rule = Some(rule.clone());
        self.create_rule = Some(rule);
        self
    }

    pub fn validate_update(mut self, rule: impl Into<String>) -> Self {
        self.update_rule = Some(rule.into());
        self
    }

    pub fn groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn inverse(mut self, edge: impl Into<String>) -> Self {
        self.inverse = Some(edge.into());
        self
    }

    pub fn rule_for(&self, operation: Operation) -> Option<&str> {
        rule_for(&self.create_rule, &self.update_rule, operation)
    }

    /// Edges are only expanded when explicitly grouped in
    pub fn is_expanded(&self, groups: &GroupSet) -> bool {
        !self.groups.is_empty() && groups.intersects(&self.groups)
    }
}

fn rule_for<'a>(
    create: &'a Option<String>,
    update: &'a Option<String>,
    operation: Operation,
) -> Option<&'a str> {
    match operation {
        Operation::Update => update.as_deref(),
        _ => create.as_deref(),
    }
}

/// Metadata of one entity kind
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    kind: String,
    fields: Vec<FieldDescriptor>,
    edges: Vec<EdgeDescriptor>,
}

impl EntityDescriptor {
    pub fn builder(kind: impl Into<String>) -> EntityDescriptorBuilder {
        EntityDescriptorBuilder {
            kind: kind.into(),
            fields: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Entity kind name (e.g. "pet")
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn edges(&self) -> &[EdgeDescriptor] {
        &self.edges
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn edge(&self, name: &str) -> Option<&EdgeDescriptor> {
        self.edges.iter().find(|e| e.name == name)
    }

    /// Edges that must be eager-loaded to render with the given groups
    pub fn eager_edges(&self, groups: &GroupSet) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.is_expanded(groups))
            .map(|e| e.name.as_str())
            .collect()
    }
}

/// Builder checking the descriptor invariants
pub struct EntityDescriptorBuilder {
    kind: String,
    fields: Vec<FieldDescriptor>,
    edges: Vec<EdgeDescriptor>,
}

impl EntityDescriptorBuilder {
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn edge(mut self, edge: EdgeDescriptor) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn build(self) -> Result<EntityDescriptor, DescriptorError> {
        let mut seen = HashSet::new();
        let names = self
            .fields
            .iter()
            .map(|f| (&f.name, &f.groups))
            .chain(self.edges.iter().map(|e| (&e.name, &e.groups)));

        for (name, groups) in names {
            if name == "id" || name == "edges" {
                return Err(DescriptorError::ReservedName {
                    entity: self.kind.clone(),
                    name: name.clone(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(DescriptorError::DuplicateName {
                    entity: self.kind.clone(),
                    name: name.clone(),
                });
            }
            if groups.iter().any(|g| g.trim().is_empty()) {
                return Err(DescriptorError::EmptyGroup {
                    entity: self.kind.clone(),
                    attribute: name.clone(),
                });
            }
        }

        for field in &self.fields {
            if let Some(default) = &field.default {
                let matches = match (field.ty, default) {
                    (FieldType::String, FieldValue::String(_))
                    | (FieldType::Int, FieldValue::Int(_))
                    | (FieldType::Float, FieldValue::Float(_))
                    | (FieldType::Bool, FieldValue::Bool(_))
                    | (FieldType::Time, FieldValue::Time(_)) => true,
                    (_, FieldValue::Null) => field.nullable,
                    _ => false,
                };
                if !matches {
                    return Err(DescriptorError::DefaultTypeMismatch {
                        entity: self.kind.clone(),
                        field: field.name.clone(),
                        expected: field.ty,
                    });
                }
            }
        }

        Ok(EntityDescriptor {
            kind: self.kind,
            fields: self.fields,
            edges: self.edges,
        })
    }
}

/// The set of all entity kinds known to a server
#[derive(Debug, Default)]
pub struct Schema {
    entities: IndexMap<String, Arc<EntityDescriptor>>,
}

impl Schema {
    /// Assemble a schema, checking that every edge target and inverse exists
    pub fn new(descriptors: Vec<EntityDescriptor>) -> Result<Self, DescriptorError> {
        let mut entities = IndexMap::new();
        for descriptor in descriptors {
            let kind = descriptor.kind.clone();
            if entities.insert(kind.clone(), Arc::new(descriptor)).is_some() {
                return Err(DescriptorError::DuplicateEntity(kind));
            }
        }

        for descriptor in entities.values() {
            for edge in &descriptor.edges {
                let Some(target) = entities.get(&edge.target) else {
                    return Err(DescriptorError::UnknownTarget {
                        entity: descriptor.kind.clone(),
                        edge: edge.name.clone(),
                        target: edge.target.clone(),
                    });
                };
                if let Some(inverse) = &edge.inverse {
                    let points_back = target
                        .edge(inverse)
                        .is_some_and(|back| back.target == descriptor.kind);
                    if !points_back {
                        return Err(DescriptorError::UnknownInverse {
                            entity: descriptor.kind.clone(),
                            edge: edge.name.clone(),
                            target: edge.target.clone(),
                            inverse: inverse.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self { entities })
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<EntityDescriptor>> {
        self.entities.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(|k| k.as_str())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }
}

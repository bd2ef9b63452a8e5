//! Rule evaluation against mutation payloads
//!
//! The [`Validator`] is shared process-wide. It parses rule strings once,
//! caches them by source text and evaluates them against the attributes a
//! client actually sent.

use super::rules::{Check, Constraint, Rule, RuleError};
use crate::core::descriptor::{Cardinality, DescriptorError, EntityDescriptor};
use crate::core::field::{FieldType, FieldValue};
use crate::core::operation::Operation;
use crate::core::payload::{EdgeIds, MutationPayload, Patch};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A user-registered tag: receives the value and the tag parameter
pub type CustomCheck = Arc<dyn Fn(&FieldValue, Option<&str>) -> bool + Send + Sync>;

/// Field name → violation message, in descriptor order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(IndexMap<String, String>);

impl ValidationErrors {
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(|m| m.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", msgs.join(", "))
    }
}

/// Outcome of a failed validation
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The payload violates one or more rules
    #[error("validation failed: {0}")]
    Invalid(ValidationErrors),

    /// A rule itself is broken
    #[error(transparent)]
    Fault(#[from] RuleError),
}

/// The shape of the value a rule is applied to
#[derive(Debug, Clone, Copy, PartialEq)]
enum Subject {
    Field(FieldType),
    OneEdge,
    ManyEdge,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Field(ty) => write!(f, "{} field", ty),
            Subject::OneEdge => write!(f, "singular edge"),
            Subject::ManyEdge => write!(f, "plural edge"),
        }
    }
}

/// A present value under test
enum Target<'a> {
    Value(&'a FieldValue),
    Id(i64),
    Count(usize),
}

/// Process-wide validation rule evaluator
#[derive(Default)]
pub struct Validator {
    custom: HashMap<String, CustomCheck>,
    cache: RwLock<HashMap<String, Arc<Rule>>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom tag usable in rule strings
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut validator = Validator::new();
    /// validator.register("even", |value, _| value.as_integer().is_some_and(|i| i % 2 == 0));
    /// ```
    pub fn register<F>(&mut self, tag: impl Into<String>, check: F) -> &mut Self
    where
        F: Fn(&FieldValue, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.custom.insert(tag.into(), Arc::new(check));
        self.cache_mut().clear();
        self
    }

    fn cache_mut(&mut self) -> &mut HashMap<String, Arc<Rule>> {
        match self.cache.get_mut() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Parse a rule, served from the cache after the first call
    pub fn rule(&self, source: &str) -> Result<Arc<Rule>, RuleError> {
        if let Ok(cache) = self.cache.read() {
            if let Some(rule) = cache.get(source) {
                return Ok(Arc::clone(rule));
            }
        }

        let rule = Arc::new(Rule::parse(source, &self.custom)?);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(source.to_string(), Arc::clone(&rule));
        }
        Ok(rule)
    }

    /// Check every rule of a descriptor parses and fits the attribute it is on
    pub fn check_descriptor(&self, descriptor: &EntityDescriptor) -> Result<(), DescriptorError> {
        let attributes = descriptor
            .fields()
            .iter()
            .map(|f| {
                (
                    &f.name,
                    Subject::Field(f.ty),
                    [f.create_rule.as_deref(), f.update_rule.as_deref()],
                )
            })
            .chain(descriptor.edges().iter().map(|e| {
                let subject = match e.cardinality {
                    Cardinality::One => Subject::OneEdge,
                    Cardinality::Many => Subject::ManyEdge,
                };
                (
                    &e.name,
                    subject,
                    [e.create_rule.as_deref(), e.update_rule.as_deref()],
                )
            }));

        for (name, subject, rules) in attributes {
            for source in rules.into_iter().flatten() {
                let invalid = |message: String| DescriptorError::InvalidRule {
                    entity: descriptor.kind().to_string(),
                    attribute: name.clone(),
                    rule: source.to_string(),
                    message,
                };
                let rule = self.rule(source).map_err(|e| invalid(e.to_string()))?;
                for constraint in &rule.constraints {
                    ensure_supported(constraint, subject).map_err(|e| invalid(e.to_string()))?;
                }
            }
        }

        Ok(())
    }

    /// Validate a payload for a create or update operation
    ///
    /// Only attributes that were sent are evaluated; an absent or null
    /// attribute fails only when its rule contains `required`.
    pub fn validate(
        &self,
        descriptor: &EntityDescriptor,
        payload: &MutationPayload,
        operation: Operation,
    ) -> Result<(), ValidateError> {
        let mut errors = ValidationErrors::default();

        for field in descriptor.fields() {
            let Some(source) = field.rule_for(operation) else {
                continue;
            };
            let rule = self.rule(source)?;
            let subject = Subject::Field(field.ty);
            let outcome = match payload.field(&field.name) {
                Patch::Value(value) => evaluate(&rule, subject, Target::Value(value))?,
                _ => missing(&rule),
            };
            if let Some(message) = outcome {
                errors.insert(field.name.clone(), message);
            }
        }

        for edge in descriptor.edges() {
            let Some(source) = edge.rule_for(operation) else {
                continue;
            };
            let rule = self.rule(source)?;
            let outcome = match payload.edge(&edge.name) {
                Patch::Value(EdgeIds::One(id)) => {
                    evaluate(&rule, Subject::OneEdge, Target::Id(*id))?
                }
                Patch::Value(EdgeIds::Many(ids)) => {
                    evaluate(&rule, Subject::ManyEdge, Target::Count(ids.len()))?
                }
                _ => missing(&rule),
            };
            if let Some(message) = outcome {
                errors.insert(edge.name.clone(), message);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidateError::Invalid(errors))
        }
    }
}

fn missing(rule: &Rule) -> Option<String> {
    rule.is_required().then(|| "required".to_string())
}

/// First violated constraint's message, if any
fn evaluate(rule: &Rule, subject: Subject, target: Target<'_>) -> Result<Option<String>, RuleError> {
    for constraint in &rule.constraints {
        ensure_supported(constraint, subject)?;
        if !passes(constraint, &target) {
            return Ok(Some(constraint.message()));
        }
    }
    Ok(None)
}

fn ensure_supported(constraint: &Constraint, subject: Subject) -> Result<(), RuleError> {
    let supported = match &constraint.check {
        Check::Required | Check::OmitEmpty | Check::Custom(_) => true,
        Check::Gt(_) | Check::Gte(_) | Check::Lt(_) | Check::Lte(_) | Check::Len(_) => matches!(
            subject,
            Subject::Field(FieldType::Int | FieldType::Float | FieldType::String) | Subject::ManyEdge
        ),
        Check::OneOf(_) => matches!(subject, Subject::Field(FieldType::String | FieldType::Int)),
        Check::Format(_) => subject == Subject::Field(FieldType::String),
    };

    if supported {
        Ok(())
    } else {
        Err(RuleError::Unsupported {
            tag: constraint.tag.clone(),
            subject: subject.to_string(),
        })
    }
}

/// Numeric measure: the number itself, a string's length or an edge count
fn measure(target: &Target<'_>) -> Option<f64> {
    match target {
        Target::Value(FieldValue::String(s)) => Some(s.chars().count() as f64),
        Target::Value(value) => value.as_number(),
        Target::Count(n) => Some(*n as f64),
        Target::Id(_) => None,
    }
}

fn passes(constraint: &Constraint, target: &Target<'_>) -> bool {
    match &constraint.check {
        Check::Required | Check::OmitEmpty => true,
        Check::Gt(bound) => measure(target).is_some_and(|m| m > *bound),
        Check::Gte(bound) => measure(target).is_some_and(|m| m >= *bound),
        Check::Lt(bound) => measure(target).is_some_and(|m| m < *bound),
        Check::Lte(bound) => measure(target).is_some_and(|m| m <= *bound),
        Check::Len(bound) => measure(target).is_some_and(|m| m == *bound),
        Check::OneOf(allowed) => match target {
            Target::Value(FieldValue::String(s)) => allowed.iter().any(|a| a == s),
            Target::Value(FieldValue::Int(i)) => allowed.iter().any(|a| *a == i.to_string()),
            _ => false,
        },
        Check::Format(format) => match target {
            Target::Value(value) => format.validate(value),
            _ => false,
        },
        Check::Custom(check) => match target {
            Target::Value(value) => (**check)(value, constraint.param.as_deref()),
            Target::Id(id) => (**check)(&FieldValue::Int(*id), constraint.param.as_deref()),
            Target::Count(n) => (**check)(&FieldValue::Int(*n as i64), constraint.param.as_deref()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::{EdgeDescriptor, FieldDescriptor};

    fn pet() -> EntityDescriptor {
        EntityDescriptor::builder("pet")
            .field(FieldDescriptor::string("name").nullable())
            .field(FieldDescriptor::int("age").validate("required,gt=0"))
            .edge(EdgeDescriptor::one("owner", "user").required().validate("required"))
            .build()
            .unwrap()
    }

    fn invalid(result: Result<(), ValidateError>) -> ValidationErrors {
        match result {
            Err(ValidateError::Invalid(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_payload() {
        let mut payload = MutationPayload::new();
        payload
            .set("name", FieldValue::String("Kuro".into()))
            .set("age", FieldValue::Int(3))
            .set_edge("owner", EdgeIds::One(1));

        let validator = Validator::new();
        assert!(validator.validate(&pet(), &payload, Operation::Create).is_ok());
    }

    #[test]
    fn test_reports_every_failing_attribute_in_order() {
        let mut payload = MutationPayload::new();
        payload
            .set("name", FieldValue::String("Bob".into()))
            .set("age", FieldValue::Int(-2));

        let errors = invalid(Validator::new().validate(&pet(), &payload, Operation::Create));
        let pairs: Vec<(&str, &str)> = errors.iter().collect();
        assert_eq!(pairs, vec![("age", "gt:0 violated"), ("owner", "required")]);
    }

    #[test]
    fn test_explicit_null_fails_required() {
        let mut payload = MutationPayload::new();
        payload.clear("age").set_edge("owner", EdgeIds::One(1));

        let errors = invalid(Validator::new().validate(&pet(), &payload, Operation::Create));
        assert_eq!(errors.get("age"), Some("required"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_absent_optional_fields_are_not_evaluated() {
        let descriptor = EntityDescriptor::builder("user")
            .field(FieldDescriptor::string("email").nullable().validate("email"))
            .build()
            .unwrap();

        let validator = Validator::new();
        assert!(validator
            .validate(&descriptor, &MutationPayload::new(), Operation::Create)
            .is_ok());

        let mut payload = MutationPayload::new();
        payload.set("email", FieldValue::String("nope".into()));
        let errors = invalid(validator.validate(&descriptor, &payload, Operation::Create));
        assert_eq!(errors.get("email"), Some("email violated"));
    }

    #[test]
    fn test_update_rule_override() {
        let descriptor = EntityDescriptor::builder("pet")
            .field(
                FieldDescriptor::int("age")
                    .validate("required,gt=0")
                    .validate_update("omitempty,gt=0"),
            )
            .build()
            .unwrap();

        let validator = Validator::new();
        let empty = MutationPayload::new();
        assert!(validator.validate(&descriptor, &empty, Operation::Update).is_ok());
        assert!(validator.validate(&descriptor, &empty, Operation::Create).is_err());
    }

    #[test]
    fn test_string_length_and_plural_edge_count() {
        let descriptor = EntityDescriptor::builder("user")
            .field(FieldDescriptor::string("name").validate("min=2,max=5"))
            .edge(EdgeDescriptor::many("pets", "pet").validate("omitempty,max=2"))
            .build()
            .unwrap();

        let mut payload = MutationPayload::new();
        payload
            .set("name", FieldValue::String("Ariadne".into()))
            .set_edge("pets", EdgeIds::Many(vec![1, 2, 3]));

        let errors = invalid(Validator::new().validate(&descriptor, &payload, Operation::Create));
        assert_eq!(errors.get("name"), Some("max:5 violated"));
        assert_eq!(errors.get("pets"), Some("max:2 violated"));
    }

    #[test]
    fn test_oneof() {
        let descriptor = EntityDescriptor::builder("pet")
            .field(FieldDescriptor::string("species").validate("oneof=cat dog"))
            .build()
            .unwrap();

        let validator = Validator::new();
        let mut payload = MutationPayload::new();
        payload.set("species", FieldValue::String("cat".into()));
        assert!(validator.validate(&descriptor, &payload, Operation::Create).is_ok());

        payload.set("species", FieldValue::String("owl".into()));
        let errors = invalid(validator.validate(&descriptor, &payload, Operation::Create));
        assert_eq!(errors.get("species"), Some("oneof:cat dog violated"));
    }

    #[test]
    fn test_malformed_rule_is_a_fault() {
        let descriptor = EntityDescriptor::builder("pet")
            .field(FieldDescriptor::int("age").validate("gt=abc"))
            .build()
            .unwrap();

        let mut payload = MutationPayload::new();
        payload.set("age", FieldValue::Int(1));
        let result = Validator::new().validate(&descriptor, &payload, Operation::Create);
        assert!(matches!(result, Err(ValidateError::Fault(RuleError::InvalidParam { .. }))));
    }

    #[test]
    fn test_check_descriptor_rejects_misapplied_tags() {
        let descriptor = EntityDescriptor::builder("pet")
            .field(FieldDescriptor::int("age").validate("email"))
            .build()
            .unwrap();
        let err = Validator::new().check_descriptor(&descriptor).unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidRule { ref attribute, .. } if attribute == "age"));

        assert!(Validator::new().check_descriptor(&pet()).is_ok());
    }

    #[test]
    fn test_custom_tags() {
        let mut validator = Validator::new();
        validator.register("even", |value, _| {
            value.as_integer().is_some_and(|i| i % 2 == 0)
        });

        let descriptor = EntityDescriptor::builder("pet")
            .field(FieldDescriptor::int("legs").validate("even"))
            .build()
            .unwrap();
        assert!(validator.check_descriptor(&descriptor).is_ok());

        let mut payload = MutationPayload::new();
        payload.set("legs", FieldValue::Int(3));
        let errors = invalid(validator.validate(&descriptor, &payload, Operation::Create));
        assert_eq!(errors.get("legs"), Some("even violated"));
    }

    #[test]
    fn test_rules_are_cached() {
        let validator = Validator::new();
        let first = validator.rule("required,gt=0").unwrap();
        let second = validator.rule("required,gt=0").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}

//! Rule string parsing
//!
//! Rules are comma-separated tags, each optionally carrying a parameter:
//! `required,gt=0`, `omitempty,oneof=cat dog`, `email`.

use crate::core::field::FieldFormat;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::validators::CustomCheck;

/// A rule that cannot be evaluated. Always an internal fault.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleError {
    #[error("unknown tag '{tag}' in rule '{rule}'")]
    UnknownTag { rule: String, tag: String },

    #[error("tag '{tag}' in rule '{rule}' requires a parameter")]
    MissingParam { rule: String, tag: String },

    #[error("tag '{tag}' in rule '{rule}' has invalid parameter '{param}'")]
    InvalidParam {
        rule: String,
        tag: String,
        param: String,
    },

    #[error("empty tag in rule '{rule}'")]
    EmptyTag { rule: String },

    #[error("tag '{tag}' cannot be applied to {subject}")]
    Unsupported { tag: String, subject: String },
}

/// What a single tag checks
#[derive(Clone)]
pub enum Check {
    Required,
    OmitEmpty,
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    Len(f64),
    OneOf(Vec<String>),
    Format(FieldFormat),
    Custom(CustomCheck),
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Required => write!(f, "Required"),
            Check::OmitEmpty => write!(f, "OmitEmpty"),
            Check::Gt(v) => write!(f, "Gt({})", v),
            Check::Gte(v) => write!(f, "Gte({})", v),
            Check::Lt(v) => write!(f, "Lt({})", v),
            Check::Lte(v) => write!(f, "Lte({})", v),
            Check::Len(v) => write!(f, "Len({})", v),
            Check::OneOf(values) => write!(f, "OneOf({:?})", values),
            Check::Format(format) => write!(f, "Format({:?})", format),
            Check::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// One parsed tag, keeping its source text for messages
#[derive(Debug, Clone)]
pub struct Constraint {
    pub tag: String,
    pub param: Option<String>,
    pub check: Check,
}

impl Constraint {
    /// Client-facing violation message, e.g. `gt:0 violated`
    pub fn message(&self) -> String {
        match (&self.check, &self.param) {
            (Check::Required, _) => "required".to_string(),
            (_, Some(param)) => format!("{}:{} violated", self.tag, param),
            (_, None) => format!("{} violated", self.tag),
        }
    }
}

/// A parsed rule string
#[derive(Debug, Clone)]
pub struct Rule {
    pub source: String,
    pub constraints: Vec<Constraint>,
}

impl Rule {
    /// Parse a rule, resolving unknown tags against registered custom checks
    pub fn parse(source: &str, custom: &HashMap<String, CustomCheck>) -> Result<Self, RuleError> {
        let mut constraints = Vec::new();

        for part in source.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(RuleError::EmptyTag {
                    rule: source.to_string(),
                });
            }

            let (tag, param) = match part.split_once('=') {
                Some((tag, param)) => (tag.trim(), Some(param.trim().to_string())),
                None => (part, None),
            };

            let check = parse_check(source, tag, param.as_deref(), custom)?;
            constraints.push(Constraint {
                tag: tag.to_string(),
                param,
                check,
            });
        }

        Ok(Self {
            source: source.to_string(),
            constraints,
        })
    }

    pub fn is_required(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c.check, Check::Required))
    }
}

fn parse_check(
    rule: &str,
    tag: &str,
    param: Option<&str>,
    custom: &HashMap<String, CustomCheck>,
) -> Result<Check, RuleError> {
    let number = || -> Result<f64, RuleError> {
        let raw = param.ok_or_else(|| RuleError::MissingParam {
            rule: rule.to_string(),
            tag: tag.to_string(),
        })?;
        raw.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| RuleError::InvalidParam {
                rule: rule.to_string(),
                tag: tag.to_string(),
                param: raw.to_string(),
            })
    };

    let check = match tag {
        "required" => Check::Required,
        "omitempty" => Check::OmitEmpty,
        "gt" => Check::Gt(number()?),
        "gte" | "min" => Check::Gte(number()?),
        "lt" => Check::Lt(number()?),
        "lte" | "max" => Check::Lte(number()?),
        "len" => Check::Len(number()?),
        "oneof" => {
            let values: Vec<String> = param
                .unwrap_or_default()
                .split_whitespace()
                .map(|v| v.to_string())
                .collect();
            if values.is_empty() {
                return Err(RuleError::MissingParam {
                    rule: rule.to_string(),
                    tag: tag.to_string(),
                });
            }
            Check::OneOf(values)
        }
        "email" => Check::Format(FieldFormat::Email),
        "url" => Check::Format(FieldFormat::Url),
        "alpha" => Check::Format(FieldFormat::Alpha),
        "alphanum" => Check::Format(FieldFormat::Alphanumeric),
        other => match custom.get(other) {
            Some(check) => Check::Custom(Arc::clone(check)),
            None => {
                return Err(RuleError::UnknownTag {
                    rule: rule.to_string(),
                    tag: other.to_string(),
                });
            }
        },
    };

    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Rule, RuleError> {
        Rule::parse(source, &HashMap::new())
    }

    #[test]
    fn test_parse_tags_and_params() {
        let rule = parse("required,gt=0").unwrap();
        assert_eq!(rule.constraints.len(), 2);
        assert!(rule.is_required());
        assert!(matches!(rule.constraints[1].check, Check::Gt(v) if v == 0.0));
        assert_eq!(rule.constraints[1].param.as_deref(), Some("0"));
    }

    #[test]
    fn test_parse_oneof() {
        let rule = parse("oneof=cat dog").unwrap();
        assert!(matches!(&rule.constraints[0].check, Check::OneOf(v) if v == &["cat", "dog"]));
    }

    #[test]
    fn test_min_max_are_aliases() {
        let rule = parse("min=2,max=5").unwrap();
        assert!(matches!(rule.constraints[0].check, Check::Gte(v) if v == 2.0));
        assert!(matches!(rule.constraints[1].check, Check::Lte(v) if v == 5.0));
    }

    #[test]
    fn test_malformed_rules() {
        assert!(matches!(parse("gt"), Err(RuleError::MissingParam { .. })));
        assert!(matches!(parse("gt=zero"), Err(RuleError::InvalidParam { .. })));
        assert!(matches!(parse("required,,gt=1"), Err(RuleError::EmptyTag { .. })));
        assert!(matches!(parse("sometimes"), Err(RuleError::UnknownTag { .. })));
        assert!(matches!(parse("oneof="), Err(RuleError::MissingParam { .. })));
    }

    #[test]
    fn test_messages() {
        let rule = parse("required,gt=0,email").unwrap();
        let messages: Vec<String> = rule.constraints.iter().map(|c| c.message()).collect();
        assert_eq!(messages, vec!["required", "gt:0 violated", "email violated"]);
    }
}

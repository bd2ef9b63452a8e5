//! Field value types and formats

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// Declared type of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// RFC 3339 timestamp
    Time,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Time => "time",
        };
        f.write_str(name)
    }
}

/// A polymorphic field value that can hold any of the declared field types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    Null,
}

impl FieldValue {
    /// Convert a JSON value into a field value of the given type
    ///
    /// `null` always converts to [`FieldValue::Null`]; callers decide whether
    /// null is acceptable for the field.
    pub fn from_json(value: &Value, ty: FieldType) -> Result<Self, String> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        match ty {
            FieldType::String => value
                .as_str()
                .map(|s| FieldValue::String(s.to_string()))
                .ok_or_else(|| "expected a string".to_string()),
            FieldType::Int => value
                .as_i64()
                .map(FieldValue::Int)
                .ok_or_else(|| "expected an integer".to_string()),
            FieldType::Float => value
                .as_f64()
                .map(FieldValue::Float)
                .ok_or_else(|| "expected a number".to_string()),
            FieldType::Bool => value
                .as_bool()
                .map(FieldValue::Bool)
                .ok_or_else(|| "expected a boolean".to_string()),
            FieldType::Time => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| "expected an RFC 3339 timestamp".to_string())?;
                Self::parse_time(raw)
            }
        }
    }

    /// Parse a raw string (e.g. a query parameter) as the given type
    pub fn parse_str(raw: &str, ty: FieldType) -> Result<Self, String> {
        match ty {
            FieldType::String => Ok(FieldValue::String(raw.to_string())),
            FieldType::Int => raw
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|_| format!("'{}' is not an integer", raw)),
            FieldType::Float => raw
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| format!("'{}' is not a number", raw)),
            FieldType::Bool => raw
                .parse::<bool>()
                .map(FieldValue::Bool)
                .map_err(|_| format!("'{}' is not a boolean", raw)),
            FieldType::Time => Self::parse_time(raw),
        }
    }

    fn parse_time(raw: &str) -> Result<Self, String> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| FieldValue::Time(dt.with_timezone(&Utc)))
            .map_err(|_| format!("'{}' is not an RFC 3339 timestamp", raw))
    }

    /// Render the value as JSON
    ///
    /// Returns `None` for non-finite floats, which have no JSON representation.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            FieldValue::String(s) => Some(Value::String(s.clone())),
            FieldValue::Int(i) => Some(Value::from(*i)),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
            FieldValue::Bool(b) => Some(Value::Bool(*b)),
            FieldValue::Time(t) => Some(Value::String(t.to_rfc3339())),
            FieldValue::Null => Some(Value::Null),
        }
    }

    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a float, widening integers
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Total order used for sorting lists; nulls sort first
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Less,
            (_, FieldValue::Null) => Ordering::Greater,
            (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Time(a), FieldValue::Time(b)) => a.cmp(b),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
        }
    }
}

/// Field format validators backing the string rule tags
#[derive(Debug, Clone)]
pub enum FieldFormat {
    Email,
    Url,
    Alpha,
    Alphanumeric,
    Custom(Regex),
}

impl FieldFormat {
    /// Validate a field value against this format
    pub fn validate(&self, value: &FieldValue) -> bool {
        let string_value = match value.as_string() {
            Some(s) => s,
            None => return false,
        };

        match self {
            FieldFormat::Email => Self::is_valid_email(string_value),
            FieldFormat::Url => Self::is_valid_url(string_value),
            FieldFormat::Alpha => {
                !string_value.is_empty() && string_value.chars().all(|c| c.is_ascii_alphabetic())
            }
            FieldFormat::Alphanumeric => {
                !string_value.is_empty()
                    && string_value.chars().all(|c| c.is_ascii_alphanumeric())
            }
            FieldFormat::Custom(regex) => regex.is_match(string_value),
        }
    }

    fn is_valid_email(email: &str) -> bool {
        static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
        EMAIL_REGEX
            .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
            .as_ref()
            .is_some_and(|regex| regex.is_match(email))
    }

    fn is_valid_url(url: &str) -> bool {
        static URL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
        URL_REGEX
            .get_or_init(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").ok())
            .as_ref()
            .is_some_and(|regex| regex.is_match(url))
    }
}

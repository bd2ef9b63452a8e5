//! List query parameters: pagination, equality filters and sorting

use crate::core::descriptor::EntityDescriptor;
use crate::core::field::{FieldType, FieldValue};
use crate::core::record::Record;
use std::cmp::Ordering;
use thiserror::Error;

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// Rejected list query
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("parameter '{name}' must be a positive integer, got '{value}'")]
    InvalidNumber { name: String, value: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid filter on '{field}': {message}")]
    InvalidFilter { field: String, message: String },

    #[error("invalid sort direction '{0}', expected 'asc' or 'desc'")]
    InvalidSortDirection(String),
}

/// Sort field and direction
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

/// Parsed query of a list operation
///
/// # Example
/// ```text
/// GET /pets?page=2&limit=10
/// GET /pets?name=Kuro
/// GET /pets?age=3&sort=name:desc
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// Page number (starts at 1)
    pub page: usize,
    /// Items per page, between 1 and 100
    pub limit: usize,
    /// Equality filters on fields
    pub filters: Vec<(String, FieldValue)>,
    pub sort: Option<SortSpec>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            filters: Vec::new(),
            sort: None,
        }
    }
}

impl ListQuery {
    /// Parse raw query-string pairs against a descriptor
    ///
    /// `page`, `limit` and `sort` are reserved; every other key must name a
    /// field of the entity (or `id`) and is an equality filter.
    pub fn from_params(
        params: &[(String, String)],
        descriptor: &EntityDescriptor,
    ) -> Result<Self, QueryError> {
        let mut query = Self::default();

        for (name, value) in params {
            match name.as_str() {
                "page" => query.page = parse_number(name, value)?.max(1),
                "limit" => query.limit = parse_number(name, value)?.clamp(1, MAX_LIMIT),
                "sort" => {
                    let (field, direction) = value.split_once(':').unwrap_or((value.as_str(), "asc"));
                    field_type(descriptor, field)?;
                    let descending = match direction {
                        "asc" => false,
                        "desc" => true,
                        other => return Err(QueryError::InvalidSortDirection(other.to_string())),
                    };
                    query.sort = Some(SortSpec {
                        field: field.to_string(),
                        descending,
                    });
                }
                field => {
                    let ty = field_type(descriptor, field)?;
                    let value = FieldValue::parse_str(value, ty).map_err(|message| {
                        QueryError::InvalidFilter {
                            field: field.to_string(),
                            message,
                        }
                    })?;
                    query.filters.push((field.to_string(), value));
                }
            }
        }

        if query.page.checked_mul(query.limit).is_none() {
            let page = params
                .iter()
                .rev()
                .find(|(name, _)| name == "page")
                .map(|(_, value)| value.clone())
                .unwrap_or_default();
            return Err(QueryError::InvalidNumber {
                name: "page".to_string(),
                value: page,
            });
        }

        Ok(query)
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1).saturating_mul(self.limit)
    }

    /// Whether a record satisfies every filter
    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| record_value(record, field).as_ref() == Some(expected))
    }

    /// Filter, sort and paginate an in-memory collection (id order by default)
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut records: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();

        match &self.sort {
            Some(sort) => records.sort_by(|a, b| {
                let ordering = match (record_value(a, &sort.field), record_value(b, &sort.field)) {
                    (Some(x), Some(y)) => x.sort_cmp(&y),
                    _ => Ordering::Equal,
                };
                let ordering = if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                ordering.then(a.id.cmp(&b.id))
            }),
            None => records.sort_by_key(|r| r.id),
        }

        records
            .into_iter()
            .skip(self.offset())
            .take(self.limit)
            .collect()
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, QueryError> {
    value.parse::<usize>().map_err(|_| QueryError::InvalidNumber {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn field_type(descriptor: &EntityDescriptor, field: &str) -> Result<FieldType, QueryError> {
    if field == "id" {
        return Ok(FieldType::Int);
    }
    descriptor
        .field(field)
        .map(|f| f.ty)
        .ok_or_else(|| QueryError::UnknownField(field.to_string()))
}

fn record_value(record: &Record, field: &str) -> Option<FieldValue> {
    if field == "id" {
        return Some(FieldValue::Int(record.id));
    }
    record.field(field).cloned()
}

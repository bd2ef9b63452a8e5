//! Typed error handling for the CRUD pipeline
//!
//! Every failure a handler can meet is a [`CrudError`] variant with a fixed
//! HTTP status and a client-facing message. Internal faults never leak their
//! detail to the client.
//!
//! # Error Categories
//!
//! - [`StorageError`]: outcomes of the data access port
//! - [`CrudError`]: the HTTP-facing taxonomy built on top of decode,
//!   validation, query, storage and serialization failures
//!
//! # Example
//!
//! ```rust,ignore
//! match store.fetch(&pet, 42, &[]).await {
//!     Ok(record) => println!("found {}", record.id),
//!     Err(StorageError::NotFound { entity, .. }) => println!("no such {}", entity),
//!     Err(e) => eprintln!("storage failed: {}", e),
//! }
//! ```

use crate::core::payload::DecodeError;
use crate::core::query::QueryError;
use crate::core::serialize::SerializationFault;
use crate::core::validation::{RuleError, ValidateError, ValidationErrors};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Message sent in place of any internal fault detail
pub const INTERNAL_MESSAGE: &str = "internal server error";

// =============================================================================
// Storage Errors
// =============================================================================

/// Outcomes of the data access port other than success
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    /// No entity with this id
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: i64 },

    /// The lookup matched more than one entity
    #[error("{entity} {id} not singular")]
    NotSingular { entity: String, id: i64 },

    /// Referential integrity, missing required value or uniqueness violation
    #[error("constraint failed: {0}")]
    Constraint(String),

    /// Infrastructure failure
    #[error("storage fault: {0}")]
    Fault(String),
}

/// A specialized Result type for data access operations
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// CRUD Errors
// =============================================================================

/// Every way a CRUD request can fail
#[derive(Debug)]
pub enum CrudError {
    /// Body is not a JSON object matching the descriptor
    Decode(DecodeError),

    /// Path identifier is not a positive integer
    InvalidId { raw: String },

    /// List query parameters could not be parsed
    InvalidQuery(QueryError),

    /// Payload violates validation rules
    Validation(ValidationErrors),

    /// Entity does not exist
    NotFound { entity: String },

    /// Lookup by id matched several entities
    NotSingular { entity: String },

    /// Storage refused the write for a client-caused reason
    Constraint(String),

    /// Storage infrastructure failed
    Storage(String),

    /// A validation rule is malformed
    ValidatorFault(RuleError),

    /// A record could not be rendered
    Serialization(SerializationFault),
}

impl fmt::Display for CrudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrudError::Decode(e) => write!(f, "{}", e),
            CrudError::InvalidId { raw } => write!(f, "invalid id '{}'", raw),
            CrudError::InvalidQuery(e) => write!(f, "{}", e),
            CrudError::Validation(errors) => write!(f, "validation failed: {}", errors),
            CrudError::NotFound { entity } => write!(f, "{} not found", entity),
            CrudError::NotSingular { entity } => write!(f, "{} not singular", entity),
            CrudError::Constraint(message) => write!(f, "constraint failed: {}", message),
            CrudError::Storage(message) => write!(f, "storage fault: {}", message),
            CrudError::ValidatorFault(e) => write!(f, "validator fault: {}", e),
            CrudError::Serialization(e) => write!(f, "serialization fault: {}", e),
        }
    }
}

impl std::error::Error for CrudError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CrudError::Decode(e) => Some(e),
            CrudError::InvalidQuery(e) => Some(e),
            CrudError::ValidatorFault(e) => Some(e),
            CrudError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

/// Client message of an error response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Fields(ValidationErrors),
}

/// Error response structure for HTTP responses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub code: u16,
    /// Canonical reason phrase of the status
    pub status: String,
    pub errors: ErrorDetail,
}

impl CrudError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrudError::Decode(_)
            | CrudError::InvalidId { .. }
            | CrudError::InvalidQuery(_)
            | CrudError::Validation(_)
            | CrudError::NotSingular { .. }
            | CrudError::Constraint(_) => StatusCode::BAD_REQUEST,
            CrudError::NotFound { .. } => StatusCode::NOT_FOUND,
            CrudError::Storage(_) | CrudError::ValidatorFault(_) | CrudError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CrudError::Decode(_) => "DECODE_ERROR",
            CrudError::InvalidId { .. } => "INVALID_ID",
            CrudError::InvalidQuery(_) => "INVALID_QUERY",
            CrudError::Validation(_) => "VALIDATION_ERROR",
            CrudError::NotFound { .. } => "NOT_FOUND",
            CrudError::NotSingular { .. } => "NOT_SINGULAR",
            CrudError::Constraint(_) => "CONSTRAINT_VIOLATION",
            CrudError::Storage(_) => "STORAGE_FAULT",
            CrudError::ValidatorFault(_) => "VALIDATOR_FAULT",
            CrudError::Serialization(_) => "SERIALIZATION_FAULT",
        }
    }

    /// Whether this error is logged at error level
    ///
    /// Not-singular answers 400 but still points at corrupt storage, so it
    /// is logged alongside the internal faults.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CrudError::NotSingular { .. }
                | CrudError::Storage(_)
                | CrudError::ValidatorFault(_)
                | CrudError::Serialization(_)
        )
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        let status = self.status_code();
        ErrorResponse {
            code: status.as_u16(),
            status: status.canonical_reason().unwrap_or_default().to_string(),
            errors: self.detail(),
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            CrudError::Decode(DecodeError::Malformed(_)) => {
                ErrorDetail::Message("invalid json string".to_string())
            }
            CrudError::Decode(DecodeError::InvalidField { field, message }) => {
                let mut fields = ValidationErrors::default();
                fields.insert(field.as_str(), message.as_str());
                ErrorDetail::Fields(fields)
            }
            CrudError::InvalidId { .. } => {
                ErrorDetail::Message("id must be an integer greater zero".to_string())
            }
            CrudError::InvalidQuery(e) => ErrorDetail::Message(e.to_string()),
            CrudError::Validation(errors) => ErrorDetail::Fields(errors.clone()),
            CrudError::NotFound { entity } => ErrorDetail::Message(format!("{} not found", entity)),
            CrudError::NotSingular { entity } => {
                ErrorDetail::Message(format!("{} not singular", entity))
            }
            CrudError::Constraint(message) => ErrorDetail::Message(message.clone()),
            CrudError::Storage(_) | CrudError::ValidatorFault(_) | CrudError::Serialization(_) => {
                ErrorDetail::Message(INTERNAL_MESSAGE.to_string())
            }
        }
    }
}

/// Rendering never logs: handlers log each fault where it is detected.
impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

impl From<StorageError> for CrudError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, .. } => CrudError::NotFound { entity },
            StorageError::NotSingular { entity, .. } => CrudError::NotSingular { entity },
            StorageError::Constraint(message) => CrudError::Constraint(message),
            StorageError::Fault(message) => CrudError::Storage(message),
        }
    }
}

impl From<DecodeError> for CrudError {
    fn from(err: DecodeError) -> Self {
        CrudError::Decode(err)
    }
}

impl From<QueryError> for CrudError {
    fn from(err: QueryError) -> Self {
        CrudError::InvalidQuery(err)
    }
}

impl From<ValidateError> for CrudError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::Invalid(errors) => CrudError::Validation(errors),
            ValidateError::Fault(rule) => CrudError::ValidatorFault(rule),
        }
    }
}

impl From<SerializationFault> for CrudError {
    fn from(err: SerializationFault) -> Self {
        CrudError::Serialization(err)
    }
}

/// A specialized Result type for CRUD handlers
pub type CrudResult<T> = Result<T, CrudError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotFound {
            entity: "pet".to_string(),
            id: 42,
        };
        assert!(err.to_string().contains("pet"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: CrudError = StorageError::NotFound {
            entity: "pet".to_string(),
            id: 42,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "NOT_FOUND");

        let err: CrudError = StorageError::NotSingular {
            entity: "pet".to_string(),
            id: 42,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_internal());

        let err: CrudError = StorageError::Constraint("owner 9 does not exist".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_internal());

        let err: CrudError = StorageError::Fault("poisoned".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_decode_error_messages() {
        let err = CrudError::Decode(DecodeError::Malformed("eof".to_string()));
        assert_eq!(
            serde_json::to_value(err.to_response()).unwrap(),
            json!({"code": 400, "status": "Bad Request", "errors": "invalid json string"})
        );

        let err = CrudError::Decode(DecodeError::InvalidField {
            field: "age".to_string(),
            message: "expected int".to_string(),
        });
        assert_eq!(
            serde_json::to_value(err.to_response()).unwrap()["errors"],
            json!({"age": "expected int"})
        );
    }

    #[test]
    fn test_invalid_id_response() {
        let err = CrudError::InvalidId {
            raw: "abc".to_string(),
        };
        let response = err.to_response();
        assert_eq!(response.code, 400);
        assert_eq!(
            response.errors,
            ErrorDetail::Message("id must be an integer greater zero".to_string())
        );
    }

    #[test]
    fn test_validation_errors_render_as_map() {
        let mut errors = ValidationErrors::default();
        errors.insert("age", "gt:0 violated");
        errors.insert("owner", "required");

        let body = serde_json::to_value(CrudError::Validation(errors).to_response()).unwrap();
        assert_eq!(
            body["errors"],
            json!({"age": "gt:0 violated", "owner": "required"})
        );
    }

    #[test]
    fn test_internal_detail_is_withheld() {
        let faults = vec![
            CrudError::Storage("disk on fire".to_string()),
            CrudError::ValidatorFault(RuleError::UnknownTag {
                rule: "bogus".to_string(),
                tag: "bogus".to_string(),
            }),
            CrudError::Serialization(SerializationFault::TooDeep(8)),
        ];
        for err in faults {
            assert!(err.is_internal());
            let response = err.to_response();
            assert_eq!(response.code, 500);
            assert_eq!(response.status, "Internal Server Error");
            assert_eq!(
                response.errors,
                ErrorDetail::Message(INTERNAL_MESSAGE.to_string())
            );
        }
    }

    #[test]
    fn test_not_found_message() {
        let err = CrudError::NotFound {
            entity: "user".to_string(),
        };
        assert_eq!(
            err.to_response().errors,
            ErrorDetail::Message("user not found".to_string())
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = CrudError::NotFound {
            entity: "pet".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

//! Declarative validation of mutation payloads
//!
//! Descriptors attach rule strings such as `required,gt=0` to fields and
//! edges. The [`Validator`] turns them into checks and reports a field →
//! message map when a payload breaks them.

pub mod rules;
pub mod validators;

pub use rules::{Rule, RuleError};
pub use validators::{CustomCheck, ValidateError, ValidationErrors, Validator};

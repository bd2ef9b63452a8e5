//! Core module containing the descriptor model, the request pipeline types
//! and the data access port

pub mod descriptor;
pub mod error;
pub mod field;
pub mod operation;
pub mod payload;
pub mod query;
pub mod record;
pub mod serialize;
pub mod service;
pub mod validation;

pub use descriptor::{
    Cardinality, DescriptorError, EdgeDescriptor, EntityDescriptor, FieldDescriptor, Schema,
};
pub use error::{CrudError, CrudResult, ErrorResponse, StorageError, StorageResult};
pub use field::{FieldFormat, FieldType, FieldValue};
pub use operation::Operation;
pub use payload::{DecodeError, EdgeIds, MutationPayload, Patch};
pub use query::{ListQuery, QueryError, SortSpec};
pub use record::{Record, Relation};
pub use serialize::{GroupSet, OperationGroups, SerializationFault, Serializer};
pub use service::DataAccess;
pub use validation::{ValidationErrors, Validator};

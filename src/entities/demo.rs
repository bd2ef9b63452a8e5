//! Demo schema: pets, their owners, and groups
//!
//! A pet must have a positive age and an owner. Users list their pets,
//! which are eager-loaded on read.

use crate::core::descriptor::{
    DescriptorError, EdgeDescriptor, EntityDescriptor, FieldDescriptor, Schema,
};

pub const PET: &str = "pet";
pub const USER: &str = "user";
pub const GROUP: &str = "group";

pub fn pet() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder(PET)
        .field(FieldDescriptor::string("name").nullable())
        .field(
            FieldDescriptor::int("age")
                .validate("required,gt=0")
                .validate_update("omitempty,gt=0"),
        )
        .edge(
            EdgeDescriptor::one("owner", USER)
                .required()
                .validate("required")
                .validate_update("omitempty")
                .inverse("pets")
                .groups(&["owner"]),
        )
        .build()
}

pub fn user() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder(USER)
        .field(FieldDescriptor::string("name").nullable())
        .field(FieldDescriptor::int("age").nullable())
        .edge(
            EdgeDescriptor::many("pets", PET)
                .inverse("owner")
                .groups(&["user:pets"]),
        )
        .build()
}

pub fn group() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder(GROUP).build()
}

/// The three demo kinds, cross-checked
pub fn schema() -> Result<Schema, DescriptorError> {
    Schema::new(vec![pet()?, user()?, group()?])
}

//! # crud-rs
//!
//! A descriptor-driven CRUD handler engine for building RESTful APIs in Rust.
//!
//! ## Features
//!
//! - **Static descriptors**: fields, edges, validation rules and
//!   serialization groups declared once at startup
//! - **Generic pipeline**: decode, validate, persist, re-fetch, serialize
//!   for any entity kind
//! - **Tri-state payloads**: absent, null and set stay distinguishable
//! - **Serialization groups**: field visibility and relation expansion per
//!   operation
//! - **Pluggable storage**: any [`DataAccess`](core::DataAccess)
//!   implementation, an in-memory one included
//! - **Route tables**: expose any subset of create / read / update / delete /
//!   list under a prefix
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crud::prelude::*;
//!
//! let pet = EntityDescriptor::builder("pet")
//!     .field(FieldDescriptor::string("name").nullable())
//!     .field(FieldDescriptor::int("age").validate("required,gt=0"))
//!     .build()?;
//! let schema = Arc::new(Schema::new(vec![pet])?);
//!
//! let config = CrudConfig {
//!     entities: vec![EntityConfig::new("pet", "/pets")],
//!     ..Default::default()
//! };
//!
//! ServerBuilder::new()
//!     .with_schema(schema.clone())
//!     .with_store(InMemoryStore::new(schema))
//!     .with_config(config)
//!     .serve()
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Cardinality, CrudError, CrudResult, DataAccess, EdgeDescriptor, EdgeIds,
        EntityDescriptor, FieldDescriptor, FieldFormat, FieldType, FieldValue, GroupSet,
        ListQuery, MutationPayload, Operation, OperationGroups, Patch, Record, Relation, Schema,
        Serializer, StorageError, StorageResult, ValidationErrors, Validator,
    };

    // === Storage ===
    pub use crate::storage::InMemoryStore;

    // === Config ===
    pub use crate::config::{CrudConfig, EntityConfig, ServerConfig};

    // === Server ===
    pub use crate::server::{CrudHandler, EntityMount, EntityRegistry, Routes, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}

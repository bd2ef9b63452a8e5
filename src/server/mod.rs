//! Server module for building HTTP servers from entity descriptors
//!
//! This module provides a `ServerBuilder` that composes, per configured
//! entity kind, one CRUD handler and one route table, plus a health route.

pub mod builder;
pub mod entity_registry;
pub mod handlers;
pub mod routes;

pub use builder::ServerBuilder;
pub use entity_registry::{EntityMount, EntityRegistry};
pub use handlers::CrudHandler;
pub use routes::Routes;

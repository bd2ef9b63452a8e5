//! The data access port
//!
//! Handlers reach storage only through [`DataAccess`]. The port is agnostic
//! to the storage mechanism and works on any entity kind described by an
//! [`EntityDescriptor`]. Implementations provide their own synchronisation.

use crate::core::descriptor::EntityDescriptor;
use crate::core::error::StorageResult;
use crate::core::payload::MutationPayload;
use crate::core::query::ListQuery;
use crate::core::record::Record;
use async_trait::async_trait;

/// Storage operations for descriptor-driven entities
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Persist a new entity and return its id
    async fn create(&self, descriptor: &EntityDescriptor, payload: &MutationPayload)
    -> StorageResult<i64>;

    /// Get an entity by id, attaching the named relations
    async fn fetch(
        &self,
        descriptor: &EntityDescriptor,
        id: i64,
        eager: &[&str],
    ) -> StorageResult<Record>;

    /// Apply a partial update on top of the persisted state
    async fn update(
        &self,
        descriptor: &EntityDescriptor,
        id: i64,
        payload: &MutationPayload,
    ) -> StorageResult<Record>;

    /// Delete an entity
    async fn delete(&self, descriptor: &EntityDescriptor, id: i64) -> StorageResult<()>;

    /// List entities matching the query, attaching the named relations
    async fn list(
        &self,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
        eager: &[&str],
    ) -> StorageResult<Vec<Record>>;
}

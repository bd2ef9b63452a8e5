//! Entity registry: one handler and one route table per entity kind

use super::handlers::CrudHandler;
use super::routes::{self, Routes};
use axum::Router;
use indexmap::IndexMap;

/// Where and how one entity kind is exposed
#[derive(Clone)]
pub struct EntityMount {
    pub prefix: String,
    pub routes: Routes,
    pub handler: CrudHandler,
}

impl EntityMount {
    pub fn new(prefix: impl Into<String>, routes: Routes, handler: CrudHandler) -> Self {
        Self {
            prefix: routes::normalize_prefix(&prefix.into()),
            routes,
            handler,
        }
    }

    pub fn kind(&self) -> &str {
        self.handler.kind()
    }

    /// Build the CRUD routes for this entity
    pub fn build_routes(&self) -> Router {
        routes::mount(&self.prefix, self.routes, self.handler.clone())
    }
}

/// Registry for all exposed entity kinds
///
/// Built explicitly at startup; the entity kind is the key.
#[derive(Default)]
pub struct EntityRegistry {
    mounts: IndexMap<String, EntityMount>,
}

impl EntityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            mounts: IndexMap::new(),
        }
    }

    /// Register a mount, replacing any previous mount of the same kind
    pub fn register(&mut self, mount: EntityMount) {
        self.mounts.insert(mount.kind().to_string(), mount);
    }

    pub fn get(&self, kind: &str) -> Option<&EntityMount> {
        self.mounts.get(kind)
    }

    /// Kind of the first mount already using `prefix`, if any
    pub fn prefix_owner(&self, prefix: &str) -> Option<&str> {
        let prefix = routes::normalize_prefix(prefix);
        self.mounts
            .values()
            .find(|m| m.prefix == prefix)
            .map(|m| m.kind())
    }

    /// Build a router with all registered entity routes
    pub fn build_routes(&self) -> Router {
        let mut router = Router::new();

        for mount in self.mounts.values() {
            router = router.merge(mount.build_routes());
        }

        router
    }

    /// Get all registered entity kinds, in registration order
    pub fn entity_types(&self) -> Vec<&str> {
        self.mounts.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::{EntityDescriptor, Schema};
    use crate::core::serialize::{OperationGroups, Serializer};
    use crate::core::validation::Validator;
    use crate::storage::InMemoryStore;
    use std::sync::Arc;

    fn handler(kind: &str) -> CrudHandler {
        let schema = Arc::new(
            Schema::new(vec![EntityDescriptor::builder(kind).build().unwrap()]).unwrap(),
        );
        CrudHandler::new(
            schema.get(kind).unwrap().clone(),
            Arc::new(InMemoryStore::new(schema.clone())),
            Arc::new(Validator::new()),
            Arc::new(Serializer::new(schema)),
            OperationGroups::default(),
        )
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = EntityRegistry::new();
        assert!(registry.entity_types().is_empty());
    }

    #[test]
    fn test_register_multiple_entities() {
        let mut registry = EntityRegistry::new();
        registry.register(EntityMount::new("/pets", Routes::ALL, handler("pet")));
        registry.register(EntityMount::new("users", Routes::READ, handler("user")));
        assert_eq!(registry.entity_types(), vec!["pet", "user"]);
        assert_eq!(registry.get("user").unwrap().prefix, "/users");
    }

    #[test]
    fn test_register_duplicate_replaces() {
        let mut registry = EntityRegistry::new();
        registry.register(EntityMount::new("/pets", Routes::ALL, handler("pet")));
        registry.register(EntityMount::new("/animals", Routes::ALL, handler("pet")));
        assert_eq!(registry.entity_types().len(), 1);
        assert_eq!(registry.prefix_owner("/animals/"), Some("pet"));
        assert_eq!(registry.prefix_owner("/pets"), None);
    }

    #[test]
    fn test_build_routes_with_entities() {
        let mut registry = EntityRegistry::new();
        registry.register(EntityMount::new("/pets", Routes::ALL, handler("pet")));
        registry.register(EntityMount::new("/groups", Routes::LIST, handler("group")));
        let _router = registry.build_routes();
    }
}

//! ServerBuilder for fluent API to build HTTP servers

use super::entity_registry::{EntityMount, EntityRegistry};
use super::handlers::CrudHandler;
use crate::config::CrudConfig;
use crate::core::descriptor::Schema;
use crate::core::serialize::Serializer;
use crate::core::service::DataAccess;
use crate::core::validation::Validator;
use anyhow::{Result, anyhow, bail};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Name reported by the health route
pub const SERVICE_NAME: &str = "crud-rs";

/// Builder for creating HTTP servers from a schema and a configuration
///
/// Every entity kind named in the configuration gets one [`CrudHandler`]
/// and one route table; kinds the configuration does not name stay
/// unexposed.
///
/// # Example
///
/// ```ignore
/// let schema = Arc::new(demo::schema()?);
/// let app = ServerBuilder::new()
///     .with_schema(schema.clone())
///     .with_store(InMemoryStore::new(schema))
///     .with_config(CrudConfig::default_config())
///     .build()?;
/// ```
pub struct ServerBuilder {
    schema: Option<Arc<Schema>>,
    store: Option<Arc<dyn DataAccess>>,
    validator: Validator,
    config: CrudConfig,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            schema: None,
            store: None,
            validator: Validator::new(),
            config: CrudConfig::default(),
            custom_routes: Vec::new(),
        }
    }

    /// Set the entity schema (required)
    pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the data access port (required)
    pub fn with_store(mut self, store: impl DataAccess + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set an already shared data access port
    pub fn with_shared_store(mut self, store: Arc<dyn DataAccess>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the validator, e.g. one with custom tags registered
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_config(mut self, config: CrudConfig) -> Self {
        self.config = config;
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Compose one mount per configured entity kind
    ///
    /// Fails when a configured kind is not in the schema, when two kinds
    /// share a prefix, or when a validation rule cannot be evaluated.
    pub fn build_registry(&mut self) -> Result<EntityRegistry> {
        let schema = self
            .schema
            .clone()
            .ok_or_else(|| anyhow!("Schema is required. Call .with_schema()"))?;
        let store = self
            .store
            .clone()
            .ok_or_else(|| anyhow!("Data access port is required. Call .with_store()"))?;

        for descriptor in schema.descriptors() {
            self.validator.check_descriptor(descriptor)?;
        }

        let validator = Arc::new(std::mem::take(&mut self.validator));
        let serializer =
            Arc::new(Serializer::new(schema.clone()).with_max_depth(self.config.server.max_depth));

        let mut registry = EntityRegistry::new();
        for entity in &self.config.entities {
            let descriptor = schema.get(&entity.kind).ok_or_else(|| {
                anyhow!("Entity kind '{}' is configured but not declared", entity.kind)
            })?;
            if registry.get(&entity.kind).is_some() {
                bail!("Entity kind '{}' is configured twice", entity.kind);
            }
            if let Some(owner) = registry.prefix_owner(&entity.prefix) {
                bail!(
                    "Prefix '{}' of '{}' is already used by '{}'",
                    entity.prefix,
                    entity.kind,
                    owner
                );
            }

            let handler = CrudHandler::new(
                descriptor.clone(),
                store.clone(),
                validator.clone(),
                serializer.clone(),
                entity.groups.clone(),
            );
            let mount = EntityMount::new(entity.prefix.clone(), entity.routes, handler);

            tracing::info!(
                entity = %entity.kind,
                prefix = %mount.prefix,
                routes = ?entity.routes,
                "entity mounted"
            );
            registry.register(mount);
        }

        Ok(registry)
    }

    /// Build the final REST router
    ///
    /// This generates:
    /// - CRUD routes for all configured entities
    /// - Health check routes
    /// - Custom routes
    pub fn build(mut self) -> Result<Router> {
        let registry = self.build_registry()?;

        let mut app = Router::new()
            .route("/health", get(health_check))
            .merge(registry.build_routes());

        for custom_router in std::mem::take(&mut self.custom_routes) {
            app = app.merge(custom_router);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Serve the application on the configured address with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.bind.clone();
        let app = self.build()?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check endpoint handler
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityConfig;
    use crate::entities::demo;
    use crate::storage::InMemoryStore;

    fn demo_builder() -> ServerBuilder {
        let schema = Arc::new(demo::schema().unwrap());
        ServerBuilder::new()
            .with_schema(schema.clone())
            .with_store(InMemoryStore::new(schema))
            .with_config(CrudConfig::default_config())
    }

    #[test]
    fn test_build_requires_schema() {
        let err = ServerBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("Schema is required"));
    }

    #[test]
    fn test_build_requires_store() {
        let schema = Arc::new(demo::schema().unwrap());
        let err = ServerBuilder::new().with_schema(schema).build().unwrap_err();
        assert!(err.to_string().contains("Data access port is required"));
    }

    #[test]
    fn test_registry_mounts_configured_kinds() {
        let registry = demo_builder().build_registry().unwrap();
        assert_eq!(registry.entity_types(), vec!["pet", "user", "group"]);
        assert_eq!(registry.get("pet").unwrap().prefix, "/pets");
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let mut config = CrudConfig::default_config();
        config.entities.push(EntityConfig::new("car", "/cars"));
        let err = demo_builder().with_config(config).build().unwrap_err();
        assert!(err.to_string().contains("car"));
    }

    #[test]
    fn test_shared_prefix_is_rejected() {
        let mut config = CrudConfig::default_config();
        config.entities[2].prefix = "/pets/".to_string();
        let err = demo_builder().with_config(config).build().unwrap_err();
        assert!(err.to_string().contains("already used"));
    }

    #[test]
    fn test_broken_rule_is_rejected_at_startup() {
        let pet = crate::core::descriptor::EntityDescriptor::builder("pet")
            .field(crate::core::descriptor::FieldDescriptor::int("age").validate("positive"))
            .build()
            .unwrap();
        let schema = Arc::new(Schema::new(vec![pet]).unwrap());
        let err = ServerBuilder::new()
            .with_schema(schema.clone())
            .with_store(InMemoryStore::new(schema))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_custom_tags_reach_handlers() {
        let mut validator = Validator::new();
        validator.register("positive", |value, _| {
            value.as_integer().is_some_and(|i| i > 0)
        });
        let pet = crate::core::descriptor::EntityDescriptor::builder("pet")
            .field(crate::core::descriptor::FieldDescriptor::int("age").validate("positive"))
            .build()
            .unwrap();
        let schema = Arc::new(Schema::new(vec![pet]).unwrap());
        assert!(
            ServerBuilder::new()
                .with_schema(schema.clone())
                .with_store(InMemoryStore::new(schema))
                .with_validator(validator)
                .build()
                .is_ok()
        );
    }
}

//! Demo server: pets, users and groups over the in-memory store
//!
//! Reads its configuration from the YAML file named by `CRUD_CONFIG`, or
//! serves the built-in demo configuration on 127.0.0.1:8080.

use anyhow::Result;
use crud::entities::demo;
use crud::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CrudConfig::from_env()?;
    let schema = Arc::new(demo::schema()?);

    tracing::info!(
        bind = %config.server.bind,
        entities = config.entities.len(),
        "starting crud-rs"
    );

    ServerBuilder::new()
        .with_schema(schema.clone())
        .with_store(InMemoryStore::new(schema))
        .with_config(config)
        .serve()
        .await
}

//! Generic CRUD handlers
//!
//! One [`CrudHandler`] serves one entity kind. Each operation is a linear
//! pipeline (decode, validate, persist or query, re-fetch, serialize) that
//! stops at the first failure. The axum entry points below log the outcome
//! once and turn it into exactly one response.

use crate::core::descriptor::EntityDescriptor;
use crate::core::error::{CrudError, CrudResult};
use crate::core::operation::Operation;
use crate::core::payload::MutationPayload;
use crate::core::query::ListQuery;
use crate::core::serialize::{OperationGroups, Serializer};
use crate::core::service::DataAccess;
use crate::core::validation::Validator;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::sync::Arc;

/// Handler state for one entity kind
#[derive(Clone)]
pub struct CrudHandler {
    descriptor: Arc<EntityDescriptor>,
    store: Arc<dyn DataAccess>,
    validator: Arc<Validator>,
    serializer: Arc<Serializer>,
    groups: Arc<OperationGroups>,
}

impl CrudHandler {
    pub fn new(
        descriptor: Arc<EntityDescriptor>,
        store: Arc<dyn DataAccess>,
        validator: Arc<Validator>,
        serializer: Arc<Serializer>,
        groups: OperationGroups,
    ) -> Self {
        Self {
            descriptor,
            store,
            validator,
            serializer,
            groups: Arc::new(groups),
        }
    }

    /// Entity kind served by this handler
    pub fn kind(&self) -> &str {
        self.descriptor.kind()
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Create an entity from a raw body and render it as stored
    pub async fn create(&self, body: &[u8]) -> CrudResult<Value> {
        let id = self.insert(body).await?;
        self.reload(Operation::Create, id).await
    }

    /// Decode, validate and persist a new entity, returning its id
    pub async fn insert(&self, body: &[u8]) -> CrudResult<i64> {
        let payload = MutationPayload::decode(body, &self.descriptor)?;
        self.validator
            .validate(&self.descriptor, &payload, Operation::Create)?;
        Ok(self.store.create(&self.descriptor, &payload).await?)
    }

    /// Render one entity
    pub async fn read(&self, raw_id: &str) -> CrudResult<Value> {
        let id = parse_id(raw_id)?;
        self.reload(Operation::Read, id).await
    }

    /// Apply a partial update and render the entity as stored
    pub async fn update(&self, raw_id: &str, body: &[u8]) -> CrudResult<Value> {
        let id = parse_id(raw_id)?;
        let payload = MutationPayload::decode(body, &self.descriptor)?;
        self.validator
            .validate(&self.descriptor, &payload, Operation::Update)?;
        self.store.update(&self.descriptor, id, &payload).await?;
        self.reload(Operation::Update, id).await
    }

    pub async fn delete(&self, raw_id: &str) -> CrudResult<()> {
        let id = parse_id(raw_id)?;
        self.store.delete(&self.descriptor, id).await?;
        Ok(())
    }

    /// Render one page of entities as a JSON array
    pub async fn list(&self, params: &[(String, String)]) -> CrudResult<Value> {
        let query = ListQuery::from_params(params, &self.descriptor)?;
        let groups = self.groups.for_operation(Operation::List);
        let eager = self.descriptor.eager_edges(groups);
        let records = self.store.list(&self.descriptor, &query, &eager).await?;
        Ok(self
            .serializer
            .render_all(&records, &self.descriptor, groups)?)
    }

    /// Fetch by id with the operation's eager relations and render it
    pub async fn reload(&self, operation: Operation, id: i64) -> CrudResult<Value> {
        let groups = self.groups.for_operation(operation);
        let eager = self.descriptor.eager_edges(groups);
        let record = self.store.fetch(&self.descriptor, id, &eager).await?;
        Ok(self
            .serializer
            .render(&record, &self.descriptor, groups)?)
    }

    /// Log a failed operation once and turn it into its response
    fn reject(&self, operation: Operation, id: Option<&str>, err: CrudError) -> Response {
        let entity = self.kind();
        let id = id.unwrap_or_default();
        if err.is_internal() {
            tracing::error!(entity, %operation, id, error = %err, "{} {} failed", operation, entity);
        } else {
            tracing::info!(entity, %operation, id, error = %err, "{} {} rejected", operation, entity);
        }
        err.into_response()
    }

    fn rendered(&self, operation: Operation, id: Option<&str>, body: Value) -> Response {
        let entity = self.kind();
        tracing::info!(entity, %operation, id = id.unwrap_or_default(), "{} rendered", entity);
        (StatusCode::OK, Json(body)).into_response()
    }
}

/// Parse a path identifier: a positive integer
pub fn parse_id(raw: &str) -> CrudResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CrudError::InvalidId {
            raw: raw.to_string(),
        }),
    }
}

/// POST {prefix}
pub async fn create_entity(State(handler): State<CrudHandler>, body: Bytes) -> Response {
    let id = match handler.insert(&body).await {
        Ok(id) => id,
        Err(err) => return handler.reject(Operation::Create, None, err),
    };
    let raw_id = id.to_string();
    match handler.reload(Operation::Create, id).await {
        Ok(rendered) => handler.rendered(Operation::Create, Some(&raw_id), rendered),
        Err(err) => handler.reject(Operation::Create, Some(&raw_id), err),
    }
}

/// GET {prefix}/{id}
pub async fn read_entity(
    State(handler): State<CrudHandler>,
    Path(id): Path<String>,
) -> Response {
    match handler.read(&id).await {
        Ok(rendered) => handler.rendered(Operation::Read, Some(&id), rendered),
        Err(err) => handler.reject(Operation::Read, Some(&id), err),
    }
}

/// PATCH {prefix}/{id}
pub async fn update_entity(
    State(handler): State<CrudHandler>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    match handler.update(&id, &body).await {
        Ok(rendered) => handler.rendered(Operation::Update, Some(&id), rendered),
        Err(err) => handler.reject(Operation::Update, Some(&id), err),
    }
}

/// DELETE {prefix}/{id}
pub async fn delete_entity(
    State(handler): State<CrudHandler>,
    Path(id): Path<String>,
) -> Response {
    match handler.delete(&id).await {
        Ok(()) => {
            let entity = handler.kind();
            tracing::info!(entity, operation = %Operation::Delete, id = id.as_str(), "{} deleted", entity);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => handler.reject(Operation::Delete, Some(&id), err),
    }
}

/// GET {prefix}
pub async fn list_entities(
    State(handler): State<CrudHandler>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    match handler.list(&params).await {
        Ok(rendered) => handler.rendered(Operation::List, None, rendered),
        Err(err) => handler.reject(Operation::List, None, err),
    }
}

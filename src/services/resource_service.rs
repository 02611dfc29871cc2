use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::database::{Document, Filter, ObjectId, Store, StoreError};
use crate::resources::{Resource, Schemas};
use crate::validation::{Schema, ValidationErrors, ValidationMode};

/// Resource-level failures, already phrased for the resource they concern.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Duplicate { field: String, message: String },

    #[error(transparent)]
    Store(StoreError),
}

/// Updated record plus the store's match/modify counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub document: Document,
    pub matched: u64,
    pub modified: u64,
}

/// Create/read/update/delete orchestration for one resource type. Every operation
/// validates what it can up front and then makes exactly one store call.
pub struct ResourceService<R: Resource> {
    store: Arc<dyn Store>,
    schemas: Arc<Schemas>,
    _resource: PhantomData<R>,
}

impl<R: Resource> ResourceService<R> {
    pub fn new(store: Arc<dyn Store>, schemas: Arc<Schemas>) -> Self {
        Self {
            store,
            schemas,
            _resource: PhantomData,
        }
    }

    fn schema(&self) -> &Schema {
        R::schema(&self.schemas)
    }

    /// Declare the resource's unique fields on the store. Safe to repeat.
    pub async fn init_indexes(&self) -> Result<(), ServiceError> {
        for field in R::UNIQUE_FIELDS {
            self.store
                .create_unique_index(R::COLLECTION, field)
                .await
                .map_err(Self::store_error)?;
            info!("{}: unique index on '{}' ready", R::COLLECTION, field);
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Document>, ServiceError> {
        self.store
            .find(R::COLLECTION, &Filter::all())
            .await
            .map_err(Self::store_error)
    }

    pub async fn get(&self, raw_id: &str) -> Result<Document, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        self.store
            .find_one(R::COLLECTION, &id)
            .await
            .map_err(Self::store_error)?
            .ok_or_else(|| ServiceError::NotFound(R::not_found_message()))
    }

    pub async fn create(&self, body: Value) -> Result<Document, ServiceError> {
        let mut input = self.prepare(body, ValidationMode::Create)?;
        for (field, value) in R::defaults() {
            input.entry(field).or_insert(value);
        }

        let result = self
            .store
            .insert(R::COLLECTION, input)
            .await
            .map_err(Self::store_error)?;

        info!("{}: created {}", R::COLLECTION, result.id);
        Ok(result.document)
    }

    pub async fn update(&self, raw_id: &str, body: Value) -> Result<UpdateOutcome, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        let patch = self.prepare(body, ValidationMode::Update)?;

        let result = self
            .store
            .update(R::COLLECTION, &id, patch)
            .await
            .map_err(Self::store_error)?;

        let document = match result.document {
            Some(document) if result.matched_count > 0 => document,
            _ => return Err(ServiceError::NotFound(R::not_found_message())),
        };

        debug!(
            "{}: update {} matched={} modified={}",
            R::COLLECTION, id, result.matched_count, result.modified_count
        );
        Ok(UpdateOutcome {
            document,
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    pub async fn delete(&self, raw_id: &str) -> Result<ObjectId, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        let result = self
            .store
            .delete(R::COLLECTION, &id)
            .await
            .map_err(Self::store_error)?;

        if result.deleted_count == 0 {
            return Err(ServiceError::NotFound(R::not_found_message()));
        }

        info!("{}: deleted {}", R::COLLECTION, id);
        Ok(id)
    }

    /// Project, sanitize and validate a request body.
    pub fn prepare(&self, body: Value, mode: ValidationMode) -> Result<Document, ServiceError> {
        let Value::Object(input) = body else {
            return Err(ValidationErrors::single("body", "Request body must be a JSON object").into());
        };

        let schema = self.schema();
        let mut input = schema.project(input);
        schema.sanitize(&mut input);
        schema.validate(&input, mode)?;
        Ok(input)
    }

    fn parse_id(raw: &str) -> Result<ObjectId, ServiceError> {
        R::parse_id(raw).ok_or_else(|| ServiceError::InvalidId(raw.to_string()))
    }

    fn store_error(err: StoreError) -> ServiceError {
        match err {
            StoreError::Duplicate { field, .. } => {
                let message = R::duplicate_message(&field);
                ServiceError::Duplicate { field, message }
            }
            other => ServiceError::Store(other),
        }
    }
}

impl<R: Resource> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone(), self.schemas.clone())
    }
}

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::object_id::ObjectId;
use super::record::{get_path, Document};

/// Failures reported by a document store. Handlers never expose these directly;
/// they pass through the error normalizer in `crate::error`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key in {collection}: {field}")]
    Duplicate { collection: String, field: String },

    #[error("Invalid collection or field name: {0}")]
    InvalidName(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored document is corrupt: {0}")]
    Corrupt(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Equality conjunction over top-level or dotted fields. An empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| get_path(doc, field) == Some(expected))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertResult {
    pub id: ObjectId,
    pub acknowledged: bool,
    /// The document as persisted, including `_id` and timestamps
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// The document after the update, when one matched
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// The persistence capability the catalog depends on.
///
/// Implementations own identifier and timestamp assignment, uniqueness enforcement
/// and per-document atomicity. Every method is a single logical store call.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;

    /// Documents matching `filter`, in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>, StoreError>;

    /// Persist a new document. The store assigns `_id`, `createdAt` and `updatedAt`.
    async fn insert(&self, collection: &str, document: Document) -> Result<InsertResult, StoreError>;

    /// Apply the fields of `patch` that differ from the stored values. `updatedAt`
    /// is refreshed only when at least one field changed.
    async fn update(&self, collection: &str, id: &ObjectId, patch: Document) -> Result<UpdateResult, StoreError>;

    async fn delete(&self, collection: &str, id: &ObjectId) -> Result<DeleteResult, StoreError>;

    /// Declare that `field` must be unique across `collection`. Idempotent.
    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Release backend resources at shutdown.
    async fn close(&self) {}
}

/// Collection and field names end up in index names and JSON paths.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::info;

use super::object_id::ObjectId;
use super::record::{apply_patch, stamp_new, Document};
use super::store::{
    is_valid_name, DeleteResult, Filter, InsertResult, Store, StoreError, UpdateResult,
};

const UNIQUE_VIOLATION: &str = "23505";
const INDEX_PREFIX: &str = "uniq__";

/// Document store on a single PostgreSQL table holding JSONB bodies.
///
/// Uniqueness is enforced by partial expression indexes named
/// `uniq__<collection>__<field>`, so a duplicate-key error can be traced back to
/// the offending field from the constraint name alone.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                match db_err.constraint().and_then(parse_index_name) {
                    Some((collection, field)) => StoreError::Duplicate { collection, field },
                    None => StoreError::Duplicate {
                        collection: String::new(),
                        field: "_id".to_string(),
                    },
                }
            }
            _ => StoreError::Sqlx(err),
        }
    }
}

fn index_name(collection: &str, field: &str) -> String {
    format!("{INDEX_PREFIX}{collection}__{field}")
}

fn parse_index_name(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix(INDEX_PREFIX)?;
    let (collection, field) = rest.split_once("__")?;
    Some((collection.to_string(), field.to_string()))
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Nest dotted paths into a JSON object so the filter can be used with `@>`.
fn containment(filter: &Filter) -> Value {
    let mut root = serde_json::Map::new();
    for (path, value) in filter.conditions() {
        let parts: Vec<&str> = path.split('.').collect();
        insert_path(&mut root, &parts, value.clone());
    }
    Value::Object(root)
}

fn insert_path(target: &mut serde_json::Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [leaf] => {
            target.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            } else {
                let mut map = serde_json::Map::new();
                insert_path(&mut map, rest, value);
                *child = Value::Object(map);
            }
        }
    }
}

fn body_of(row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
    into_document(row.try_get("body")?)
}

fn into_document(body: Value) -> Result<Document, StoreError> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Corrupt(format!("document body is not an object: {}", other))),
    }
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32, timeout_secs: u64) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(timeout_secs))
            .connect(url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the documents table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq        BIGSERIAL,
                id         CHAR(24)    NOT NULL PRIMARY KEY,
                collection TEXT        NOT NULL,
                body       JSONB       NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS documents_collection_seq ON documents (collection, seq)")
            .execute(&self.pool)
            .await?;
        info!("postgres store: documents table ready");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        check_name(collection)?;
        let rows = if filter.is_empty() {
            sqlx::query("SELECT body FROM documents WHERE collection = $1 ORDER BY seq")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY seq")
                .bind(collection)
                .bind(containment(filter))
                .fetch_all(&self.pool)
                .await?
        };
        rows.iter().map(body_of).collect()
    }

    async fn find_one(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>, StoreError> {
        check_name(collection)?;
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.to_hex())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(body_of).transpose()
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<InsertResult, StoreError> {
        check_name(collection)?;
        let id = ObjectId::new();
        let document = stamp_new(document, id);

        sqlx::query("INSERT INTO documents (id, collection, body) VALUES ($1, $2, $3)")
            .bind(id.to_hex())
            .bind(collection)
            .bind(Value::Object(document.clone()))
            .execute(&self.pool)
            .await?;

        Ok(InsertResult {
            id,
            acknowledged: true,
            document,
        })
    }

    async fn update(&self, collection: &str, id: &ObjectId, patch: Document) -> Result<UpdateResult, StoreError> {
        check_name(collection)?;
        let mut tx = self.pool.begin().await?;

        // Row lock keeps the read-merge-write atomic per document
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
            .bind(collection)
            .bind(id.to_hex())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(UpdateResult { matched_count: 0, modified_count: 0, document: None });
        };

        let mut merged = body_of(&row)?;
        let changes = apply_patch(&mut merged, &patch);
        if changes.is_empty() {
            tx.rollback().await?;
            return Ok(UpdateResult {
                matched_count: 1,
                modified_count: 0,
                document: Some(merged),
            });
        }

        sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.to_hex())
            .bind(Value::Object(merged.clone()))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(UpdateResult {
            matched_count: 1,
            modified_count: 1,
            document: Some(merged),
        })
    }

    async fn delete(&self, collection: &str, id: &ObjectId) -> Result<DeleteResult, StoreError> {
        check_name(collection)?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(DeleteResult {
            deleted_count: result.rows_affected(),
        })
    }

    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        check_name(collection)?;
        check_name(field)?;
        // Names are validated above; DDL cannot take bind parameters
        let sql = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"{index}\" ON documents ((body->>'{field}')) \
             WHERE collection = '{collection}'",
            index = index_name(collection, field),
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        info!("postgres store: unique index on {}.{}", collection, field);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("postgres store: pool closed");
    }
}

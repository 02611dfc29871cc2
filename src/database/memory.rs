use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::object_id::ObjectId;
use super::record::{apply_patch, document_id, get_path, stamp_new, Document};
use super::store::{
    is_valid_name, DeleteResult, Filter, InsertResult, Store, StoreError, UpdateResult,
};

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

impl Collection {
    fn position(&self, id: &ObjectId) -> Option<usize> {
        self.documents
            .iter()
            .position(|doc| document_id(doc).as_ref() == Some(id))
    }

    /// First unique field on which `candidate` collides with another document.
    /// Null and missing values never collide.
    fn conflicting_field(&self, candidate: &Document, skip: Option<usize>) -> Option<String> {
        self.unique_fields.iter().find_map(|field| {
            let value = get_path(candidate, field).filter(|v| !v.is_null())?;
            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, doc)| get_path(doc, field) == Some(value));
            clash.then(|| field.clone())
        })
    }
}

/// Process-local document store. Writes are serialized behind a single lock, which
/// makes unique checks and inserts one atomic step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        check_name(collection)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.documents.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>, StoreError> {
        check_name(collection)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.position(id).map(|i| c.documents[i].clone())))
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<InsertResult, StoreError> {
        check_name(collection)?;
        let id = ObjectId::new();
        let document = stamp_new(document, id);

        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        if let Some(field) = entry.conflicting_field(&document, None) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                field,
            });
        }
        entry.documents.push(document.clone());

        tracing::debug!("memory store: inserted {} into {}", id, collection);
        Ok(InsertResult {
            id,
            acknowledged: true,
            document,
        })
    }

    async fn update(&self, collection: &str, id: &ObjectId, patch: Document) -> Result<UpdateResult, StoreError> {
        check_name(collection)?;
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(UpdateResult { matched_count: 0, modified_count: 0, document: None });
        };
        let Some(index) = entry.position(id) else {
            return Ok(UpdateResult { matched_count: 0, modified_count: 0, document: None });
        };

        // Merge on a copy so a uniqueness failure leaves the stored document intact
        let mut merged = entry.documents[index].clone();
        let changes = apply_patch(&mut merged, &patch);
        if changes.is_empty() {
            return Ok(UpdateResult {
                matched_count: 1,
                modified_count: 0,
                document: Some(merged),
            });
        }
        if let Some(field) = entry.conflicting_field(&merged, Some(index)) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                field,
            });
        }
        entry.documents[index] = merged.clone();

        Ok(UpdateResult {
            matched_count: 1,
            modified_count: 1,
            document: Some(merged),
        })
    }

    async fn delete(&self, collection: &str, id: &ObjectId) -> Result<DeleteResult, StoreError> {
        check_name(collection)?;
        let mut collections = self.collections.write().await;
        let deleted = match collections.get_mut(collection) {
            Some(entry) => match entry.position(id) {
                Some(index) => {
                    entry.documents.remove(index);
                    1
                }
                None => 0,
            },
            None => 0,
        };
        Ok(DeleteResult { deleted_count: deleted })
    }

    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        check_name(collection)?;
        check_name(field)?;
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();

        // Refuse to declare an index the existing data already violates
        let mut seen: Vec<&Value> = Vec::new();
        for doc in &entry.documents {
            if let Some(value) = get_path(doc, field).filter(|v| !v.is_null()) {
                if seen.contains(&value) {
                    return Err(StoreError::Duplicate {
                        collection: collection.to_string(),
                        field: field.to_string(),
                    });
                }
                seen.push(value);
            }
        }

        if !entry.unique_fields.iter().any(|f| f == field) {
            entry.unique_fields.push(field.to_string());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::record::{CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let res = store.insert("products", doc(json!({ "name": "Mouse" }))).await.unwrap();
        assert!(res.acknowledged);
        assert_eq!(res.document[ID_FIELD], json!(res.id.to_hex()));
        assert!(res.document.contains_key(CREATED_AT_FIELD));
        assert_eq!(res.document[CREATED_AT_FIELD], res.document[UPDATED_AT_FIELD]);

        let found = store.find_one("products", &res.id).await.unwrap();
        assert_eq!(found, Some(res.document));
    }

    #[tokio::test]
    async fn find_preserves_insertion_order() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            store.insert("categories", doc(json!({ "name": name }))).await.unwrap();
        }
        let names: Vec<Value> = store
            .find("categories", &Filter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|d| d["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("a"), json!("b"), json!("c")]);
        assert!(store.find("missing", &Filter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates_on_insert_and_update() {
        let store = MemoryStore::new();
        store.create_unique_index("products", "SKU").await.unwrap();
        let first = store.insert("products", doc(json!({ "SKU": "A-1" }))).await.unwrap();
        let second = store.insert("products", doc(json!({ "SKU": "B-1" }))).await.unwrap();

        let err = store.insert("products", doc(json!({ "SKU": "A-1" }))).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "SKU"));

        let err = store
            .update("products", &second.id, doc(json!({ "SKU": "A-1" })))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());

        // The failed update left the document untouched
        let kept = store.find_one("products", &second.id).await.unwrap().unwrap();
        assert_eq!(kept["SKU"], json!("B-1"));
        assert_eq!(store.find("products", &Filter::all()).await.unwrap().len(), 2);

        // Re-saving a document with its own SKU is not a conflict
        let same = store
            .update("products", &first.id, doc(json!({ "SKU": "A-1", "stock": 3 })))
            .await
            .unwrap();
        assert_eq!(same.modified_count, 1);
    }

    #[tokio::test]
    async fn update_reports_matched_and_modified() {
        let store = MemoryStore::new();
        let created = store.insert("products", doc(json!({ "price": 1.0 }))).await.unwrap();

        let changed = store
            .update("products", &created.id, doc(json!({ "price": 2.0 })))
            .await
            .unwrap();
        assert_eq!((changed.matched_count, changed.modified_count), (1, 1));

        let again = store
            .update("products", &created.id, doc(json!({ "price": 2.0 })))
            .await
            .unwrap();
        assert_eq!((again.matched_count, again.modified_count), (1, 0));

        let missing = store
            .update("products", &ObjectId::new(), doc(json!({ "price": 3.0 })))
            .await
            .unwrap();
        assert_eq!(missing.matched_count, 0);
        assert!(missing.document.is_none());
    }

    #[tokio::test]
    async fn delete_is_hard() {
        let store = MemoryStore::new();
        let created = store.insert("products", doc(json!({ "name": "x" }))).await.unwrap();
        assert_eq!(store.delete("products", &created.id).await.unwrap().deleted_count, 1);
        assert_eq!(store.delete("products", &created.id).await.unwrap().deleted_count, 0);
        assert!(store.find_one("products", &created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_unsafe_names() {
        let store = MemoryStore::new();
        let err = store.find("bad name", &Filter::all()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }
}

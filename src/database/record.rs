use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::object_id::ObjectId;

/// An untyped stored document: field name to JSON value.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Fields that only the store may set; they are stripped from client input.
pub const SYSTEM_FIELDS: &[&str] = &[ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// Current time in the wire format used for `createdAt` / `updatedAt`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Result of merging a partial update into an existing document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDiff {
    /// Fields that did not exist before the patch
    pub added: BTreeSet<String>,
    /// Fields that existed and now hold a different value
    pub modified: BTreeSet<String>,
    /// Fields present in the patch with an identical value
    pub unchanged: BTreeSet<String>,
}

impl RecordDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty()
    }

    pub fn changed_fields(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.modified.iter())
    }
}

/// Compare `patch` against `existing` without mutating anything.
pub fn diff(existing: &Document, patch: &Document) -> RecordDiff {
    let mut out = RecordDiff::default();
    for (key, value) in patch {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            continue;
        }
        match existing.get(key) {
            None => {
                out.added.insert(key.clone());
            }
            Some(old) if old == value => {
                out.unchanged.insert(key.clone());
            }
            Some(_) => {
                out.modified.insert(key.clone());
            }
        }
    }
    out
}

/// Apply the changed fields of `patch` to `existing`, refreshing `updatedAt` when
/// anything changed. Returns what changed.
pub fn apply_patch(existing: &mut Document, patch: &Document) -> RecordDiff {
    let changes = diff(existing, patch);
    if changes.is_empty() {
        return changes;
    }
    for key in changes.changed_fields() {
        if let Some(value) = patch.get(key) {
            existing.insert(key.clone(), value.clone());
        }
    }
    existing.insert(UPDATED_AT_FIELD.to_string(), Value::String(timestamp_now()));
    changes
}

/// Assign identifier and creation timestamps to a new document.
/// Client-supplied system fields are overwritten.
pub fn stamp_new(mut doc: Document, id: ObjectId) -> Document {
    let now = timestamp_now();
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
    doc.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
    doc.insert(UPDATED_AT_FIELD.to_string(), Value::String(now));
    doc
}

/// Read the identifier of a stored document.
pub fn document_id(doc: &Document) -> Option<ObjectId> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| ObjectId::parse_str(s).ok())
}

/// Look up a dot-separated path (`specifications.ram`) in a document.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

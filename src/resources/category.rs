use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::{Document, ObjectId};
use crate::validation::{FieldRule, Schema};

use super::{Resource, Schemas};

/// Typed view of a category document.
///
/// `parent_category` is only format-checked on input; nothing stops it from
/// pointing at a category that was later deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub parent_category: Option<ObjectId>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Category {
    /// The sample category from the API documentation.
    pub fn sample() -> Self {
        Self {
            id: None,
            name: "Gaming".to_string(),
            description: Some("Gaming devices and accessories".to_string()),
            is_active: true,
            parent_category: None,
            features: vec!["Performance".into(), "Graphics".into(), "Storage".into()],
            brands: vec!["Razer".into(), "Alienware".into(), "MSI".into()],
            created_at: None,
            updated_at: None,
        }
    }
}

impl Resource for Category {
    const NAME: &'static str = "Category";
    const COLLECTION: &'static str = "categories";
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn schema(schemas: &Schemas) -> &Schema {
        schemas.categories()
    }

    fn defaults() -> Document {
        let mut doc = Document::new();
        doc.insert("isActive".to_string(), Value::Bool(true));
        doc.insert("parentCategory".to_string(), Value::Null);
        doc.insert("features".to_string(), Value::Array(Vec::new()));
        doc.insert("brands".to_string(), Value::Array(Vec::new()));
        doc
    }

    fn duplicate_message(field: &str) -> String {
        match field {
            "name" => "Category name already exists".to_string(),
            other => format!("{} already exists", other),
        }
    }
}

pub(crate) fn schema() -> Schema {
    Schema::new(Category::NAME)
        .rule(
            FieldRule::new("name")
                .required("Category name is required")
                .trim()
                .string("Category name must be a string"),
        )
        .rule(FieldRule::new("description").trim().string("Description must be a string"))
        .rule(FieldRule::new("isActive").boolean("isActive must be a boolean"))
        .rule(
            FieldRule::new("parentCategory")
                .nullable()
                .object_id("Parent category must be a valid ID"),
        )
        .rule(FieldRule::new("features").string_array("Features must be an array of strings"))
        .rule(FieldRule::new("brands").string_array("Brands must be an array of strings"))
}

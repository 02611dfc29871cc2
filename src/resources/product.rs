use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::database::{Document, ObjectId};
use crate::validation::{FieldRule, Schema};

use super::{Resource, Schemas};

/// Typed view of a product document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    pub brand: String,
    pub stock: i64,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Product {
    /// The sample product from the API documentation.
    pub fn sample() -> Self {
        let specifications = [("processor", "Intel i9"), ("ram", "32GB"), ("storage", "1TB SSD")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            id: None,
            name: "Gaming Laptop".to_string(),
            price: 1299.99,
            description: "High-performance gaming laptop".to_string(),
            category: "Laptops".to_string(),
            brand: "Dell".to_string(),
            stock: 50,
            sku: "GL-2024-001".to_string(),
            specifications: Some(specifications),
            warranty: Some("2 years".to_string()),
            in_stock: Some(true),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Resource for Product {
    const NAME: &'static str = "Product";
    const COLLECTION: &'static str = "products";
    const UNIQUE_FIELDS: &'static [&'static str] = &["SKU"];

    fn schema(schemas: &Schemas) -> &Schema {
        schemas.products()
    }

    fn defaults() -> Document {
        let mut doc = Document::new();
        doc.insert("inStock".to_string(), Value::Bool(true));
        doc
    }
}

/// Price and stock accept zero; SKU format comes from configuration.
pub(crate) fn schema(sku_pattern: Regex) -> Schema {
    Schema::new(Product::NAME)
        .rule(
            FieldRule::new("name")
                .required("Product name is required")
                .trim()
                .string("Product name must be a string")
                .min_length(3, "Product name must be at least 3 characters"),
        )
        .rule(
            FieldRule::new("price")
                .required("Price is required")
                .number("Price must be a number")
                .min(0.0, "Price cannot be negative"),
        )
        .rule(
            FieldRule::new("description")
                .required("Description is required")
                .trim()
                .string("Description must be a string"),
        )
        .rule(
            FieldRule::new("category")
                .required("Category is required")
                .trim()
                .string("Category must be a string"),
        )
        .rule(
            FieldRule::new("brand")
                .required("Brand is required")
                .trim()
                .string("Brand must be a string"),
        )
        .rule(
            FieldRule::new("stock")
                .required("Stock is required")
                .integer("Stock must be an integer")
                .min(0.0, "Stock cannot be negative"),
        )
        .rule(
            FieldRule::new("SKU")
                .required("SKU is required")
                .trim()
                .string("SKU must be a string")
                .pattern(sku_pattern, "SKU must contain only letters, numbers, and hyphens"),
        )
        .rule(FieldRule::new("specifications").string_map("Specifications must map names to strings"))
        .rule(FieldRule::new("warranty").trim().string("Warranty must be a string"))
        .rule(FieldRule::new("inStock").boolean("inStock must be a boolean"))
}

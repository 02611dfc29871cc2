pub mod category;
pub mod product;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::{ConfigError, ValidationConfig};
use crate::database::{Document, ObjectId};
use crate::validation::Schema;

pub use category::Category;
pub use product::Product;

/// A catalog resource served by the generic handlers: where it lives, how its
/// input is validated, and how its failures are phrased.
pub trait Resource: Send + Sync + 'static {
    /// Singular display name used in messages ("Product")
    const NAME: &'static str;
    /// Store collection and URL segment ("products")
    const COLLECTION: &'static str;
    /// Fields the store must keep unique across the collection
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    fn schema(schemas: &Schemas) -> &Schema;

    /// Values filled in on create for optional fields the client left out.
    fn defaults() -> Document {
        Document::new()
    }

    /// Identifier format check, run before any store call.
    fn parse_id(raw: &str) -> Option<ObjectId> {
        ObjectId::parse_str(raw).ok()
    }

    fn not_found_message() -> String {
        format!("{} not found", Self::NAME)
    }

    fn deleted_message() -> String {
        format!("{} deleted successfully", Self::NAME)
    }

    fn duplicate_message(field: &str) -> String {
        format!("{} already exists", field)
    }
}

/// Compiled validation schemas for every resource, built once from configuration.
#[derive(Debug, Clone)]
pub struct Schemas {
    products: Schema,
    categories: Schema,
}

impl Schemas {
    pub fn from_config(config: &ValidationConfig) -> Result<Self, ConfigError> {
        let sku_pattern = regex::Regex::new(&config.sku_pattern)?;
        Ok(Self {
            products: product::schema(sku_pattern),
            categories: category::schema(),
        })
    }

    pub fn products(&self) -> &Schema {
        &self.products
    }

    pub fn categories(&self) -> &Schema {
        &self.categories
    }

    pub fn for_kind(&self, kind: ResourceKind) -> &Schema {
        match kind {
            ResourceKind::Products => &self.products,
            ResourceKind::Categories => &self.categories,
        }
    }
}

/// Runtime selector for the resource families, used where the type is only known
/// from input (query strings, CLI arguments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Products,
    Categories,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Products, ResourceKind::Categories];

    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Products => Product::COLLECTION,
            ResourceKind::Categories => Category::COLLECTION,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(ResourceKind::Products),
            "categories" => Ok(ResourceKind::Categories),
            other => Err(format!("unknown resource type: {}", other)),
        }
    }
}

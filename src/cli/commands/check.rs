use anyhow::Context;
use clap::Args;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::utils::{output_field_errors, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::resources::{ResourceKind, Schemas};
use crate::validation::{FieldError, Schema, ValidationMode};

#[derive(Args)]
pub struct CheckArgs {
    #[arg(help = "Resource type: products or categories")]
    pub resource: ResourceKind,
    #[arg(help = "JSON or YAML file holding one document or an array of documents")]
    pub file: PathBuf,
}

pub async fn handle(args: CheckArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let schemas = Schemas::from_config(&config::config().validation)?;
    let documents = load_documents(&args.file)?;
    let total = documents.len();

    let failures = check_documents(schemas.for_kind(args.resource), documents);
    for (index, errors) in &failures {
        output_field_errors(&output_format, &format!("{}[{}]", args.resource, index), errors)?;
    }

    if failures.is_empty() {
        output_success(
            &output_format,
            &format!("{} {} document(s) valid", total, args.resource),
            Some(json!({ "checked": total })),
        )
    } else {
        anyhow::bail!("{} of {} {} document(s) invalid", failures.len(), total, args.resource)
    }
}

/// Parse by extension: `.yaml`/`.yml` as YAML, anything else as JSON.
fn load_documents(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;

    let value: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("{} is not valid YAML", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()))?,
    };

    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Field errors per failing document, keyed by position.
pub fn check_documents(schema: &Schema, documents: Vec<Value>) -> Vec<(usize, Vec<FieldError>)> {
    documents
        .into_iter()
        .enumerate()
        .filter_map(|(index, document)| {
            let Value::Object(input) = document else {
                return Some((index, vec![FieldError::new("body", "Document must be a JSON object")]));
            };
            let mut input = schema.project(input);
            schema.sanitize(&mut input);
            schema
                .validate(&input, ValidationMode::Create)
                .err()
                .map(|errors| (index, errors.into_errors()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::resources::Product;

    fn schemas() -> Schemas {
        Schemas::from_config(&AppConfig::development().validation).unwrap()
    }

    #[test]
    fn reports_failing_documents_by_index() {
        let schemas = schemas();
        let documents = vec![
            serde_json::to_value(Product::sample()).unwrap(),
            json!({ "name": "ab" }),
            json!("not an object"),
        ];
        let failures = check_documents(schemas.products(), documents);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].0, 1);
        assert_eq!(failures[0].1[0].message, "Product name must be at least 3 characters");
        assert_eq!(failures[1].0, 2);
        assert_eq!(failures[1].1[0].field, "body");
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = std::env::temp_dir().join(format!("catalog-check-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let yaml = dir.join("categories.yaml");
        fs::write(&yaml, "- name: Gaming\n  features: [Performance]\n- name: Audio\n").unwrap();
        let documents = load_documents(&yaml).unwrap();
        assert_eq!(documents.len(), 2);
        assert!(check_documents(schemas().categories(), documents).is_empty());

        let single = dir.join("category.json");
        fs::write(&single, r#"{ "name": "Gaming" }"#).unwrap();
        assert_eq!(load_documents(&single).unwrap().len(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::database::record::{get_path, Document, SYSTEM_FIELDS};

use super::rule::{is_blank, FieldRule};

/// One failed check: which field, and the message declared for the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Non-empty, ordered list of field errors (declaration order, then check order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, message)])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.0
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.message.as_str()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Whether the input is a complete record or a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Required fields must be present
    Create,
    /// Only supplied fields are checked
    Update,
}

/// Ordered field rules for one resource type.
#[derive(Debug, Clone)]
pub struct Schema {
    resource: &'static str,
    rules: Vec<FieldRule>,
}

impl Schema {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Top-level field names, in declaration order, without duplicates.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rule in &self.rules {
            let root = rule.root_field();
            if !names.contains(&root) {
                names.push(root);
            }
        }
        names
    }

    /// Drop undeclared and server-managed fields from client input.
    pub fn project(&self, input: Document) -> Document {
        let declared = self.field_names();
        input
            .into_iter()
            .filter(|(key, _)| {
                let keep = declared.contains(&key.as_str()) && !SYSTEM_FIELDS.contains(&key.as_str());
                if !keep {
                    tracing::debug!("{}: dropping undeclared field '{}'", self.resource, key);
                }
                keep
            })
            .collect()
    }

    /// Trim top-level string values of rules marked `trim`.
    pub fn sanitize(&self, input: &mut Document) {
        for rule in self.rules.iter().filter(|r| r.trims()) {
            if let Some(Value::String(s)) = input.get_mut(rule.field()) {
                let trimmed = s.trim();
                if trimmed.len() != s.len() {
                    *s = trimmed.to_string();
                }
            }
        }
    }

    /// Run every rule against `input` and collect all failures.
    ///
    /// Fields never short-circuit each other; within one field, evaluation stops at
    /// the first failing check.
    pub fn validate(&self, input: &Document, mode: ValidationMode) -> Result<(), ValidationErrors> {
        let errors: Vec<FieldError> = self
            .rules
            .iter()
            .filter_map(|rule| check_field(rule, get_path(input, rule.field()), mode))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

fn check_field(rule: &FieldRule, value: Option<&Value>, mode: ValidationMode) -> Option<FieldError> {
    let fail = |message: &str| Some(FieldError::new(rule.field(), message));

    let value = match value {
        None => {
            // Absent: only a required field on a full record is an error
            return match (rule.required_message(), mode) {
                (Some(message), ValidationMode::Create) => fail(message),
                _ => None,
            };
        }
        Some(v) => v,
    };

    if value.is_null() {
        if rule.is_nullable() {
            return None;
        }
        return rule.required_message().and_then(fail);
    }

    if let Some(message) = rule.required_message() {
        if is_blank(value) {
            return fail(message);
        }
    }

    rule.steps()
        .iter()
        .find(|step| !step.check.passes(value))
        .and_then(|step| fail(&step.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rule::FieldRule;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn schema() -> Schema {
        Schema::new("Widget")
            .rule(
                FieldRule::new("name")
                    .required("Name is required")
                    .trim()
                    .string("Name must be a string")
                    .min_length(3, "Name must be at least 3 characters"),
            )
            .rule(
                FieldRule::new("price")
                    .required("Price is required")
                    .number("Price must be a number")
                    .min(0.0, "Price cannot be negative"),
            )
            .rule(FieldRule::new("tags").string_array("Tags must be an array of strings"))
            .rule(FieldRule::new("parent").nullable().object_id("Parent must be a valid ID"))
            .rule(FieldRule::new("specs.ram").string("RAM must be a string"))
    }

    #[test]
    fn valid_record_passes() {
        let input = doc(json!({ "name": "Widget", "price": 0, "tags": ["a"], "parent": null }));
        assert!(schema().validate(&input, ValidationMode::Create).is_ok());
    }

    #[test]
    fn aggregates_in_declaration_order() {
        let input = doc(json!({ "price": -1, "tags": "nope", "name": "ab" }));
        let errors = schema().validate(&input, ValidationMode::Create).unwrap_err();
        assert_eq!(errors.fields(), vec!["name", "price", "tags"]);
        assert_eq!(
            errors.messages(),
            vec![
                "Name must be at least 3 characters",
                "Price cannot be negative",
                "Tags must be an array of strings",
            ]
        );
    }

    #[test]
    fn one_message_per_field() {
        // A string price fails the type check and must not also report the bound
        let input = doc(json!({ "name": "Widget", "price": "-5" }));
        let errors = schema().validate(&input, ValidationMode::Create).unwrap_err();
        assert_eq!(errors.errors(), &[FieldError::new("price", "Price must be a number")]);
    }

    #[test]
    fn missing_required_field_reported_alone() {
        let input = doc(json!({ "name": "Widget" }));
        let errors = schema().validate(&input, ValidationMode::Create).unwrap_err();
        assert_eq!(errors.errors(), &[FieldError::new("price", "Price is required")]);
    }

    #[test]
    fn update_mode_skips_absent_fields() {
        let input = doc(json!({ "price": 12 }));
        assert!(schema().validate(&input, ValidationMode::Update).is_ok());

        let input = doc(json!({ "price": -12 }));
        let errors = schema().validate(&input, ValidationMode::Update).unwrap_err();
        assert_eq!(errors.fields(), vec!["price"]);
    }

    #[test]
    fn null_and_blank_required_values_fail_required() {
        let input = doc(json!({ "name": "   ", "price": null }));
        let errors = schema().validate(&input, ValidationMode::Update).unwrap_err();
        assert_eq!(errors.messages(), vec!["Name is required", "Price is required"]);
    }

    #[test]
    fn nullable_and_optional_nulls_pass() {
        let input = doc(json!({ "name": "Widget", "price": 1, "parent": null, "tags": null }));
        assert!(schema().validate(&input, ValidationMode::Create).is_ok());

        let input = doc(json!({ "name": "Widget", "price": 1, "parent": "nope" }));
        let errors = schema().validate(&input, ValidationMode::Create).unwrap_err();
        assert_eq!(errors.messages(), vec!["Parent must be a valid ID"]);
    }

    #[test]
    fn nested_paths_are_checked() {
        let input = doc(json!({ "name": "Widget", "price": 1, "specs": { "ram": 32 } }));
        let errors = schema().validate(&input, ValidationMode::Create).unwrap_err();
        assert_eq!(errors.fields(), vec!["specs.ram"]);
    }

    #[test]
    fn project_drops_undeclared_and_system_fields() {
        let input = doc(json!({
            "_id": "507f1f77bcf86cd799439011",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "name": "Widget",
            "specs": { "ram": "8GB" },
            "quantity": 3
        }));
        let projected = schema().project(input);
        let mut keys: Vec<&String> = projected.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["name", "specs"]);
    }

    #[test]
    fn sanitize_trims_marked_fields() {
        let mut input = doc(json!({ "name": "  Widget  ", "price": 1 }));
        schema().sanitize(&mut input);
        assert_eq!(input["name"], json!("Widget"));
    }

    #[test]
    fn display_joins_errors() {
        let errors = ValidationErrors::single("name", "Name is required");
        assert_eq!(errors.to_string(), "name: Name is required");
    }
}

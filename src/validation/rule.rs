use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::database::ObjectId;

type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A single check on a field value. `Required` is evaluated separately from the
/// others because it is the only check that looks at absence.
#[derive(Clone)]
pub enum Check {
    Required,
    String,
    NotEmpty,
    Number,
    Integer,
    Boolean,
    StringArray,
    StringMap,
    MinLength(usize),
    MaxLength(usize),
    Min { bound: f64, inclusive: bool },
    Pattern(Regex),
    ObjectId,
    Custom(Predicate),
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Required => f.write_str("Required"),
            Check::String => f.write_str("String"),
            Check::NotEmpty => f.write_str("NotEmpty"),
            Check::Number => f.write_str("Number"),
            Check::Integer => f.write_str("Integer"),
            Check::Boolean => f.write_str("Boolean"),
            Check::StringArray => f.write_str("StringArray"),
            Check::StringMap => f.write_str("StringMap"),
            Check::MinLength(n) => write!(f, "MinLength({})", n),
            Check::MaxLength(n) => write!(f, "MaxLength({})", n),
            Check::Min { bound, inclusive } => write!(f, "Min({}, inclusive={})", bound, inclusive),
            Check::Pattern(re) => write!(f, "Pattern({})", re.as_str()),
            Check::ObjectId => f.write_str("ObjectId"),
            Check::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Empty or whitespace-only strings count as missing, like a blank form field.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

impl Check {
    /// Whether `value` (known to be present and non-null) passes this check.
    ///
    /// Range and length checks pass on values of the wrong type; pair them with a
    /// type check earlier in the chain, which fails first.
    pub fn passes(&self, value: &Value) -> bool {
        match self {
            Check::Required => !is_blank(value),
            Check::String => value.is_string(),
            Check::NotEmpty => !is_blank(value),
            Check::Number => value.is_number(),
            Check::Integer => match value {
                Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
                _ => false,
            },
            Check::Boolean => value.is_boolean(),
            Check::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Check::StringMap => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
            Check::MinLength(min) => value.as_str().map_or(true, |s| s.chars().count() >= *min),
            Check::MaxLength(max) => value.as_str().map_or(true, |s| s.chars().count() <= *max),
            Check::Min { bound, inclusive } => value.as_f64().map_or(true, |n| {
                if *inclusive {
                    n >= *bound
                } else {
                    n > *bound
                }
            }),
            Check::Pattern(re) => value.as_str().map_or(true, |s| re.is_match(s)),
            Check::ObjectId => value.as_str().is_some_and(ObjectId::is_valid),
            Check::Custom(predicate) => predicate(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub check: Check,
    pub message: String,
}

/// Ordered checks for one field, built fluently:
///
/// ```
/// use catalog_api::validation::FieldRule;
///
/// let rule = FieldRule::new("price")
///     .required("Price is required")
///     .number("Price must be a number")
///     .min(0.0, "Price cannot be negative");
/// assert!(rule.is_required());
/// ```
#[derive(Debug, Clone)]
pub struct FieldRule {
    field: String,
    required: Option<String>,
    nullable: bool,
    trim: bool,
    steps: Vec<Step>,
}

impl FieldRule {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            required: None,
            nullable: false,
            trim: false,
            steps: Vec::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Top-level key this rule lives under (`specifications` for `specifications.ram`).
    pub fn root_field(&self) -> &str {
        self.field.split('.').next().unwrap_or(&self.field)
    }

    pub fn is_required(&self) -> bool {
        self.required.is_some()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn trims(&self) -> bool {
        self.trim
    }

    pub fn required_message(&self) -> Option<&str> {
        self.required.as_deref()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    /// `null` is an accepted value and skips the remaining checks.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Trim surrounding whitespace from string input before validation.
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn check(mut self, check: Check, message: impl Into<String>) -> Self {
        self.steps.push(Step {
            check,
            message: message.into(),
        });
        self
    }

    pub fn string(self, message: impl Into<String>) -> Self {
        self.check(Check::String, message)
    }

    pub fn not_empty(self, message: impl Into<String>) -> Self {
        self.check(Check::NotEmpty, message)
    }

    pub fn number(self, message: impl Into<String>) -> Self {
        self.check(Check::Number, message)
    }

    pub fn integer(self, message: impl Into<String>) -> Self {
        self.check(Check::Integer, message)
    }

    pub fn boolean(self, message: impl Into<String>) -> Self {
        self.check(Check::Boolean, message)
    }

    pub fn string_array(self, message: impl Into<String>) -> Self {
        self.check(Check::StringArray, message)
    }

    pub fn string_map(self, message: impl Into<String>) -> Self {
        self.check(Check::StringMap, message)
    }

    pub fn min_length(self, min: usize, message: impl Into<String>) -> Self {
        self.check(Check::MinLength(min), message)
    }

    pub fn max_length(self, max: usize, message: impl Into<String>) -> Self {
        self.check(Check::MaxLength(max), message)
    }

    /// Inclusive lower bound.
    pub fn min(self, bound: f64, message: impl Into<String>) -> Self {
        self.check(Check::Min { bound, inclusive: true }, message)
    }

    /// Exclusive lower bound of zero.
    pub fn positive(self, message: impl Into<String>) -> Self {
        self.check(Check::Min { bound: 0.0, inclusive: false }, message)
    }

    pub fn pattern(self, regex: Regex, message: impl Into<String>) -> Self {
        self.check(Check::Pattern(regex), message)
    }

    pub fn object_id(self, message: impl Into<String>) -> Self {
        self.check(Check::ObjectId, message)
    }

    pub fn custom<F>(self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.check(Check::Custom(Arc::new(predicate)), message)
    }
}

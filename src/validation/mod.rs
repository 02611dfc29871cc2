//! Declarative request validation.
//!
//! A [`Schema`] is an ordered list of [`FieldRule`]s; each rule is an ordered list of
//! (check, message) pairs. Validation is a pure function of schema and input that
//! returns every failing field at once.

pub mod rule;
pub mod schema;

pub use rule::{Check, FieldRule, Step};
pub use schema::{FieldError, Schema, ValidationErrors, ValidationMode};

//! Schema engine
//!
//! Pure, storage-independent operations over a parsed [`SchemaNode`] tree:
//! validation (with optional coercion and defaults), sanitization, sample
//! generation, and documentation rendering. The only state is the plugin
//! registries handed over at construction.

pub mod coerce;
pub mod docs;
pub mod formats;
pub mod sample;
pub mod sanitize;
mod validate;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::plugins::Plugins;
use crate::schema::SchemaNode;

pub use docs::{DocFormat, DocNode, DocOptions};
pub use sample::SampleOptions;
pub use sanitize::SanitizeOptions;

/// Flags for a single `validate` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Fill absent properties from their `default`
    pub use_defaults: bool,
    /// Convert mismatched values to a declared kind when possible
    pub coerce_types: bool,
    /// Drop properties rejected by `additionalProperties: false` instead of reporting them
    pub remove_additional: bool,
    /// Return `SchemaError::Validation` instead of an invalid result
    pub throw_on_error: bool,
}

/// Per-call traversal state
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    path: String,
    pub options: &'a ValidationOptions,
}

impl<'a> ValidationContext<'a> {
    pub fn root(options: &'a ValidationOptions) -> Self {
        Self {
            path: String::new(),
            options,
        }
    }

    /// Dotted/bracketed path of the current value; empty at the root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn property(&self, key: &str) -> Self {
        let path = if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        };
        Self { path, options: self.options }
    }

    pub fn index(&self, index: usize) -> Self {
        Self {
            path: format!("{}[{}]", self.path, index),
            options: self.options,
        }
    }
}

/// One detected violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(flatten)]
    pub kind: ValidationErrorKind,
    pub path: String,
    pub message: String,
}

impl ValidationError {
    /// Taxonomy tag, e.g. `required` or `minLength`
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Violation taxonomy with the kind-specific details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValidationErrorKind {
    Required { missing_property: String },
    Type { expected_types: Vec<String>, actual: String },
    Enum { allowed: Vec<Value> },
    MinLength { limit: usize },
    MaxLength { limit: usize },
    Pattern { pattern: String },
    Format { format: String },
    Minimum { limit: f64, exclusive: bool },
    Maximum { limit: f64, exclusive: bool },
    MultipleOf { multiple_of: f64 },
    MinProperties { limit: usize },
    MaxProperties { limit: usize },
    AdditionalProperties { property: String },
    MinItems { limit: usize },
    MaxItems { limit: usize },
    UniqueItems { duplicate_index: usize, first_index: usize },
    AdditionalItems { limit: usize },
    AnyOf,
    OneOf { matched: usize },
    Not,
    Custom { hook: String },
}

impl ValidationErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Required { .. } => "required",
            Self::Type { .. } => "type",
            Self::Enum { .. } => "enum",
            Self::MinLength { .. } => "minLength",
            Self::MaxLength { .. } => "maxLength",
            Self::Pattern { .. } => "pattern",
            Self::Format { .. } => "format",
            Self::Minimum { .. } => "minimum",
            Self::Maximum { .. } => "maximum",
            Self::MultipleOf { .. } => "multipleOf",
            Self::MinProperties { .. } => "minProperties",
            Self::MaxProperties { .. } => "maxProperties",
            Self::AdditionalProperties { .. } => "additionalProperties",
            Self::MinItems { .. } => "minItems",
            Self::MaxItems { .. } => "maxItems",
            Self::UniqueItems { .. } => "uniqueItems",
            Self::AdditionalItems { .. } => "additionalItems",
            Self::AnyOf => "anyOf",
            Self::OneOf { .. } => "oneOf",
            Self::Not => "not",
            Self::Custom { .. } => "custom",
        }
    }
}

/// Outcome of a `validate` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    /// Input after defaults, coercion, and additional-property removal
    pub data: Value,
}

impl ValidationResult {
    /// Errors carrying the given taxonomy tag
    pub fn errors_of<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a ValidationError> + 'a {
        self.errors.iter().filter(move |e| e.code() == code)
    }

    /// The validated data, or every collected error
    pub fn into_result(self) -> Result<Value> {
        if self.valid {
            Ok(self.data)
        } else {
            Err(SchemaError::Validation { errors: self.errors })
        }
    }
}

/// Validation, sanitization, sampling, and docs over schema trees
#[derive(Debug, Clone, Default)]
pub struct SchemaEngine {
    plugins: Plugins,
}

impl SchemaEngine {
    /// An engine with the built-in formats and no custom types or hooks
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugins(plugins: Plugins) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &Plugins {
        &self.plugins
    }

    /// Validate `data` against `schema`, collecting every violation
    ///
    /// Only fails when `throw_on_error` is set and the data is invalid; the
    /// error then carries the full list computed in the same pass.
    pub fn validate(&self, data: &Value, schema: &SchemaNode, options: &ValidationOptions) -> Result<ValidationResult> {
        let ctx = ValidationContext::root(options);
        let (data, errors) = validate::Validator::new(&self.plugins).run(data.clone(), schema, &ctx);
        let result = ValidationResult {
            valid: errors.is_empty(),
            errors,
            data,
        };
        if options.throw_on_error && !result.valid {
            return Err(SchemaError::Validation { errors: result.errors });
        }
        Ok(result)
    }

    /// Parse `schema` and validate against it
    pub fn validate_json(&self, data: &Value, schema: &Value, options: &ValidationOptions) -> Result<ValidationResult> {
        let node = SchemaNode::from_value(schema)?;
        self.validate(data, &node, options)
    }

    /// Reshape a copy of `data` without rejecting anything
    pub fn sanitize(&self, data: &Value, schema: &SchemaNode, options: &SanitizeOptions) -> Value {
        sanitize::sanitize(data, schema, options)
    }

    /// A deterministic representative instance of `schema`
    pub fn generate_sample(&self, schema: &SchemaNode, options: &SampleOptions) -> Value {
        sample::Sampler::new(&self.plugins, options).sample(schema)
    }

    /// Neutral documentation tree for `schema`
    pub fn build_docs(&self, schema: &SchemaNode, options: &DocOptions) -> DocNode {
        docs::build(schema, options)
    }

    /// Rendered documentation for `schema`
    pub fn generate_docs(&self, schema: &SchemaNode, options: &DocOptions) -> String {
        docs::render(&self.build_docs(schema, options), options)
    }
}

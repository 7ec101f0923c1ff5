//! Custom type, format, and hook registries
//!
//! The registries are filled before a [`SchemaEngine`](crate::SchemaEngine) is
//! built and are read-only afterwards. Lookup is by name only.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::{formats, ValidationContext};
use crate::schema::SchemaNode;

type CheckFn = Arc<dyn Fn(&Value, &SchemaNode) -> bool + Send + Sync>;
type TypeSampleFn = Arc<dyn Fn(&SchemaNode) -> Value + Send + Sync>;
type FormatFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type FormatSampleFn = Arc<dyn Fn(usize) -> Value + Send + Sync>;
type HookFn = Arc<dyn Fn(&Value, &ValidationContext<'_>) -> Result<(), String> + Send + Sync>;

/// A type name resolved by predicate rather than by JSON shape
#[derive(Clone)]
pub struct CustomType {
    check: CheckFn,
    sample: Option<TypeSampleFn>,
}

impl CustomType {
    pub fn new(check: impl Fn(&Value, &SchemaNode) -> bool + Send + Sync + 'static) -> Self {
        Self {
            check: Arc::new(check),
            sample: None,
        }
    }

    pub fn with_sample(mut self, sample: impl Fn(&SchemaNode) -> Value + Send + Sync + 'static) -> Self {
        self.sample = Some(Arc::new(sample));
        self
    }

    pub fn check(&self, value: &Value, node: &SchemaNode) -> bool {
        (self.check)(value, node)
    }

    pub fn sample(&self, node: &SchemaNode) -> Option<Value> {
        self.sample.as_ref().map(|f| f(node))
    }
}

/// A string format validator
#[derive(Clone)]
pub struct CustomFormat {
    validate: FormatFn,
    error: String,
    sample: Option<FormatSampleFn>,
}

impl CustomFormat {
    pub fn new(validate: impl Fn(&str) -> bool + Send + Sync + 'static, error: impl Into<String>) -> Self {
        Self {
            validate: Arc::new(validate),
            error: error.into(),
            sample: None,
        }
    }

    /// A fixed sample value
    pub fn with_sample(self, sample: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.with_sample_variants(move |_| sample())
    }

    /// Sample values that differ per variant index, for arrays with `uniqueItems`
    pub fn with_sample_variants(mut self, sample: impl Fn(usize) -> Value + Send + Sync + 'static) -> Self {
        self.sample = Some(Arc::new(sample));
        self
    }

    pub fn validate(&self, value: &str) -> bool {
        (self.validate)(value)
    }

    /// Message reported when validation fails
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn sample(&self) -> Option<Value> {
        self.sample_variant(0)
    }

    pub fn sample_variant(&self, variant: usize) -> Option<Value> {
        self.sample.as_ref().map(|f| f(variant))
    }
}

/// Custom validation hook, referenced from schemas by name
#[derive(Clone)]
pub struct Hook(HookFn);

impl Hook {
    pub fn new(
        hook: impl Fn(&Value, &ValidationContext<'_>) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(hook))
    }

    pub fn call(&self, value: &Value, ctx: &ValidationContext<'_>) -> Result<(), String> {
        (self.0)(value, ctx)
    }
}

/// Name-keyed registry shared by the three plugin kinds
#[derive(Clone)]
pub struct Registry<T> {
    entries: HashMap<String, T>,
}

pub type TypeRegistry = Registry<CustomType>;
pub type FormatRegistry = Registry<CustomFormat>;
pub type HookRegistry = Registry<Hook>;

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Register an entry, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, entry: T) -> &mut Self {
        self.entries.insert(name.into(), entry);
        self
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl FormatRegistry {
    /// A format registry preloaded with the built-in formats
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        formats::register_builtins(&mut registry);
        registry
    }
}

/// Everything an engine resolves by name
#[derive(Debug, Clone)]
pub struct Plugins {
    pub types: TypeRegistry,
    pub formats: FormatRegistry,
    pub hooks: HookRegistry,
}

impl Default for Plugins {
    fn default() -> Self {
        Self {
            types: TypeRegistry::new(),
            formats: FormatRegistry::with_builtins(),
            hooks: HookRegistry::new(),
        }
    }
}

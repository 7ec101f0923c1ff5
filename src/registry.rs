//! Schema Registry
//!
//! Versioned schema storage on top of a [`StorageProvider`]. The registry owns
//! the rules the storage contract cannot express on its own:
//!
//! - exactly one default version per schema id while any version exists
//! - versions never repeat for the same id
//! - `created_at` strictly increases across the versions of an id
//!
//! Mutations of one id are serialized through a per-id lock; reads and
//! mutations of different ids run freely in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::compatibility::{CompatibilityChecker, CompatibilityReport};
use crate::engine::{SchemaEngine, ValidationOptions, ValidationResult};
use crate::error::{Result, SchemaError};
use crate::fingerprint::Fingerprint;
use crate::meta_schema;
use crate::schema::SchemaNode;
use crate::storage::{MemoryStorage, SchemaRecord, SchemaUpdate, StorageProvider};
use crate::version;

/// `$schema` injected into registered schemas that carry none
pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Registry behaviour switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOptions {
    /// Check schemas against the embedded meta-schema before storing them
    pub validate_schemas: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self { validate_schemas: true }
    }
}

/// Options for [`SchemaRegistry::register_schema`]
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Explicit version label; generated when absent
    pub version: Option<String>,
    /// Make this version the default. The first version always is.
    pub default: bool,
    pub metadata: Map<String, Value>,
}

impl RegisterOptions {
    pub fn version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Default::default()
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// Which version of a schema to fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VersionSelector {
    Exact(String),
    #[default]
    Default,
    /// Most recently created
    Latest,
}

impl VersionSelector {
    /// `None` selects the default version
    pub fn from_flags(version: Option<String>, latest: bool) -> Self {
        match (version, latest) {
            (Some(v), _) => VersionSelector::Exact(v),
            (None, true) => VersionSelector::Latest,
            (None, false) => VersionSelector::Default,
        }
    }
}

/// The main schema registry
pub struct SchemaRegistry {
    storage: Arc<dyn StorageProvider>,
    engine: SchemaEngine,
    options: RegistryOptions,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SchemaRegistry {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            storage,
            engine: SchemaEngine::new(),
            options: RegistryOptions::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// A registry over fresh [`MemoryStorage`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Use `engine` (and its plugins) for [`validate`](Self::validate)
    pub fn with_engine(mut self, engine: SchemaEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn engine(&self) -> &SchemaEngine {
        &self.engine
    }

    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }

    /// Register a new version of `namespace.name`
    pub fn register_schema(
        &self,
        namespace: &str,
        name: &str,
        schema: Value,
        options: RegisterOptions,
    ) -> Result<SchemaRecord> {
        let id = schema_id(namespace, name)?;

        if self.options.validate_schemas {
            meta_schema::check(&id, &schema)?;
        }
        SchemaNode::from_value(&schema).map_err(|e| attribute(e, &id))?;

        let version = match options.version {
            Some(version) => {
                version::validate_label(&version)?;
                version
            }
            None => version::generate(),
        };

        let lock = self.id_lock(&id)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let siblings = self.storage.get_schema_versions(&id)?;
        if siblings.iter().any(|r| r.version == version) {
            return Err(SchemaError::VersionConflict { id, version });
        }

        let schema = normalize(schema, &id, &version);
        let fingerprint = Fingerprint::of_schema(&schema);
        let first = siblings.is_empty();
        let is_default = first || options.default;

        let mut created_at = Utc::now();
        if let Some(newest) = siblings.iter().map(|r| r.created_at).max() {
            if created_at <= newest {
                created_at = newest + Duration::milliseconds(1);
            }
        }

        let record = SchemaRecord {
            id: id.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            version,
            schema,
            fingerprint,
            created_at,
            is_default,
            metadata: options.metadata,
        };
        self.storage.save_schema(&record)?;

        if is_default && !first {
            self.demote_except(&siblings, &record.version)?;
        }

        info!(
            id = %record.id,
            version = %record.version,
            fingerprint = %record.fingerprint,
            is_default = record.is_default,
            "Registered schema"
        );
        Ok(record)
    }

    /// Fetch one version of a schema
    pub fn get_schema(&self, namespace: &str, name: &str, selector: &VersionSelector) -> Result<SchemaRecord> {
        let id = schema_id(namespace, name)?;
        self.select(&id, selector)
    }

    /// All versions, oldest first
    pub fn list_versions(&self, namespace: &str, name: &str) -> Result<Vec<SchemaRecord>> {
        let id = schema_id(namespace, name)?;
        let mut versions = self.storage.get_schema_versions(&id)?;
        if versions.is_empty() {
            return Err(SchemaError::SchemaNotFound { id });
        }
        sort_by_creation(&mut versions);
        Ok(versions)
    }

    /// One record per schema in `namespace`, the default version where flagged
    pub fn list_namespace_schemas(&self, namespace: &str) -> Result<Vec<SchemaRecord>> {
        check_identifier("namespace", namespace)?;
        self.storage.get_namespace_schemas(namespace)
    }

    pub fn list_namespaces(&self) -> Result<Vec<String>> {
        self.storage.get_namespaces()
    }

    /// Make `version` the only default version of the schema
    pub fn set_default_version(&self, namespace: &str, name: &str, version: &str) -> Result<SchemaRecord> {
        let id = schema_id(namespace, name)?;
        let lock = self.id_lock(&id)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let versions = self.storage.get_schema_versions(&id)?;
        let target = find_version(&id, &versions, version)?;

        let promoted = if target.is_default {
            target.clone()
        } else {
            self.storage
                .update_schema(&id, version, &SchemaUpdate::default_flag(true))?
                .ok_or_else(|| version_not_found(&id, version))?
        };
        self.demote_except(&versions, version)?;

        info!(id = %id, version = %version, "Default version set");
        Ok(promoted)
    }

    /// Delete one version, promoting the newest remaining sibling if it was the default
    pub fn delete_schema_version(&self, namespace: &str, name: &str, version: &str) -> Result<()> {
        let id = schema_id(namespace, name)?;
        let lock = self.id_lock(&id)?;
        let emptied = {
            let _guard = lock.lock().map_err(poisoned)?;
            self.delete_version_locked(&id, version)?
        };
        if emptied {
            self.release_id_lock(&id, lock)?;
        }
        Ok(())
    }

    /// Returns whether the schema has no versions left
    fn delete_version_locked(&self, id: &str, version: &str) -> Result<bool> {
        let versions = self.storage.get_schema_versions(id)?;
        let target = find_version(id, &versions, version)?;
        let was_default = target.is_default;

        if !self.storage.delete_schema(id, version)? {
            return Err(version_not_found(id, version));
        }
        info!(id = %id, version = %version, "Deleted schema version");

        let mut remaining: Vec<SchemaRecord> = versions.into_iter().filter(|r| r.version != version).collect();
        if was_default || !remaining.iter().any(|r| r.is_default) {
            sort_by_creation(&mut remaining);
            if let Some(newest) = remaining.last() {
                self.storage
                    .update_schema(id, &newest.version, &SchemaUpdate::default_flag(true))?;
                info!(id = %id, version = %newest.version, "Promoted default version");
            }
        }
        Ok(remaining.is_empty())
    }

    /// Delete every version of a schema
    pub fn delete_schema(&self, namespace: &str, name: &str) -> Result<()> {
        let id = schema_id(namespace, name)?;
        let lock = self.id_lock(&id)?;
        let deleted = {
            let _guard = lock.lock().map_err(poisoned)?;
            self.storage.delete_all_schema_versions(&id)?
        };
        self.release_id_lock(&id, lock)?;

        if !deleted {
            return Err(SchemaError::SchemaNotFound { id });
        }
        info!(id = %id, "Deleted schema");
        Ok(())
    }

    /// Replace the metadata stored with one version
    pub fn update_metadata(
        &self,
        namespace: &str,
        name: &str,
        version: &str,
        metadata: Map<String, Value>,
    ) -> Result<SchemaRecord> {
        let id = schema_id(namespace, name)?;
        let lock = self.id_lock(&id)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let update = SchemaUpdate {
            is_default: None,
            metadata: Some(metadata),
        };
        match self.storage.update_schema(&id, version, &update)? {
            Some(record) => Ok(record),
            None => Err(self.missing(&id, version)?),
        }
    }

    /// Diff two stored versions, `elder` first
    pub fn compare_schema_versions(
        &self,
        namespace: &str,
        name: &str,
        elder: &str,
        newer: &str,
    ) -> Result<CompatibilityReport> {
        let id = schema_id(namespace, name)?;
        let elder = self.select(&id, &VersionSelector::Exact(elder.to_string()))?;
        let newer = self.select(&id, &VersionSelector::Exact(newer.to_string()))?;
        Ok(CompatibilityChecker::new().compare(&elder.schema, &newer.schema))
    }

    /// Whether `candidate` can replace the current default version
    ///
    /// A schema with no stored version is trivially compatible.
    pub fn check_compatibility(&self, namespace: &str, name: &str, candidate: &Value) -> Result<CompatibilityReport> {
        let id = schema_id(namespace, name)?;
        match self.current_default(&id)? {
            Some(current) => Ok(CompatibilityChecker::new().compare(&current.schema, candidate)),
            None => Ok(CompatibilityReport::initial()),
        }
    }

    /// Semantic version to give `candidate`, when the default version is semver
    pub fn suggest_next_version(&self, namespace: &str, name: &str, candidate: &Value) -> Result<Option<String>> {
        let id = schema_id(namespace, name)?;
        let Some(current) = self.current_default(&id)? else {
            return Ok(None);
        };
        let report = CompatibilityChecker::new().compare(&current.schema, candidate);
        Ok(version::suggest_next(&current.version, &report))
    }

    /// Validate `data` against a stored version
    pub fn validate(
        &self,
        namespace: &str,
        name: &str,
        selector: &VersionSelector,
        data: &Value,
        options: &ValidationOptions,
    ) -> Result<ValidationResult> {
        let record = self.get_schema(namespace, name, selector)?;
        let node = SchemaNode::from_value(&record.schema).map_err(|e| attribute(e, &record.id))?;
        self.engine.validate(data, &node, options)
    }

    fn select(&self, id: &str, selector: &VersionSelector) -> Result<SchemaRecord> {
        debug!(id = %id, selector = ?selector, "Selecting schema version");
        match selector {
            VersionSelector::Exact(version) => match self.storage.get_schema(id, version)? {
                Some(record) => Ok(record),
                None => Err(self.missing(id, version)?),
            },
            VersionSelector::Default => self
                .current_default(id)?
                .ok_or_else(|| SchemaError::SchemaNotFound { id: id.to_string() }),
            VersionSelector::Latest => {
                let mut versions = self.storage.get_schema_versions(id)?;
                sort_by_creation(&mut versions);
                versions
                    .pop()
                    .ok_or_else(|| SchemaError::SchemaNotFound { id: id.to_string() })
            }
        }
    }

    fn current_default(&self, id: &str) -> Result<Option<SchemaRecord>> {
        let mut versions = self.storage.get_schema_versions(id)?;
        if let Some(index) = versions.iter().position(|r| r.is_default) {
            return Ok(Some(versions.swap_remove(index)));
        }
        sort_by_creation(&mut versions);
        let fallback = versions.pop();
        if let Some(record) = &fallback {
            warn!(id = %id, version = %record.version, "No default version flagged, using latest");
        }
        Ok(fallback)
    }

    /// The error for a missing `(id, version)`: unknown schema or unknown version
    fn missing(&self, id: &str, version: &str) -> Result<SchemaError> {
        if self.storage.get_schema_versions(id)?.is_empty() {
            Ok(SchemaError::SchemaNotFound { id: id.to_string() })
        } else {
            Ok(version_not_found(id, version))
        }
    }

    fn demote_except(&self, versions: &[SchemaRecord], keep: &str) -> Result<()> {
        for record in versions.iter().filter(|r| r.is_default && r.version != keep) {
            self.storage
                .update_schema(&record.id, &record.version, &SchemaUpdate::default_flag(false))?;
            debug!(id = %record.id, version = %record.version, "Demoted default version");
        }
        Ok(())
    }

    fn id_lock(&self, id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(poisoned)?;
        Ok(locks.entry(id.to_string()).or_default().clone())
    }

    /// Forget the lock of a removed schema unless another caller still holds it
    fn release_id_lock(&self, id: &str, lock: Arc<Mutex<()>>) -> Result<()> {
        let mut locks = self.locks.lock().map_err(poisoned)?;
        // Clones are only taken under `locks`, so the count cannot grow here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
        Ok(())
    }
}

/// `namespace.name`, after checking both parts
pub fn schema_id(namespace: &str, name: &str) -> Result<String> {
    check_identifier("namespace", namespace)?;
    check_identifier("name", name)?;
    if name.contains('.') {
        return Err(SchemaError::InvalidIdentifier(format!("name '{name}' may not contain '.'")));
    }
    if namespace.ends_with('.') {
        return Err(SchemaError::InvalidIdentifier(format!("namespace '{namespace}' may not end with '.'")));
    }
    Ok(format!("{namespace}.{name}"))
}

fn check_identifier(kind: &str, value: &str) -> Result<()> {
    version::validate_label(value).map_err(|_| {
        SchemaError::InvalidIdentifier(format!(
            "{kind} '{value}' must be non-empty, may not start with '.' or contain path separators or whitespace"
        ))
    })
}

/// Inject `$id` and `$schema` when the author left them out
fn normalize(mut schema: Value, id: &str, version: &str) -> Value {
    if let Value::Object(map) = &mut schema {
        map.entry("$id")
            .or_insert_with(|| Value::String(format!("urn:schemata:{id}:{version}")));
        map.entry("$schema")
            .or_insert_with(|| Value::String(DRAFT_07.to_string()));
    }
    schema
}

/// Re-key parser errors, which name a JSON pointer, onto the schema id
fn attribute(error: SchemaError, id: &str) -> SchemaError {
    match error {
        SchemaError::InvalidSchema { id: pointer, reasons } => SchemaError::InvalidSchema {
            id: id.to_string(),
            reasons: reasons.into_iter().map(|r| format!("{pointer}: {r}")).collect(),
        },
        other => other,
    }
}

fn find_version<'a>(id: &str, versions: &'a [SchemaRecord], version: &str) -> Result<&'a SchemaRecord> {
    if versions.is_empty() {
        return Err(SchemaError::SchemaNotFound { id: id.to_string() });
    }
    versions
        .iter()
        .find(|r| r.version == version)
        .ok_or_else(|| version_not_found(id, version))
}

fn version_not_found(id: &str, version: &str) -> SchemaError {
    SchemaError::VersionNotFound {
        id: id.to_string(),
        version: version.to_string(),
    }
}

fn sort_by_creation(versions: &mut [SchemaRecord]) {
    versions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.version.cmp(&b.version)));
}

fn poisoned<T>(_: T) -> SchemaError {
    SchemaError::Storage("registry lock poisoned".to_string())
}

//! Storage providers for schema records
//!
//! The registry only relies on the [`StorageProvider`] contract. Every call is
//! atomic for a single record; multi-record consistency (the default flag) is
//! the registry's job.
//!
//! ## File layout
//!
//! ```text
//! <root>/
//! ├── billing/
//! │   └── invoice/
//! │       ├── 1.0.0.json
//! │       └── 1.1.0.json
//! └── users/
//!     └── profile/
//!         └── 20240101120000000-0a1b2c.json
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};
use crate::fingerprint::Fingerprint;

/// A registered, addressable schema version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRecord {
    /// `namespace.name`
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    /// Normalized schema document, including `$id` and `$schema`
    pub schema: Value,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
    pub is_default: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Partial update applied by [`StorageProvider::update_schema`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaUpdate {
    pub is_default: Option<bool>,
    /// Replaces the stored metadata wholesale
    pub metadata: Option<Map<String, Value>>,
}

impl SchemaUpdate {
    pub fn default_flag(is_default: bool) -> Self {
        Self {
            is_default: Some(is_default),
            metadata: None,
        }
    }

    fn apply(&self, record: &mut SchemaRecord) {
        if let Some(is_default) = self.is_default {
            record.is_default = is_default;
        }
        if let Some(metadata) = &self.metadata {
            record.metadata = metadata.clone();
        }
    }
}

/// Backing store for schema records
pub trait StorageProvider: Send + Sync {
    /// Insert or replace the record at `(id, version)`
    fn save_schema(&self, record: &SchemaRecord) -> Result<()>;

    fn get_schema(&self, id: &str, version: &str) -> Result<Option<SchemaRecord>>;

    /// All versions of `id`, in no particular order
    fn get_schema_versions(&self, id: &str) -> Result<Vec<SchemaRecord>>;

    /// One record per schema id in `namespace`, preferring its default version
    fn get_namespace_schemas(&self, namespace: &str) -> Result<Vec<SchemaRecord>>;

    fn get_namespaces(&self) -> Result<Vec<String>>;

    /// Returns the updated record, or `None` when it does not exist
    fn update_schema(&self, id: &str, version: &str, update: &SchemaUpdate) -> Result<Option<SchemaRecord>>;

    /// Returns whether a record was removed
    fn delete_schema(&self, id: &str, version: &str) -> Result<bool>;

    /// Returns whether any record was removed
    fn delete_all_schema_versions(&self, id: &str) -> Result<bool>;
}

/// Pick one record per id, the default when flagged, else the newest
fn representatives(records: impl IntoIterator<Item = SchemaRecord>) -> Vec<SchemaRecord> {
    let mut by_id: BTreeMap<String, SchemaRecord> = BTreeMap::new();
    for record in records {
        match by_id.get(&record.id) {
            Some(current) if current.is_default => {}
            Some(current) if !record.is_default && current.created_at >= record.created_at => {}
            _ => {
                by_id.insert(record.id.clone(), record);
            }
        }
    }
    by_id.into_values().collect()
}

fn poisoned<T>(_: T) -> SchemaError {
    SchemaError::Storage("storage lock poisoned".to_string())
}

type Versions = BTreeMap<String, SchemaRecord>;

/// In-process storage, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<BTreeMap<String, Versions>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageProvider for MemoryStorage {
    fn save_schema(&self, record: &SchemaRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records
            .entry(record.id.clone())
            .or_default()
            .insert(record.version.clone(), record.clone());
        Ok(())
    }

    fn get_schema(&self, id: &str, version: &str) -> Result<Option<SchemaRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(id).and_then(|v| v.get(version)).cloned())
    }

    fn get_schema_versions(&self, id: &str) -> Result<Vec<SchemaRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(id).map(|v| v.values().cloned().collect()).unwrap_or_default())
    }

    fn get_namespace_schemas(&self, namespace: &str) -> Result<Vec<SchemaRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(representatives(
            records
                .values()
                .flat_map(|v| v.values())
                .filter(|r| r.namespace == namespace)
                .cloned(),
        ))
    }

    fn get_namespaces(&self) -> Result<Vec<String>> {
        let records = self.records.read().map_err(poisoned)?;
        let namespaces: BTreeSet<String> = records
            .values()
            .flat_map(|v| v.values())
            .map(|r| r.namespace.clone())
            .collect();
        Ok(namespaces.into_iter().collect())
    }

    fn update_schema(&self, id: &str, version: &str, update: &SchemaUpdate) -> Result<Option<SchemaRecord>> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.get_mut(id).and_then(|v| v.get_mut(version)).map(|record| {
            update.apply(record);
            record.clone()
        }))
    }

    fn delete_schema(&self, id: &str, version: &str) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        let Some(versions) = records.get_mut(id) else {
            return Ok(false);
        };
        let removed = versions.remove(version).is_some();
        if versions.is_empty() {
            records.remove(id);
        }
        Ok(removed)
    }

    fn delete_all_schema_versions(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.remove(id).is_some_and(|v| !v.is_empty()))
    }
}

/// JSON files under `<root>/<namespace>/<name>/<version>.json`
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open a store rooted at `path`, creating the directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn schema_dir(&self, id: &str) -> Result<PathBuf> {
        let (namespace, name) = id
            .rsplit_once('.')
            .ok_or_else(|| SchemaError::InvalidIdentifier(format!("schema id '{id}' has no namespace")))?;
        Ok(self.root.join(namespace).join(name))
    }

    fn record_path(&self, id: &str, version: &str) -> Result<PathBuf> {
        Ok(self.schema_dir(id)?.join(format!("{version}.json")))
    }

    fn read_record(path: &Path) -> Result<Option<SchemaRecord>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file, then rename over the target
    fn write_record(path: &Path, record: &SchemaRecord) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(record)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_dir_records(dir: &Path) -> Result<Vec<SchemaRecord>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(record) = Self::read_record(&path)? {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut dirs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Drop empty schema and namespace directories left by deletions
    fn prune(&self, id: &str) -> Result<()> {
        let dir = self.schema_dir(id)?;
        for dir in [dir.as_path(), dir.parent().unwrap_or(&self.root)] {
            if dir == self.root.as_path() {
                break;
            }
            let empty = match fs::read_dir(dir) {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => false,
            };
            if empty {
                fs::remove_dir(dir)?;
            }
        }
        Ok(())
    }
}

impl StorageProvider for FsStorage {
    fn save_schema(&self, record: &SchemaRecord) -> Result<()> {
        Self::write_record(&self.record_path(&record.id, &record.version)?, record)
    }

    fn get_schema(&self, id: &str, version: &str) -> Result<Option<SchemaRecord>> {
        Self::read_record(&self.record_path(id, version)?)
    }

    fn get_schema_versions(&self, id: &str) -> Result<Vec<SchemaRecord>> {
        Self::read_dir_records(&self.schema_dir(id)?)
    }

    fn get_namespace_schemas(&self, namespace: &str) -> Result<Vec<SchemaRecord>> {
        let mut records = Vec::new();
        for dir in Self::subdirs(&self.root.join(namespace))? {
            records.extend(Self::read_dir_records(&dir)?);
        }
        Ok(representatives(records))
    }

    fn get_namespaces(&self) -> Result<Vec<String>> {
        Ok(Self::subdirs(&self.root)?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect())
    }

    fn update_schema(&self, id: &str, version: &str, update: &SchemaUpdate) -> Result<Option<SchemaRecord>> {
        let path = self.record_path(id, version)?;
        let Some(mut record) = Self::read_record(&path)? else {
            return Ok(None);
        };
        update.apply(&mut record);
        Self::write_record(&path, &record)?;
        Ok(Some(record))
    }

    fn delete_schema(&self, id: &str, version: &str) -> Result<bool> {
        match fs::remove_file(self.record_path(id, version)?) {
            Ok(()) => {
                self.prune(id)?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_all_schema_versions(&self, id: &str) -> Result<bool> {
        let dir = self.schema_dir(id)?;
        if !dir.is_dir() {
            return Ok(false);
        }
        let had_records = !Self::read_dir_records(&dir)?.is_empty();
        fs::remove_dir_all(&dir)?;
        self.prune(id)?;
        Ok(had_records)
    }
}

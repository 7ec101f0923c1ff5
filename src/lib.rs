//! Schemata
//!
//! A schema validation engine paired with a versioned schema registry.
//!
//! ## Features
//!
//! - **Validation**: every violation in one pass, with optional coercion,
//!   defaults, and removal of undeclared properties
//! - **Sanitization**: non-validating cleanup of a copy of the data
//! - **Samples and docs**: deterministic instances and Markdown/text docs
//! - **Plugins**: custom types, formats, and named validation hooks
//! - **Registry**: versions, a single default version per schema, content
//!   fingerprints, and backward-compatibility reports
//!
//! ## Architecture
//!
//! ```text
//! SchemaRegistry ──► StorageProvider (MemoryStorage | FsStorage)
//!       │
//!       ├──► meta_schema   (authoring check)
//!       ├──► compatibility (version diffs)
//!       └──► SchemaEngine ──► Plugins (types, formats, hooks)
//!                 │
//!                 └── validate / sanitize / sample / docs over SchemaNode
//! ```
//!
//! ## Example
//!
//! ```
//! use schemata::{RegisterOptions, SchemaRegistry, ValidationOptions, VersionSelector};
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::in_memory();
//! registry
//!     .register_schema(
//!         "users",
//!         "profile",
//!         json!({ "type": "object", "required": ["name"], "properties": { "name": { "type": "string" } } }),
//!         RegisterOptions::version("1.0.0"),
//!     )
//!     .unwrap();
//!
//! let result = registry
//!     .validate("users", "profile", &VersionSelector::Default, &json!({}), &ValidationOptions::default())
//!     .unwrap();
//! assert!(!result.valid);
//! assert_eq!(result.errors[0].path, "name");
//! ```

pub mod compatibility;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod meta_schema;
pub mod plugins;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod version;

pub use compatibility::{ChangeKind, CompatibilityChecker, CompatibilityReport, SchemaChange};
pub use config::SchemaConfig;
pub use engine::{
    DocFormat, DocOptions, SampleOptions, SanitizeOptions, SchemaEngine, ValidationError, ValidationErrorKind,
    ValidationOptions, ValidationResult,
};
pub use error::{Result, SchemaError};
pub use fingerprint::Fingerprint;
pub use plugins::{CustomFormat, CustomType, Hook, Plugins};
pub use registry::{RegisterOptions, RegistryOptions, SchemaRegistry, VersionSelector};
pub use schema::{Kind, SchemaNode};
pub use storage::{FsStorage, MemoryStorage, SchemaRecord, SchemaUpdate, StorageProvider};

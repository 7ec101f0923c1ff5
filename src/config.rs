//! Configuration management for the schema registry and engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schemas.toml)
//! - Environment variables (SCHEMAS__*)
//!
//! ## Example config file (schemas.toml):
//! ```toml
//! [registry]
//! path = "./schemas"
//! validate_schemas = true
//!
//! [validation]
//! use_defaults = true
//! coerce_types = false
//! remove_additional = false
//! throw_on_error = false
//!
//! [sanitize]
//! apply_defaults = true
//! trim_strings = true
//! strip_html = true
//! remove_additional = false
//!
//! [docs]
//! format = "markdown"
//! include_examples = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::{DocFormat, DocOptions, SanitizeOptions, ValidationOptions};
use crate::registry::RegistryOptions;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Default flags for `validate`
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Default flags for `sanitize`
    #[serde(default)]
    pub sanitize: SanitizeConfig,

    /// Documentation output
    #[serde(default)]
    pub docs: DocsConfig,
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Root directory of the file storage
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,

    /// Check schemas against the meta-schema on registration
    #[serde(default = "default_true")]
    pub validate_schemas: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub use_defaults: bool,
    #[serde(default)]
    pub coerce_types: bool,
    #[serde(default)]
    pub remove_additional: bool,
    #[serde(default)]
    pub throw_on_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizeConfig {
    #[serde(default = "default_true")]
    pub apply_defaults: bool,
    #[serde(default = "default_true")]
    pub trim_strings: bool,
    #[serde(default = "default_true")]
    pub strip_html: bool,
    #[serde(default)]
    pub remove_additional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocsConfig {
    #[serde(default)]
    pub format: DocFormat,
    #[serde(default)]
    pub include_examples: bool,
}

// Default value functions
fn default_registry_path() -> PathBuf {
    PathBuf::from("./schemas")
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            validate_schemas: true,
        }
    }
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            apply_defaults: true,
            trim_strings: true,
            strip_html: true,
            remove_additional: false,
        }
    }
}

impl From<&RegistryConfig> for RegistryOptions {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            validate_schemas: config.validate_schemas,
        }
    }
}

impl From<&ValidationConfig> for ValidationOptions {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            use_defaults: config.use_defaults,
            coerce_types: config.coerce_types,
            remove_additional: config.remove_additional,
            throw_on_error: config.throw_on_error,
        }
    }
}

impl From<&SanitizeConfig> for SanitizeOptions {
    fn from(config: &SanitizeConfig) -> Self {
        Self {
            apply_defaults: config.apply_defaults,
            trim_strings: config.trim_strings,
            strip_html: config.strip_html,
            remove_additional: config.remove_additional,
        }
    }
}

impl From<&DocsConfig> for DocOptions {
    fn from(config: &DocsConfig) -> Self {
        Self {
            title: None,
            format: config.format,
            include_examples: config.include_examples,
        }
    }
}

impl SchemaConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["schemas.toml", ".schemas.toml", "config/schemas.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schemata", "schemata") {
            let xdg_config = config_dir.config_dir().join("schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (SCHEMAS__*)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMAS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the registry path (resolves relative paths)
    pub fn registry_path(&self) -> PathBuf {
        if self.registry.path.is_absolute() {
            self.registry.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.registry.path)
        }
    }

    pub fn registry_options(&self) -> RegistryOptions {
        (&self.registry).into()
    }

    pub fn validation_options(&self) -> ValidationOptions {
        (&self.validation).into()
    }

    pub fn sanitize_options(&self) -> SanitizeOptions {
        (&self.sanitize).into()
    }

    pub fn doc_options(&self) -> DocOptions {
        (&self.docs).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert!(config.registry.validate_schemas);
        assert_eq!(config.registry.path, PathBuf::from("./schemas"));
        assert_eq!(config.validation_options(), ValidationOptions::default());
        assert_eq!(config.sanitize_options(), SanitizeOptions::default());
        assert_eq!(config.doc_options(), DocOptions::default());
    }

    #[test]
    fn test_serialize_config() {
        let config = SchemaConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[sanitize]"));
        assert!(toml_str.contains("format = \"markdown\""));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: SchemaConfig = toml::from_str(
            r#"
            [validation]
            coerce_types = true

            [docs]
            format = "text"
            "#,
        )
        .unwrap();

        assert!(config.validation.coerce_types);
        assert!(!config.validation.use_defaults);
        assert!(config.sanitize.trim_strings);
        assert_eq!(config.docs.format, DocFormat::Text);
        assert!(config.registry.validate_schemas);
    }

    #[test]
    fn test_save_and_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let path = path.to_str().unwrap();

        let mut config = SchemaConfig::default();
        config.registry.path = PathBuf::from("/srv/schemas");
        config.sanitize.remove_additional = true;
        config.save(path).unwrap();

        let loaded = SchemaConfig::load_from(Some(path)).unwrap();
        assert_eq!(loaded.registry.path, PathBuf::from("/srv/schemas"));
        assert!(loaded.sanitize.remove_additional);
        assert_eq!(loaded.registry_path(), PathBuf::from("/srv/schemas"));
    }
}

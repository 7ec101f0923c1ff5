//! Schema Registry CLI
//!
//! Commands for managing a file-backed schema registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use schemata::{
    CompatibilityReport, FsStorage, RegisterOptions, SchemaConfig, SchemaRecord, SchemaRegistry, VersionSelector,
};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-registry")]
#[command(about = "Versioned schema registry")]
struct Cli {
    /// Path to schema registry (defaults to the configured path)
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Config file to load
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new schema version from a JSON file
    Register {
        namespace: String,
        name: String,
        /// Schema file
        file: PathBuf,
        /// Version label (generated when omitted)
        #[arg(short, long)]
        version: Option<String>,
        /// Make this version the default
        #[arg(long)]
        default: bool,
        /// Metadata entries as key=value
        #[arg(short, long = "meta")]
        metadata: Vec<String>,
    },

    /// Print a schema version
    Get {
        namespace: String,
        name: String,
        /// Version (defaults to the default version)
        #[arg(short, long)]
        version: Option<String>,
        /// Fetch the most recently created version
        #[arg(long, conflicts_with = "version")]
        latest: bool,
        /// Print the full record instead of the schema
        #[arg(long)]
        record: bool,
    },

    /// List the versions of a schema
    Versions { namespace: String, name: String },

    /// List namespaces
    Namespaces,

    /// List the schemas of a namespace
    List { namespace: String },

    /// Make a version the default
    SetDefault {
        namespace: String,
        name: String,
        version: String,
    },

    /// Delete one version, or the whole schema
    Delete {
        namespace: String,
        name: String,
        #[arg(short, long)]
        version: Option<String>,
    },

    /// Compare two stored versions
    Compare {
        namespace: String,
        name: String,
        /// Elder version
        from: String,
        /// Newer version
        to: String,
    },

    /// Check a candidate schema file against the default version
    Check {
        namespace: String,
        name: String,
        file: PathBuf,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = SchemaConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let root = cli.registry.unwrap_or_else(|| config.registry_path());
    let storage = FsStorage::open(&root).with_context(|| format!("opening registry at {:?}", root))?;
    let registry = SchemaRegistry::new(Arc::new(storage)).with_options(config.registry_options());

    match cli.command {
        Commands::Register {
            namespace,
            name,
            file,
            version,
            default,
            metadata,
        } => {
            let schema = read_json(&file)?;
            let options = RegisterOptions {
                version,
                default,
                metadata: parse_metadata(&metadata)?,
            };
            let record = registry.register_schema(&namespace, &name, schema, options)?;
            println!("✅ Registered {} version {}", record.id, record.version);
            println!("   Fingerprint: {}", record.fingerprint);
            if record.is_default {
                println!("   Default version");
            }
        }

        Commands::Get {
            namespace,
            name,
            version,
            latest,
            record,
        } => {
            let selector = VersionSelector::from_flags(version, latest);
            let found = registry.get_schema(&namespace, &name, &selector)?;
            if record {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&found.schema)?);
            }
        }

        Commands::Versions { namespace, name } => {
            let versions = registry.list_versions(&namespace, &name)?;
            println!("📚 Versions of {}.{}:", namespace, name);
            for record in &versions {
                print_record_line(record);
            }
        }

        Commands::Namespaces => {
            let namespaces = registry.list_namespaces()?;
            if namespaces.is_empty() {
                println!("No schemas registered yet.");
            }
            for namespace in namespaces {
                println!("  {}", namespace);
            }
        }

        Commands::List { namespace } => {
            let schemas = registry.list_namespace_schemas(&namespace)?;
            if schemas.is_empty() {
                println!("No schemas in namespace {}.", namespace);
            } else {
                println!("📚 Schemas in {}:", namespace);
                for record in &schemas {
                    println!("  {} ({})", record.name, record.version);
                }
            }
        }

        Commands::SetDefault {
            namespace,
            name,
            version,
        } => {
            let record = registry.set_default_version(&namespace, &name, &version)?;
            println!("✅ {} default version is now {}", record.id, record.version);
        }

        Commands::Delete {
            namespace,
            name,
            version,
        } => match version {
            Some(version) => {
                registry.delete_schema_version(&namespace, &name, &version)?;
                println!("🗑  Deleted {}.{} version {}", namespace, name, version);
            }
            None => {
                registry.delete_schema(&namespace, &name)?;
                println!("🗑  Deleted {}.{}", namespace, name);
            }
        },

        Commands::Compare {
            namespace,
            name,
            from,
            to,
        } => {
            println!("🔍 Comparing {}.{}: {} -> {}", namespace, name, from, to);
            let report = registry.compare_schema_versions(&namespace, &name, &from, &to)?;
            print_report(&report);
            if !report.compatible {
                std::process::exit(1);
            }
        }

        Commands::Check { namespace, name, file } => {
            let candidate = read_json(&file)?;
            let report = registry.check_compatibility(&namespace, &name, &candidate)?;
            print_report(&report);
            if let Some(next) = registry.suggest_next_version(&namespace, &name, &candidate)? {
                println!("\nSuggested version: {}", next);
            }
            if !report.compatible {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {:?}", path))
}

fn parse_metadata(entries: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut metadata = Map::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("metadata entry '{}' is not key=value", entry);
        };
        // Values that parse as JSON keep their type
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        metadata.insert(key.to_string(), value);
    }
    Ok(metadata)
}

fn print_record_line(record: &SchemaRecord) {
    let marker = if record.is_default { " (default)" } else { "" };
    println!(
        "  {} {} {}{}",
        record.version,
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        &record.fingerprint.as_str()[..12],
        marker
    );
}

fn print_report(report: &CompatibilityReport) {
    if report.compatible {
        println!("✅ Compatible: {}", report.summary());
    } else {
        println!("❌ Incompatible: {}", report.summary());
    }
    for change in &report.changes {
        let marker = if change.breaking { "⚠️ " } else { "  " };
        println!("  {} [{:?}] {}: {}", marker, change.kind, change.path, change.description);
        if let Some(diff) = &change.diff {
            for line in diff.lines() {
                println!("        {}", line);
            }
        }
    }
}

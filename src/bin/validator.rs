//! Schema Validator CLI
//!
//! Validates, sanitizes, samples, and documents data against schema files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use schemata::{DocFormat, SampleOptions, SchemaConfig, SchemaEngine, SchemaNode};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-validator")]
#[command(about = "Validate and transform data with a schema")]
struct Cli {
    /// Config file to load
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a data file, reporting every violation
    Validate {
        /// Schema file
        schema: PathBuf,
        /// Data file
        data: PathBuf,
        /// Convert mismatched values where possible
        #[arg(long)]
        coerce: bool,
        /// Fill absent properties from defaults
        #[arg(long)]
        use_defaults: bool,
        /// Drop undeclared properties instead of reporting them
        #[arg(long)]
        remove_additional: bool,
        /// Print the validated data on success
        #[arg(long)]
        print: bool,
    },

    /// Print a cleaned copy of a data file
    Sanitize {
        schema: PathBuf,
        data: PathBuf,
        /// Drop undeclared properties
        #[arg(long)]
        remove_additional: bool,
    },

    /// Print a representative instance of a schema
    Sample {
        schema: PathBuf,
        /// Only emit required properties
        #[arg(long)]
        required_only: bool,
        /// Ignore `example` and `default` values
        #[arg(long)]
        synthesize: bool,
    },

    /// Render schema documentation
    Docs {
        schema: PathBuf,
        /// Output format (defaults to the configured one)
        #[arg(short, long, value_enum)]
        format: Option<Format>,
        /// Root heading
        #[arg(short, long)]
        title: Option<String>,
        /// Include examples
        #[arg(long)]
        examples: bool,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Text,
}

impl From<Format> for DocFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Markdown => DocFormat::Markdown,
            Format::Text => DocFormat::Text,
        }
    }
}

fn main() {
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
    let engine = SchemaEngine::new();

    match cli.command {
        Commands::Validate {
            schema,
            data,
            coerce,
            use_defaults,
            remove_additional,
            print,
        } => {
            let node = read_schema(&schema)?;
            let data = read_json(&data)?;
            let mut options = config.validation_options();
            options.coerce_types |= coerce;
            options.use_defaults |= use_defaults;
            options.remove_additional |= remove_additional;
            // Errors are listed below rather than raised
            options.throw_on_error = false;

            let result = engine.validate(&data, &node, &options)?;
            if result.valid {
                println!("✅ Valid");
                if print {
                    println!("{}", serde_json::to_string_pretty(&result.data)?);
                }
            } else {
                println!("❌ {} error(s)", result.errors.len());
                for error in &result.errors {
                    let path = if error.path.is_empty() { "<root>" } else { &error.path };
                    println!("  [{}] {}: {}", error.code(), path, error.message);
                }
                std::process::exit(1);
            }
        }

        Commands::Sanitize {
            schema,
            data,
            remove_additional,
        } => {
            let node = read_schema(&schema)?;
            let data = read_json(&data)?;
            let mut options = config.sanitize_options();
            options.remove_additional |= remove_additional;
            println!("{}", serde_json::to_string_pretty(&engine.sanitize(&data, &node, &options))?);
        }

        Commands::Sample {
            schema,
            required_only,
            synthesize,
        } => {
            let node = read_schema(&schema)?;
            let options = SampleOptions {
                use_examples: !synthesize,
                use_defaults: !synthesize,
                required_only,
            };
            println!("{}", serde_json::to_string_pretty(&engine.generate_sample(&node, &options))?);
        }

        Commands::Docs {
            schema,
            format,
            title,
            examples,
            output,
        } => {
            let node = read_schema(&schema)?;
            let mut options = config.doc_options();
            if let Some(format) = format {
                options.format = format.into();
            }
            options.title = title;
            options.include_examples |= examples;

            let rendered = engine.generate_docs(&node, &options);
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered).with_context(|| format!("writing {:?}", path))?;
                    println!("📝 Wrote {:?}", path);
                }
                None => print!("{}", rendered),
            }
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {:?}", path))
}

fn read_schema(path: &Path) -> anyhow::Result<SchemaNode> {
    let value = read_json(path)?;
    SchemaNode::from_value(&value).with_context(|| format!("loading schema {:?}", path))
}

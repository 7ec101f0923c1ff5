//! Schema Config CLI
//!
//! View and manage schema registry configuration.

use clap::{Parser, Subcommand};
use schemata::SchemaConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-config")]
#[command(about = "View and manage schema registry configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Show {
        /// Config file to load (optional)
        #[arg(short, long)]
        config: Option<String>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path (default: schemas.toml)
        #[arg(short, long, default_value = "schemas.toml")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
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
    match cli.command {
        Commands::Show { config, toml, json } => {
            let cfg = SchemaConfig::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&cfg)?);
            } else {
                println!("📋 Schema Registry Configuration\n");
                println!("Registry:");
                println!("  Path: {:?}", cfg.registry_path());
                println!("  Validate schemas: {}", cfg.registry.validate_schemas);

                println!("\nValidation:");
                println!("  Use defaults: {}", cfg.validation.use_defaults);
                println!("  Coerce types: {}", cfg.validation.coerce_types);
                println!("  Remove additional: {}", cfg.validation.remove_additional);
                println!("  Throw on error: {}", cfg.validation.throw_on_error);

                println!("\nSanitize:");
                println!("  Apply defaults: {}", cfg.sanitize.apply_defaults);
                println!("  Trim strings: {}", cfg.sanitize.trim_strings);
                println!("  Strip HTML: {}", cfg.sanitize.strip_html);
                println!("  Remove additional: {}", cfg.sanitize.remove_additional);

                println!("\nDocs:");
                println!("  Format: {:?}", cfg.docs.format);
                println!("  Include examples: {}", cfg.docs.include_examples);
            }
        }

        Commands::Init { output, force } => {
            if !force && std::path::Path::new(&output).exists() {
                anyhow::bail!("{} already exists (use --force to overwrite)", output);
            }
            let cfg = SchemaConfig::default();
            cfg.save(&output)?;
            println!("✅ Created config file: {}", output);
        }

        Commands::Validate { config } => match SchemaConfig::load_from(config.as_deref()) {
            Ok(cfg) => {
                println!("✅ Configuration is valid");
                println!("   Registry: {:?}", cfg.registry_path());
                println!("   Docs format: {:?}", cfg.docs.format);
            }
            Err(e) => {
                eprintln!("❌ Configuration error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

//! verimap CLI - Command line interface for verimap
//!
//! Each invocation applies at most one mutation and prints the resulting
//! version and root hash, so the binary can be driven from scripts.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use verimap::{Hash, MapConfig, MapDatabase, MapMutation, MutationEntry};

#[derive(Parser)]
#[command(name = "verimap")]
#[command(about = "A versioned, authenticated key/value map")]
#[command(version)]
struct Cli {
    /// Path to the map file
    #[arg(short, long, default_value = "map.vmap")]
    database: PathBuf,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new map file
    Init {
        /// Account owning the map
        #[arg(long, default_value = "local")]
        account: String,
        /// Name of the map
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// Set a key to a value
    Set { key: String, value: String },

    /// Set a key only if its current leaf hash matches
    Update {
        key: String,
        value: String,
        /// Expected current leaf hash (hex); use `null` for an absent key
        #[arg(short, long)]
        previous: String,
    },

    /// Delete a key
    Delete { key: String },

    /// Apply a JSON mutation entry, e.g. {"key":"a","action":"set","value":"1"}
    Apply { entry: String },

    /// Get the value of a key
    Get {
        key: String,
        /// Version to read (latest by default)
        #[arg(long)]
        version: Option<u64>,
    },

    /// Show the root hash of a version
    Root {
        /// Version to read (latest by default)
        #[arg(long)]
        version: Option<u64>,
    },

    /// Show map status
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { account, name } => {
            let config = MapConfig {
                account,
                name,
                ..MapConfig::default()
            };
            let db = MapDatabase::create_with_config(&cli.database, config)?;
            db.sync()?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "map": db.map_ref().to_string(),
                    "message": format!("Created map at {}", cli.database.display())
                }),
            );
        }

        Commands::Set { key, value } => {
            let mut db = open_db(&cli.database)?;
            let applied = db.set(key, value)?;
            output_applied(&cli.format, applied);
        }

        Commands::Update {
            key,
            value,
            previous,
        } => {
            let previous = if previous == "null" {
                verimap::null_leaf_hash()
            } else {
                previous
                    .parse::<Hash>()
                    .map_err(|e| anyhow::anyhow!("Invalid previous leaf hash: {}", e))?
            };
            let mut db = open_db(&cli.database)?;
            let applied = db.update(key, value, previous)?;
            output_applied(&cli.format, applied);
        }

        Commands::Delete { key } => {
            let mut db = open_db(&cli.database)?;
            let applied = db.delete(key)?;
            output_applied(&cli.format, applied);
        }

        Commands::Apply { entry } => {
            let mutation: MapMutation = MutationEntry::parse_json(&entry)?;
            let mut db = open_db(&cli.database)?;
            let applied = db.apply(mutation)?;
            output_applied(&cli.format, applied);
        }

        Commands::Get { key, version } => {
            let db = open_db(&cli.database)?;
            let version = version.unwrap_or(db.size());
            match db.get(key.as_bytes(), Some(version))? {
                Some(value) => {
                    let leaf_hash = verimap::leaf_hash(&value);
                    output(
                        &cli.format,
                        &serde_json::json!({
                            "key": key,
                            "value": String::from_utf8_lossy(&value),
                            "leaf_hash": leaf_hash.to_hex(),
                            "version": version
                        }),
                    );
                }
                None => {
                    output(
                        &cli.format,
                        &serde_json::json!({
                            "status": "error",
                            "message": format!("Key not found: {}", key),
                            "version": version
                        }),
                    );
                    std::process::exit(1);
                }
            }
        }

        Commands::Root { version } => {
            let db = open_db(&cli.database)?;
            let version = version.unwrap_or(db.size());
            let root = db.root_hash(Some(version))?;
            output(
                &cli.format,
                &serde_json::json!({
                    "version": version,
                    "root": root.to_hex()
                }),
            );
        }

        Commands::Status => {
            let db = open_db(&cli.database)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "database": cli.database.display().to_string(),
                    "map": db.map_ref().to_string(),
                    "size": db.size(),
                    "root": db.root_hash(None)?.to_hex(),
                    "nodes": db.store().node_count(),
                    "values": db.store().value_count()
                }),
            );
        }
    }

    Ok(())
}

fn open_db(path: &Path) -> anyhow::Result<MapDatabase> {
    Ok(MapDatabase::open_or_create(path)?)
}

fn output_applied(format: &OutputFormat, (version, root): (u64, Hash)) {
    output(
        format,
        &serde_json::json!({
            "status": "ok",
            "version": version,
            "root": root.to_hex()
        }),
    );
}

fn output(format: &OutputFormat, value: &serde_json::Value) {
    match format {
        OutputFormat::Json => {
            println!("{}", value);
        }
        OutputFormat::Text => {
            if let Some(fields) = value.as_object() {
                for (name, field) in fields {
                    match field.as_str() {
                        Some(s) => println!("{}: {}", name, s),
                        None => println!("{}: {}", name, field),
                    }
                }
            } else {
                println!("{}", value);
            }
        }
    }
}

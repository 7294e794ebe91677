use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billet::config::Config;
use billet::models::Gender;
use billet::reconcile::DeletedRoom;
use billet::storage::Collection;

mod commands;

#[derive(Parser)]
#[command(
    name = "billet",
    version,
    about = "Room, bed-space and tag allocation with drift repair for training portals",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full reconciliation pass
    Sync {
        /// Print the report as JSON
        #[arg(long, default_value = "false")]
        json: bool,

        /// Print Prometheus metrics after the report
        #[arg(long, default_value = "false")]
        metrics: bool,
    },

    /// Show allocation counts without changing anything
    Status {
        /// Print the summary as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Backfill allocation status on legacy trainee records
    Migrate,

    /// Revert trainee references to rooms or tags deleted elsewhere
    Cleanup {
        /// Deleted room as BLOCK:NUMBER (repeatable)
        #[arg(long = "room", value_name = "BLOCK:NUMBER")]
        rooms: Vec<DeletedRoom>,

        /// Deleted tag number (repeatable)
        #[arg(long = "tag", value_name = "TAGNO")]
        tags: Vec<String>,
    },

    /// Delete room records and clean up their occupants
    DeleteRooms {
        /// Room record ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete tag records and clean up their holders
    DeleteTags {
        /// Tag record ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Claim the next available tag
    AllocateTag,

    /// Show the room a trainee of the given gender would receive
    AllocateRoom {
        #[arg(short, long)]
        gender: Gender,
    },

    /// Register a trainee and allocate a tag and room
    Register {
        #[arg(short, long)]
        gender: Gender,

        /// Extra trainee field as key=value (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
    },

    /// Seed a collection from a JSON array of documents
    Load {
        /// Target collection (trainees, rooms, tags)
        #[arg(long)]
        collection: Collection,

        /// JSON file containing an array of objects
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    tracing::debug!(backend = ?config.store.backend, "billet starting");

    match cli.command {
        Commands::Sync { json, metrics } => {
            tracing::info!(json = %json, metrics = %metrics, "Starting sync command");
            commands::sync(&config, json, metrics).await?;
        }

        Commands::Status { json } => {
            commands::status(&config, json).await?;
        }

        Commands::Migrate => {
            tracing::info!("Starting migrate command");
            commands::migrate(&config).await?;
        }

        Commands::Cleanup { rooms, tags } => {
            tracing::info!(
                rooms = rooms.len(),
                tags = tags.len(),
                "Starting cleanup command"
            );
            commands::cleanup(&config, rooms, tags).await?;
        }

        Commands::DeleteRooms { ids } => {
            tracing::info!(count = ids.len(), "Starting delete-rooms command");
            commands::delete_rooms(&config, ids).await?;
        }

        Commands::DeleteTags { ids } => {
            tracing::info!(count = ids.len(), "Starting delete-tags command");
            commands::delete_tags(&config, ids).await?;
        }

        Commands::AllocateTag => {
            commands::allocate_tag(&config).await?;
        }

        Commands::AllocateRoom { gender } => {
            commands::allocate_room(&config, gender).await?;
        }

        Commands::Register { gender, fields } => {
            tracing::info!(gender = %gender, fields = fields.len(), "Starting register command");
            commands::register(&config, gender, fields).await?;
        }

        Commands::Load { collection, file } => {
            tracing::info!(collection = %collection, file = %file.display(), "Starting load command");
            commands::load(&config, collection, &file).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("billet=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("billet={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

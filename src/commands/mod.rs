pub mod allocate;
pub mod load;
pub mod maintenance;
pub mod sync;

use anyhow::{Context, Result};
use serde::Serialize;

use billet::config::Config;
use billet::reconcile::ReconciliationEngine;
use billet::storage::open_store;

// Re-export command functions for convenience
pub use allocate::{allocate_room, allocate_tag, register};
pub use load::load;
pub use maintenance::{cleanup, delete_rooms, delete_tags, migrate};
pub use sync::{status, sync};

/// Open the configured store and build an engine on top of it
fn open_engine(config: &Config) -> Result<ReconciliationEngine> {
    let store = open_store(&config.store).with_context(|| {
        format!(
            "Failed to open {:?} store at {}",
            config.store.backend,
            config.store.sqlite_path.display()
        )
    })?;
    Ok(ReconciliationEngine::from_config(store, config))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode JSON output")?;
    println!("{text}");
    Ok(())
}

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use billet::config::Config;
use billet::storage::{open_store, Collection, Fields};

/// Parse a JSON array of objects into documents
fn parse_documents(content: &str) -> Result<Vec<Fields>> {
    let value: Value = serde_json::from_str(content).context("File is not valid JSON")?;
    let Value::Array(items) = value else {
        anyhow::bail!("Expected a JSON array of objects");
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(fields) => Ok(fields),
            _ => anyhow::bail!("Element {i} is not a JSON object"),
        })
        .collect()
}

/// Seed a collection from a JSON fixture file
pub async fn load(config: &Config, collection: Collection, file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let documents = parse_documents(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let store = open_store(&config.store).context("Failed to open store")?;
    let total = documents.len();
    for (i, doc) in documents.into_iter().enumerate() {
        let id = store
            .create_record(collection, doc)
            .await
            .with_context(|| format!("Failed to create {collection} record #{i}"))?;
        tracing::debug!(collection = %collection, id = %id, "Record created");
    }

    println!("Loaded {total} records into {collection}");
    Ok(())
}

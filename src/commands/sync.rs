use anyhow::{Context, Result};

use billet::config::Config;
use billet::error::BilletErrorTrait;
use billet::metrics;

use super::{open_engine, print_json};

pub async fn sync(config: &Config, json: bool, show_metrics: bool) -> Result<()> {
    if show_metrics {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!(error = %e, "Metrics initialization failed");
        }
    }

    let engine = open_engine(config)?;
    let report = match engine.synchronize().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Synchronization failed: {}", e.operator_message());
            return Err(e).context("Synchronization failed");
        }
    };

    if json {
        print_json(&report)?;
    } else {
        print!("{}", report.display());
    }

    if show_metrics {
        let text = metrics::encode_metrics()
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {e}"))?;
        println!();
        print!("{text}");
    }
    Ok(())
}

pub async fn status(config: &Config, json: bool) -> Result<()> {
    let engine = open_engine(config)?;
    let snapshot = engine
        .reader()
        .load()
        .await
        .context("Failed to read allocation state")?;
    let summary = snapshot.summarize();

    if json {
        print_json(&summary)?;
    } else {
        println!("Allocation status");
        println!("================================");
        print!("{}", summary.display());
        if snapshot.skipped > 0 {
            println!("({} room/tag records skipped: missing room or tag number)", snapshot.skipped);
        }
    }
    Ok(())
}

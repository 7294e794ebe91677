use anyhow::{Context, Result};

use billet::config::Config;
use billet::reconcile::{CleanupReport, DeletedRoom, DeletedTag};

use super::open_engine;

fn print_cleanup(report: &CleanupReport) {
    if report.rooms_deleted > 0 {
        println!("  Rooms deleted:    {}", report.rooms_deleted);
    }
    if report.tags_deleted > 0 {
        println!("  Tags deleted:     {}", report.tags_deleted);
    }
    println!("  Trainees updated: {}", report.updated_trainee_count);
    if report.inconsistencies > 0 {
        println!("  {} inconsistencies encountered", report.inconsistencies);
    }
}

pub async fn migrate(config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let report = engine
        .migrate_legacy_trainees()
        .await
        .context("Legacy migration failed")?;

    println!("Legacy migration finished");
    println!("  Trainees scanned:  {}", report.scanned);
    println!("  Trainees migrated: {}", report.migrated);
    if report.inconsistencies > 0 {
        println!("  {} inconsistencies encountered", report.inconsistencies);
    }
    Ok(())
}

pub async fn cleanup(config: &Config, rooms: Vec<DeletedRoom>, tags: Vec<String>) -> Result<()> {
    if rooms.is_empty() && tags.is_empty() {
        println!("Nothing to clean up: pass --room BLOCK:NUMBER or --tag TAGNO");
        return Ok(());
    }

    let engine = open_engine(config)?;
    let tags: Vec<DeletedTag> = tags.into_iter().map(DeletedTag::new).collect();
    let report = engine
        .cleanup_after_deletion(&rooms, &tags)
        .await
        .context("Cleanup failed")?;

    println!("Cleanup finished");
    print_cleanup(&report);
    Ok(())
}

pub async fn delete_rooms(config: &Config, ids: Vec<String>) -> Result<()> {
    let engine = open_engine(config)?;
    let report = engine.delete_rooms(&ids).await.context("Room deletion failed")?;

    println!("Room deletion finished");
    print_cleanup(&report);
    Ok(())
}

pub async fn delete_tags(config: &Config, ids: Vec<String>) -> Result<()> {
    let engine = open_engine(config)?;
    let report = engine.delete_tags(&ids).await.context("Tag deletion failed")?;

    println!("Tag deletion finished");
    print_cleanup(&report);
    Ok(())
}

//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};

use billet::reconcile::ReconciliationEngine;
use billet::storage::{Collection, Fields, MemoryStore};
use billet::utils::RetryConfig;

/// Convert a JSON object literal into document fields
pub fn doc(value: Value) -> Fields {
    value
        .as_object()
        .cloned()
        .expect("fixture must be a JSON object")
}

/// Freshly registered trainee with every allocation field pending
pub fn pending_trainee(id: &str, gender: &str) -> Fields {
    doc(json!({
        "id": id,
        "gender": gender,
        "tagNumber": "pending",
        "roomNumber": "pending",
        "roomBlock": "pending",
        "bedSpace": "pending",
        "allocationStatus": "pending"
    }))
}

/// Trainee holding a tag and a room
pub fn allocated_trainee(id: &str, gender: &str, tag: &str, block: &str, room: &str) -> Fields {
    doc(json!({
        "id": id,
        "gender": gender,
        "tagNumber": tag,
        "roomNumber": room,
        "roomBlock": block,
        "bedSpace": "2",
        "allocationStatus": "allocated"
    }))
}

pub fn room(id: &str, block: &str, number: &str, bed_space: &str) -> Fields {
    doc(json!({
        "id": id,
        "roomNumber": number,
        "block": block,
        "bedSpace": bed_space,
        "status": "available"
    }))
}

pub fn tag(id: &str, tag_no: &str, status: &str) -> Fields {
    doc(json!({"id": id, "tagNo": tag_no, "status": status}))
}

/// Engine over a memory store with fast retries
pub fn engine(store: &Arc<MemoryStore>) -> ReconciliationEngine {
    ReconciliationEngine::new(store.clone()).with_retry(RetryConfig::with_delays(2, 0, 0))
}

/// Read one string field of a stored record
pub async fn field(store: &MemoryStore, collection: Collection, id: &str, key: &str) -> Option<String> {
    store
        .get(collection, id)
        .await
        .and_then(|r| r.get_str(key).map(String::from))
}

/// Ids of tags stored with the given status
pub async fn tags_with_status(store: &MemoryStore, status: &str) -> Vec<String> {
    use billet::storage::DocumentStore;

    store
        .list_all(Collection::Tags)
        .await
        .expect("list tags")
        .into_iter()
        .filter(|r| r.get_str("status") == Some(status))
        .map(|r| r.id)
        .collect()
}

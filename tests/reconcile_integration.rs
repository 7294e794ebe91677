//! End-to-end reconciliation passes over the in-memory store

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use billet::reconcile::ReconcileError;
use billet::storage::{Collection, InjectedFailure, MemoryStore};
use common::{allocated_trainee, doc, engine, field, pending_trainee, room, tag, tags_with_status};
use serde_json::json;

#[tokio::test]
async fn test_three_tags_two_trainees() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [pending_trainee("tr1", "male"), pending_trainee("tr2", "male")],
            )
            .with_collection(Collection::Rooms, [room("a1", "A", "101", "double")])
            .with_collection(
                Collection::Tags,
                [
                    tag("t1", "T1", "available"),
                    tag("t2", "T2", "available"),
                    tag("t3", "T3", "available"),
                ],
            ),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.allocated, 2);
    assert_eq!(report.no_tags, 0);
    assert_eq!(report.inconsistencies, 0);

    let first = field(&store, Collection::Trainees, "tr1", "tagNumber").await.unwrap();
    let second = field(&store, Collection::Trainees, "tr2", "tagNumber").await.unwrap();
    assert_ne!(first, second);
    for held in [&first, &second] {
        assert!(["T1", "T2", "T3"].contains(&held.as_str()));
    }
    assert_eq!(tags_with_status(&store, "available").await.len(), 1);
}

#[tokio::test]
async fn test_tag_allocation_follows_natural_order() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(Collection::Trainees, [pending_trainee("tr1", "female")])
            .with_collection(
                Collection::Tags,
                [tag("t10", "T10", "available"), tag("t2", "T2", "available")],
            ),
    );

    engine(&store).synchronize().await.unwrap();
    assert_eq!(
        field(&store, Collection::Trainees, "tr1", "tagNumber").await.as_deref(),
        Some("T2")
    );
}

#[tokio::test]
async fn test_no_rooms_for_gender() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(Collection::Trainees, [pending_trainee("tr1", "female")])
            .with_collection(Collection::Rooms, [room("a1", "A", "101", "4")])
            .with_collection(Collection::Tags, [tag("t1", "T1", "available")]),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.no_rooms, 1);
    assert_eq!(report.allocated, 1);

    assert_eq!(
        field(&store, Collection::Trainees, "tr1", "allocationStatus").await.as_deref(),
        Some("no_rooms")
    );
    assert_eq!(
        field(&store, Collection::Tags, "t1", "status").await.as_deref(),
        Some("assigned")
    );
    for key in ["roomNumber", "roomBlock", "bedSpace"] {
        assert_eq!(
            field(&store, Collection::Trainees, "tr1", key).await.as_deref(),
            Some("pending")
        );
    }
}

#[tokio::test]
async fn test_exhausted_tag_pool_marks_no_tags() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [pending_trainee("tr1", "male"), pending_trainee("tr2", "male")],
            )
            .with_collection(Collection::Rooms, [room("a1", "A", "1", "4")])
            .with_collection(Collection::Tags, [tag("t1", "T1", "available")]),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.allocated, 1);
    assert_eq!(report.no_tags, 1);
    assert_eq!(
        field(&store, Collection::Trainees, "tr2", "allocationStatus").await.as_deref(),
        Some("no_tags")
    );
    assert_eq!(
        field(&store, Collection::Trainees, "tr2", "roomNumber").await.as_deref(),
        Some("pending")
    );
}

#[tokio::test]
async fn test_drifted_tag_corrected_to_assigned() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [allocated_trainee("tr1", "male", "T7", "A", "101")],
            )
            .with_collection(
                Collection::Rooms,
                [doc(json!({
                    "id": "a101",
                    "roomNumber": "101",
                    "block": "A",
                    "bedSpace": "2",
                    "status": "partially_occupied",
                    "currentOccupancy": 1
                }))],
            )
            .with_collection(Collection::Tags, [tag("t7", "T7", "available")]),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert!(report.tags_updated >= 1);
    assert_eq!(report.rooms_updated, 0);
    assert_eq!(
        field(&store, Collection::Tags, "t7", "status").await.as_deref(),
        Some("assigned")
    );
}

#[tokio::test]
async fn test_legacy_prefixed_tag_counts_as_held() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [
                    allocated_trainee("tr1", "male", "Trainee-T7", "A", "101"),
                    pending_trainee("tr2", "male"),
                ],
            )
            .with_collection(Collection::Rooms, [room("a101", "A", "101", "2")])
            .with_collection(Collection::Tags, [tag("t7", "T7", "available")]),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.allocated, 0);
    assert_eq!(report.no_tags, 1);
    assert_eq!(
        field(&store, Collection::Tags, "t7", "status").await.as_deref(),
        Some("assigned")
    );
}

#[tokio::test]
async fn test_unreferenced_assigned_tag_released() {
    let store = Arc::new(
        MemoryStore::new().with_collection(Collection::Tags, [tag("t1", "T1", "assigned")]),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.tags_updated, 1);
    assert_eq!(
        field(&store, Collection::Tags, "t1", "status").await.as_deref(),
        Some("available")
    );
}

#[tokio::test]
async fn test_room_status_recomputed_from_occupancy() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [
                    allocated_trainee("tr1", "male", "T1", "A", "1"),
                    allocated_trainee("tr2", "male", "T2", "A", "1"),
                    allocated_trainee("tr3", "male", "T3", "A", "3"),
                ],
            )
            .with_collection(
                Collection::Rooms,
                [
                    room("a1", "A", "1", "double"),
                    room("a2", "A", "2", "single"),
                    doc(json!({
                        "id": "a3",
                        "roomNumber": "3",
                        "block": "A",
                        "bedSpace": "4",
                        "status": "maintenance"
                    })),
                ],
            )
            .with_collection(
                Collection::Tags,
                [
                    tag("t1", "T1", "assigned"),
                    tag("t2", "T2", "assigned"),
                    tag("t3", "T3", "assigned"),
                ],
            ),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.rooms_updated, 3);

    let a1 = store.get(Collection::Rooms, "a1").await.unwrap();
    assert_eq!(a1.get_str("status"), Some("fully_occupied"));
    assert_eq!(a1.get("currentOccupancy"), Some(&json!(2)));

    let a2 = store.get(Collection::Rooms, "a2").await.unwrap();
    assert_eq!(a2.get_str("status"), Some("available"));
    assert_eq!(a2.get("currentOccupancy"), Some(&json!(0)));

    let a3 = store.get(Collection::Rooms, "a3").await.unwrap();
    assert_eq!(a3.get_str("status"), Some("maintenance"));
    assert_eq!(a3.get("currentOccupancy"), Some(&json!(1)));
}

#[tokio::test]
async fn test_rooms_fill_in_block_order_and_skip_maintenance() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [
                    pending_trainee("tr1", "male"),
                    pending_trainee("tr2", "male"),
                    pending_trainee("tr3", "male"),
                ],
            )
            .with_collection(
                Collection::Rooms,
                [
                    room("b1", "B", "1", "single"),
                    doc(json!({
                        "id": "a1",
                        "roomNumber": "1",
                        "block": "A",
                        "bedSpace": "4",
                        "status": "maintenance"
                    })),
                    room("a2", "A", "2", "single"),
                ],
            )
            .with_collection(
                Collection::Tags,
                [
                    tag("t1", "T1", "available"),
                    tag("t2", "T2", "available"),
                    tag("t3", "T3", "available"),
                ],
            ),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.rooms_assigned, 2);
    assert_eq!(report.no_rooms, 1);

    for (id, expected) in [("tr1", "A"), ("tr2", "B"), ("tr3", "pending")] {
        assert_eq!(
            field(&store, Collection::Trainees, id, "roomBlock").await.as_deref(),
            Some(expected)
        );
    }
    assert_eq!(
        field(&store, Collection::Trainees, "tr3", "allocationStatus").await.as_deref(),
        Some("no_rooms")
    );
}

#[tokio::test]
async fn test_second_pass_is_fixed_point() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [
                    pending_trainee("tr1", "male"),
                    pending_trainee("tr2", "female"),
                    pending_trainee("tr3", "female"),
                    allocated_trainee("tr4", "male", "T9", "A", "1"),
                ],
            )
            .with_collection(
                Collection::Rooms,
                [room("a1", "A", "1", "double"), room("c1", "C", "1", "single")],
            )
            .with_collection(
                Collection::Tags,
                [
                    tag("t1", "T1", "available"),
                    tag("t2", "T2", "available"),
                    tag("t3", "T3", "assigned"),
                    tag("t9", "T9", "available"),
                ],
            ),
    );
    let engine = engine(&store);

    let first = engine.synchronize().await.unwrap();
    assert!(!first.is_fixed_point());

    let writes = store.write_count();
    let second = engine.synchronize().await.unwrap();
    assert_eq!(second.allocated, 0);
    assert_eq!(second.rooms_updated, 0);
    assert_eq!(second.tags_updated, 0);
    assert!(second.is_fixed_point());
    assert_eq!(store.write_count(), writes);
    assert_eq!(second.summary, first.summary);
}

#[tokio::test]
async fn test_write_failure_counted_and_pass_continues() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [pending_trainee("tr1", "male"), pending_trainee("tr2", "male")],
            )
            .with_collection(Collection::Rooms, [room("a1", "A", "1", "double")])
            .with_collection(
                Collection::Tags,
                [tag("t1", "T1", "available"), tag("t2", "T2", "available")],
            ),
    );
    store
        .fail_writes(Collection::Trainees, "tr1", InjectedFailure::Timeout)
        .await;
    let engine = engine(&store);

    let report = engine.synchronize().await.unwrap();
    assert!(report.inconsistencies >= 1);
    assert_eq!(report.allocated, 1);
    assert_eq!(
        field(&store, Collection::Trainees, "tr1", "tagNumber").await.as_deref(),
        Some("pending")
    );
    assert_eq!(
        field(&store, Collection::Trainees, "tr2", "allocationStatus").await.as_deref(),
        Some("allocated")
    );

    // The failed trainee is picked up once the store recovers
    store.clear_failures().await;
    let retry = engine.synchronize().await.unwrap();
    assert_eq!(retry.allocated, 1);
    assert_eq!(retry.inconsistencies, 0);

    let first = field(&store, Collection::Trainees, "tr1", "tagNumber").await.unwrap();
    let second = field(&store, Collection::Trainees, "tr2", "tagNumber").await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_transient_failure_retried() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(Collection::Trainees, [pending_trainee("tr1", "male")])
            .with_collection(Collection::Rooms, [room("a1", "A", "1", "single")])
            .with_collection(Collection::Tags, [tag("t1", "T1", "available")]),
    );
    store
        .fail_writes(Collection::Trainees, "tr1", InjectedFailure::TimeoutTimes(2))
        .await;

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.inconsistencies, 0);
    assert_eq!(report.allocated, 1);
    assert_eq!(report.rooms_assigned, 1);
}

#[tokio::test]
async fn test_tags_unique_under_contention() {
    let trainees: Vec<_> = (1..=6)
        .map(|i| pending_trainee(&format!("tr{i}"), if i % 2 == 0 { "female" } else { "male" }))
        .collect();
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(Collection::Trainees, trainees)
            .with_collection(
                Collection::Tags,
                [
                    tag("t1", "T1", "available"),
                    tag("t2", "T2", "available"),
                    tag("t3", "T3", "available"),
                    tag("t4", "T4", "available"),
                ],
            ),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.allocated, 4);
    assert_eq!(report.no_tags, 2);

    let mut held = HashSet::new();
    for i in 1..=6 {
        if let Some(tag) = field(&store, Collection::Trainees, &format!("tr{i}"), "tagNumber").await {
            if tag != "pending" {
                assert!(held.insert(tag), "tag handed out twice");
            }
        }
    }
    assert_eq!(held.len(), 4);
}

#[tokio::test]
async fn test_stale_status_corrected() {
    let mut trainee = allocated_trainee("tr1", "male", "T1", "A", "1");
    trainee.insert("allocationStatus".into(), json!("no_rooms"));
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(Collection::Trainees, [trainee])
            .with_collection(Collection::Rooms, [room("a1", "A", "1", "single")])
            .with_collection(Collection::Tags, [tag("t1", "T1", "assigned")]),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.status_corrected, 1);
    assert_eq!(
        field(&store, Collection::Trainees, "tr1", "allocationStatus").await.as_deref(),
        Some("allocated")
    );
}

#[tokio::test]
async fn test_summary_reflects_final_state() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [pending_trainee("tr1", "male"), pending_trainee("tr2", "female")],
            )
            .with_collection(Collection::Rooms, [room("a1", "A", "1", "double")])
            .with_collection(Collection::Tags, [tag("t1", "T1", "available")]),
    );

    let report = engine(&store).synchronize().await.unwrap();
    let summary = &report.summary;
    assert_eq!(summary.trainees.total, 2);
    assert_eq!(summary.trainees.allocated, 1);
    assert_eq!(summary.trainees.no_tags, 1);
    assert_eq!(summary.rooms.partially_occupied, 1);
    assert_eq!(summary.rooms.occupied_beds, 1);
    assert_eq!(summary.tags.assigned, 1);
}

#[tokio::test]
async fn test_snapshot_failure_aborts_pass() {
    let store = Arc::new(MemoryStore::new());
    store.fail_listing(Collection::Rooms).await;

    let err = engine(&store).synchronize().await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Snapshot {
            collection: Collection::Rooms,
            ..
        }
    ));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_failed_tag_claim_healed_next_pass() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [pending_trainee("tr1", "male"), pending_trainee("tr2", "male")],
            )
            .with_collection(Collection::Rooms, [room("a1", "A", "1", "double")])
            .with_collection(
                Collection::Tags,
                [tag("t1", "T1", "available"), tag("t2", "T2", "available")],
            ),
    );
    store
        .fail_writes(Collection::Tags, "t1", InjectedFailure::Timeout)
        .await;
    let engine = engine(&store);

    // The trainee write succeeded, so T1 stays taken for the rest of the pass
    let first = engine.synchronize().await.unwrap();
    assert_eq!(first.allocated, 2);
    assert_eq!(first.inconsistencies, 1);
    let held_1 = field(&store, Collection::Trainees, "tr1", "tagNumber").await.unwrap();
    let held_2 = field(&store, Collection::Trainees, "tr2", "tagNumber").await.unwrap();
    assert_ne!(held_1, held_2);
    assert_eq!(
        field(&store, Collection::Tags, "t1", "status").await.as_deref(),
        Some("available")
    );

    store.clear_failures().await;
    let second = engine.synchronize().await.unwrap();
    assert_eq!(second.tags_updated, 1);
    assert_eq!(second.allocated, 0);
    assert_eq!(second.inconsistencies, 0);
    assert_eq!(
        field(&store, Collection::Tags, "t1", "status").await.as_deref(),
        Some("assigned")
    );

    let third = engine.synchronize().await.unwrap();
    assert!(third.is_fixed_point(), "third pass changed state: {third:?}");
}

#[tokio::test]
async fn test_failed_room_repair_counted() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(
                Collection::Trainees,
                [allocated_trainee("tr1", "male", "T1", "A", "1")],
            )
            .with_collection(Collection::Rooms, [room("a1", "A", "1", "single")])
            .with_collection(Collection::Tags, [tag("t1", "T1", "assigned")]),
    );
    store
        .fail_writes(Collection::Rooms, "a1", InjectedFailure::Timeout)
        .await;
    let engine = engine(&store);

    let first = engine.synchronize().await.unwrap();
    assert_eq!(first.rooms_updated, 0);
    assert_eq!(first.inconsistencies, 1);
    assert_eq!(
        field(&store, Collection::Rooms, "a1", "status").await.as_deref(),
        Some("available")
    );

    store.clear_failures().await;
    let second = engine.synchronize().await.unwrap();
    assert_eq!(second.rooms_updated, 1);
    assert_eq!(second.inconsistencies, 0);
    assert_eq!(
        field(&store, Collection::Rooms, "a1", "status").await.as_deref(),
        Some("fully_occupied")
    );
    assert!(engine.synchronize().await.unwrap().is_fixed_point());
}

#[tokio::test]
async fn test_zero_bed_room_is_never_assigned() {
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(Collection::Trainees, [pending_trainee("tr1", "male")])
            .with_collection(Collection::Rooms, [room("a1", "A", "1", "0")])
            .with_collection(Collection::Tags, [tag("t1", "T1", "available")]),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.allocated, 1);
    assert_eq!(report.rooms_assigned, 0);
    assert_eq!(report.no_rooms, 1);
    assert_eq!(
        field(&store, Collection::Trainees, "tr1", "roomBlock").await.as_deref(),
        Some("pending")
    );
    assert_eq!(
        field(&store, Collection::Rooms, "a1", "status").await.as_deref(),
        Some("fully_occupied")
    );
}

#[tokio::test]
async fn test_rooms_fill_to_capacity_within_one_pass() {
    let trainees: Vec<_> = (1..=4).map(|i| pending_trainee(&format!("tr{i}"), "female")).collect();
    let tags: Vec<_> = (1..=4).map(|i| tag(&format!("t{i}"), &format!("T{i}"), "available")).collect();
    let store = Arc::new(
        MemoryStore::new()
            .with_collection(Collection::Trainees, trainees)
            .with_collection(
                Collection::Rooms,
                [room("c1", "C", "1", "double"), room("c2", "C", "2", "single")],
            )
            .with_collection(Collection::Tags, tags),
    );

    let report = engine(&store).synchronize().await.unwrap();
    assert_eq!(report.rooms_assigned, 3);
    assert_eq!(report.no_rooms, 1);
    assert_eq!(report.inconsistencies, 0);
    assert_eq!(report.summary.rooms.fully_occupied, 2);
    assert_eq!(report.summary.rooms.occupied_beds, 3);
}

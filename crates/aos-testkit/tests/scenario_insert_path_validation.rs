//! Scenario: Creation attributes are captured once and validated on insert
//!
//! # Invariant under test
//! - A new row stores its dates in canonical `YYYY-MM-DD HH:MM:SS` form.
//! - A malformed date or a missing attribute fails the call and leaves no row.
//! - Attributes of an already-known entity are never re-read.
//! - A store failure propagates unchanged and leaves no row.
//!
//! All tests are pure in-process; no DB or network required.

use aos_reconcile::{
    canonical_datetime, CreateAttrs, EntityKind, EntityRecord, LineItemAttrs, Outcome,
    ReconcileError, StoreError,
};
use aos_testkit::{MemoryStore, StoreOp};
use serde_json::{json, Value};

fn line_item(start: &str, end: &str) -> Value {
    json!({
        "startDate": start,
        "endDate": end,
        "costType": "CPM",
        "quantity": "1000",
        "unitCost": "12.5",
    })
}

#[tokio::test]
async fn first_insert_captures_canonical_dates_and_numbers() {
    let store = MemoryStore::new();
    let attrs = line_item("2025-01-01 00:00", "2025-01-05 00:00");

    let r = store
        .reconciler()
        .reconcile(EntityKind::LineItem, "E", "X", attrs.as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(r.outcome, Outcome::Created);

    let row = store.record(EntityKind::LineItem, r.surrogate_id).unwrap();
    assert_eq!(row.external_id, "E");
    assert_eq!(row.display_name, "X");
    let CreateAttrs::LineItem(li) = row.attrs.clone() else {
        panic!("expected line item row, got {:?}", row.attrs);
    };
    assert_eq!(canonical_datetime(&li.start_date), "2025-01-01 00:00:00");
    assert_eq!(canonical_datetime(&li.end_date), "2025-01-05 00:00:00");
    assert_eq!(li.quantity, 1000);
    assert!((li.unit_cost - 12.5).abs() < 1e-9);
}

#[tokio::test]
async fn stored_record_serializes_canonical_dates() {
    let store = MemoryStore::new();
    let attrs = line_item("2025-01-01 00:00", "2025-01-05 00:00");

    let r = store
        .reconciler()
        .reconcile(EntityKind::LineItem, "E", "X", attrs.as_object().unwrap())
        .await
        .unwrap();

    let row = store.record(EntityKind::LineItem, r.surrogate_id).unwrap();
    let rendered = serde_json::to_string(&row).unwrap();
    assert!(rendered.contains(r#""start_date":"2025-01-01 00:00:00""#), "{rendered}");
    assert!(rendered.contains(r#""end_date":"2025-01-05 00:00:00""#), "{rendered}");

    let back: EntityRecord = serde_json::from_str(&rendered).unwrap();
    assert_eq!(back, row);
}

#[tokio::test]
async fn padded_date_is_rejected_and_nothing_is_created() {
    let store = MemoryStore::new();
    let attrs = line_item(" 2025-01-01 00:00 ", "2025-01-05 00:00");

    let err = store
        .reconciler()
        .reconcile(EntityKind::LineItem, "E", "X", attrs.as_object().unwrap())
        .await
        .unwrap_err();

    assert!(
        matches!(err, ReconcileError::Validation { field: "startDate", .. }),
        "got {err:?}"
    );
    assert!(store.is_empty(EntityKind::LineItem));
}

#[tokio::test]
async fn malformed_date_is_rejected_and_nothing_is_created() {
    let store = MemoryStore::new();
    let attrs = line_item("01/01/2025", "2025-01-05 00:00");

    let err = store
        .reconciler()
        .reconcile(EntityKind::LineItem, "E", "X", attrs.as_object().unwrap())
        .await
        .unwrap_err();

    assert!(
        matches!(err, ReconcileError::Validation { field: "startDate", .. }),
        "got {err:?}"
    );
    assert!(store.is_empty(EntityKind::LineItem));
    assert_eq!(store.counts().inserts, 0, "validation runs before any insert");
}

#[tokio::test]
async fn missing_order_attribute_is_missing_field() {
    let store = MemoryStore::new();
    let attrs = json!({
        "startDate": "2025-01-01 00:00",
        "endDate": "2025-01-05 00:00",
        "advertiserId": 1,
        "salesPersonName": "Rep",
    });

    let err = store
        .reconciler()
        .reconcile(EntityKind::Order, "O-1", "Order", attrs.as_object().unwrap())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ReconcileError::MissingField {
            field: "salesPersonEmailId"
        }
    );
    assert!(store.is_empty(EntityKind::Order));
}

#[tokio::test]
async fn known_entity_ignores_bad_attributes() {
    let store = MemoryStore::new();
    let start = aos_reconcile::parse_source_datetime("startDate", "2024-06-01 00:00").unwrap();
    store.seed(EntityRecord {
        surrogate_id: 5,
        external_id: "LI-5".to_string(),
        display_name: "Line five".to_string(),
        attrs: CreateAttrs::LineItem(LineItemAttrs {
            start_date: start,
            end_date: start,
            cost_method: "CPM".to_string(),
            quantity: 1,
            unit_cost: 1.0,
        }),
    });

    let r = store
        .reconciler()
        .reconcile(
            EntityKind::LineItem,
            "LI-5",
            "Line five",
            line_item("garbage", "garbage").as_object().unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(r.surrogate_id, 5);
    assert_eq!(r.outcome, Outcome::Unchanged);
}

#[tokio::test]
async fn store_failure_propagates_and_leaves_no_row() {
    let store = MemoryStore::new();
    store.fail_next(StoreError::Unavailable("connection refused".to_string()));

    let err = store
        .reconciler()
        .reconcile(EntityKind::Advertiser, "A", "A", &Default::default())
        .await
        .unwrap_err();

    match err {
        ReconcileError::Store(e) => assert!(e.is_unavailable()),
        other => panic!("expected store error, got {other:?}"),
    }
    assert!(store.is_empty(EntityKind::Advertiser));
}

#[tokio::test]
async fn failed_rename_surfaces_store_error() {
    let store = MemoryStore::new();
    store.seed(EntityRecord {
        surrogate_id: 2,
        external_id: "A".to_string(),
        display_name: "Old".to_string(),
        attrs: CreateAttrs::Advertiser,
    });
    store.fail_next_on(StoreOp::Update, StoreError::statement("update_display_name", "deadlock detected"));

    let err = store
        .reconciler()
        .reconcile(EntityKind::Advertiser, "A", "New", &Default::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Store(StoreError::Statement { .. })), "got {err:?}");
    assert_eq!(store.counts().lookups, 1);
    assert_eq!(store.record(EntityKind::Advertiser, 2).unwrap().display_name, "Old");
}

#[tokio::test]
async fn failed_insert_surfaces_store_error() {
    let store = MemoryStore::new();
    store.fail_next_on(
        StoreOp::Insert,
        StoreError::Conflict {
            op: "insert_if_absent",
            message: "duplicate key value violates unique constraint".to_string(),
        },
    );

    let err = store
        .reconciler()
        .reconcile(EntityKind::Advertiser, "A", "A", &Default::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Store(StoreError::Conflict { .. })), "got {err:?}");
    assert!(store.is_empty(EntityKind::Advertiser));
}

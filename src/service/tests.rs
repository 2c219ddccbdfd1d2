use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use crate::model::{Inventory, ReservationInput, RoomId};
use crate::store::{Document, MemoryStore, ReservationStore, StoreError};

use super::{ReservationService, ServiceError};

// ── Test infrastructure ──────────────────────────────────

fn service() -> (ReservationService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (
        ReservationService::new(store.clone(), Inventory::default()),
        store,
    )
}

fn input(room_id: &str, arrival: &str, nights: i64, room_count: i64) -> ReservationInput {
    ReservationInput {
        customer_name: "John Doe".into(),
        guest_name: "Jane Doe".into(),
        room_type: "A-101".into(),
        room_id: room_id.into(),
        hotel_id: 101,
        arrival_date: arrival.parse().unwrap(),
        nights,
        room_count,
    }
}

/// A store whose every operation hangs forever — exercises the deadline.
struct HangingStore;

#[async_trait]
impl ReservationStore for HangingStore {
    async fn create(&self, _doc: Document) -> Result<Document, StoreError> {
        std::future::pending().await
    }

    async fn find_by_reservation_id(&self, _id: Uuid) -> Result<Option<Document>, StoreError> {
        std::future::pending().await
    }

    async fn find_all(&self) -> Result<Vec<Document>, StoreError> {
        std::future::pending().await
    }

    async fn delete_by_reservation_id(&self, _id: Uuid) -> Result<u64, StoreError> {
        std::future::pending().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        std::future::pending().await
    }
}

// ── make / get ───────────────────────────────────────────

#[tokio::test]
async fn make_then_get_round_trip() {
    let (svc, _) = service();

    let record = svc
        .make_reservation(input("A", "2025-08-01", 3, 1))
        .await
        .unwrap();
    assert!(!record.store_id.is_empty());
    assert!(!record.reservation_id.is_nil());
    assert_eq!(record.customer_name, "John Doe");
    assert_eq!(record.guest_name, "Jane Doe");
    assert_eq!(record.room_type, "A-101");
    assert_eq!(record.room_id, RoomId::A);
    assert_eq!(record.hotel_id, 101);
    assert_eq!(
        record.arrival_date,
        "2025-08-01".parse::<NaiveDate>().unwrap()
    );
    assert_eq!(record.nights, 3);
    assert_eq!(record.room_count, 1);

    let fetched = svc.get_reservation(record.reservation_id).await.unwrap();
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn get_unknown_is_not_found() {
    let (svc, _) = service();
    let id = Uuid::new_v4();
    let err = svc.get_reservation(id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(e) if e == id));
}

#[tokio::test]
async fn make_persists_exactly_one_document() {
    let (svc, store) = service();
    svc.make_reservation(input("B", "2025-08-01", 2, 3))
        .await
        .unwrap();
    assert_eq!(store.document_count(), 1);
}

// ── validation ───────────────────────────────────────────

#[tokio::test]
async fn validation_rejects_each_bad_field() {
    let (svc, store) = service();

    let cases: Vec<(ReservationInput, &str)> = vec![
        (
            ReservationInput {
                customer_name: String::new(),
                ..input("A", "2025-08-01", 1, 1)
            },
            "customer_name",
        ),
        (
            ReservationInput {
                guest_name: String::new(),
                ..input("A", "2025-08-01", 1, 1)
            },
            "guest_name",
        ),
        (
            ReservationInput {
                room_type: String::new(),
                ..input("A", "2025-08-01", 1, 1)
            },
            "room_type",
        ),
        (input("X", "2025-08-01", 1, 1), "room_id"),
        (
            ReservationInput {
                hotel_id: 0,
                ..input("A", "2025-08-01", 1, 1)
            },
            "hotel_id",
        ),
        (input("A", "2025-08-01", 0, 1), "nights"),
        (input("A", "2025-08-01", -2, 1), "nights"),
        (input("A", "2025-08-01", 1, 0), "room_count"),
    ];

    for (bad, expected_field) in cases {
        let err = svc.make_reservation(bad).await.unwrap_err();
        match err {
            ServiceError::Invalid { field, .. } => assert_eq!(field, expected_field),
            other => panic!("expected validation error for {expected_field}, got {other:?}"),
        }
    }

    // Nothing reached the store
    assert_eq!(store.document_count(), 0);
}

#[tokio::test]
async fn room_type_e_is_rejected_as_input() {
    let (svc, _) = service();
    let err = svc
        .make_reservation(input("E", "2025-08-01", 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid { field: "room_id", .. }));
}

// ── delete ───────────────────────────────────────────────

#[tokio::test]
async fn delete_is_final() {
    let (svc, _) = service();
    let record = svc
        .make_reservation(input("C", "2025-08-01", 1, 1))
        .await
        .unwrap();

    svc.delete_reservation(record.reservation_id).await.unwrap();

    let err = svc.get_reservation(record.reservation_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn delete_unknown_is_not_found() {
    let (svc, _) = service();
    let err = svc.delete_reservation(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

// ── availability ─────────────────────────────────────────

#[tokio::test]
async fn availability_counts_the_target_itself() {
    let (svc, _) = service();
    let record = svc
        .make_reservation(input("A", "2025-08-01", 3, 1))
        .await
        .unwrap();

    let available = svc.get_availability(record.reservation_id).await.unwrap();
    assert_eq!(available[&RoomId::A], 260);
    assert_eq!(available[&RoomId::B], 137);
    assert_eq!(available[&RoomId::C], 130);
    assert_eq!(available[&RoomId::D], 58);
    assert_eq!(available[&RoomId::E], 4);
}

#[tokio::test]
async fn availability_for_unknown_reservation_is_not_found() {
    let (svc, _) = service();
    let err = svc.get_availability(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn availability_ignores_disjoint_stays() {
    let (svc, _) = service();
    let target = svc
        .make_reservation(input("A", "2025-08-01", 3, 1))
        .await
        .unwrap();
    // Arrives exactly on the target's check-out date
    svc.make_reservation(input("A", "2025-08-04", 2, 260))
        .await
        .unwrap();

    let available = svc.get_availability(target.reservation_id).await.unwrap();
    assert_eq!(available[&RoomId::A], 260);
}

#[tokio::test]
async fn availability_surfaces_overbooking() {
    let (svc, _) = service();
    let first = svc
        .make_reservation(input("A", "2025-08-01", 3, 261))
        .await
        .unwrap();
    // The write itself succeeds — overbooking is only detected on the next
    // availability query
    svc.make_reservation(input("A", "2025-08-02", 1, 1))
        .await
        .unwrap();

    let err = svc.get_availability(first.reservation_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Overbooking(RoomId::A)));
}

// ── corruption & deadlines ───────────────────────────────

#[tokio::test]
async fn corrupt_document_fails_get() {
    let (svc, store) = service();
    let id = Uuid::new_v4();
    store.insert_raw(json!({
        "reservation_id": id,
        "room_id": "A",
        "nights": "three",
    }));

    let err = svc.get_reservation(id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Corrupt(_)));
}

#[tokio::test]
async fn corrupt_document_fails_availability_scan() {
    let (svc, store) = service();
    let record = svc
        .make_reservation(input("A", "2025-08-01", 3, 1))
        .await
        .unwrap();
    store.insert_raw(json!({ "reservation_id": "garbage" }));

    let err = svc.get_availability(record.reservation_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Corrupt(_)));
}

#[tokio::test]
async fn store_deadline_miss_is_a_storage_error() {
    let svc = ReservationService::new(Arc::new(HangingStore), Inventory::default())
        .with_store_timeout(Duration::from_millis(20));

    let err = svc.get_reservation(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(StoreError::Timeout)));
}

//! Allocation against a live Postgres.
//!
//! Run with: `DATABASE_URL=postgres://... cargo test --test postgres_test -- --ignored`

use boxoffice_core::{AllocationEngine, CancelOutcome, CoreError};
use boxoffice_shared::BookingStatus;
use boxoffice_store::app_config::{DatabaseConfig, StorageBackend};
use boxoffice_store::{DbClient, PostgresTicketStore};
use std::sync::Arc;

async fn postgres_engine() -> AllocationEngine {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let config = DatabaseConfig {
        backend: StorageBackend::Postgres,
        url: Some(url.clone()),
        max_connections: 10,
        acquire_timeout_secs: 5,
        lock_timeout_ms: 5000,
    };

    let db = DbClient::new(&url, &config).await.expect("connect to postgres");
    db.migrate().await.expect("run migrations");

    AllocationEngine::new(Arc::new(PostgresTicketStore::new(db.pool, config.lock_timeout_ms)))
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_promotion_flow() {
    let engine = postgres_engine().await;
    let event = engine.initialize(1).await.unwrap();

    engine.book(event.id, "user1").await.unwrap();
    let second = engine.book(event.id, "user2").await.unwrap();
    let third = engine.book(event.id, "user3").await.unwrap();
    assert_eq!(second.waiting_position, Some(1));
    assert_eq!(third.waiting_position, Some(2));

    let cancellation = engine.cancel(event.id, "user1").await.unwrap();
    assert_eq!(cancellation.outcome, CancelOutcome::Promoted(second.id));

    let promoted = engine.booking_status(event.id, "user2").await.unwrap();
    assert_eq!(promoted.status, BookingStatus::Confirmed);
    let moved = engine.booking_status(event.id, "user3").await.unwrap();
    assert_eq!(moved.waiting_position, Some(1));

    let status = engine.status(event.id).await.unwrap();
    assert_eq!(status.available_tickets, 0);
    assert_eq!(status.waiting_list_count, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_conflict_and_rebook() {
    let engine = postgres_engine().await;
    let event = engine.initialize(2).await.unwrap();

    engine.book(event.id, "user1").await.unwrap();
    assert!(matches!(
        engine.book(event.id, "user1").await,
        Err(CoreError::Conflict(_))
    ));

    engine.cancel(event.id, "user1").await.unwrap();
    let rebooked = engine.book(event.id, "user1").await.unwrap();
    assert_eq!(rebooked.status, BookingStatus::Confirmed);
    assert_eq!(engine.status(event.id).await.unwrap().available_tickets, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_concurrent_last_ticket() {
    let engine = postgres_engine().await;
    let event = engine.initialize(1).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.book(event.id, &format!("user{}", i)).await
        }));
    }

    let mut confirmed = 0;
    let mut positions = Vec::new();
    for handle in handles {
        let booking = handle.await.unwrap().unwrap();
        match booking.status {
            BookingStatus::Confirmed => confirmed += 1,
            _ => positions.push(booking.waiting_position.unwrap()),
        }
    }
    positions.sort_unstable();

    assert_eq!(confirmed, 1);
    assert_eq!(positions, (1..=9).collect::<Vec<_>>());
    assert_eq!(engine.status(event.id).await.unwrap().available_tickets, 0);
}

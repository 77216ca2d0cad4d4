#![allow(dead_code)]

use async_trait::async_trait;
use boxoffice_core::repository::{
    BookingLedger, EventTransaction, InventoryStore, StoreError, StoreResult, TicketStore,
};
use boxoffice_core::AllocationEngine;
use boxoffice_shared::{Booking, BookingId, BookingStatus, Event, EventId, EventStatus, NewBooking};
use boxoffice_store::InMemoryTicketStore;
use std::collections::HashSet;
use std::sync::Arc;

pub fn memory_engine() -> (InMemoryTicketStore, AllocationEngine) {
    let store = InMemoryTicketStore::new();
    let engine = AllocationEngine::new(Arc::new(store.clone()));
    (store, engine)
}

/// Panics with a description of the first ledger invariant that does not hold.
pub fn assert_ledger_consistent(event: &Event, bookings: &[Booking]) {
    let confirmed = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Confirmed)
        .count() as i32;
    assert_eq!(
        event.available_tickets + confirmed,
        event.total_tickets,
        "available + confirmed must equal total"
    );
    assert_eq!(event.confirmed_tickets(), confirmed);

    let mut positions: Vec<i32> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Waiting)
        .map(|b| b.waiting_position.expect("waiting booking without position"))
        .collect();
    positions.sort_unstable();
    let expected: Vec<i32> = (1..=positions.len() as i32).collect();
    assert_eq!(positions, expected, "waiting positions must be 1..N");

    for booking in bookings.iter().filter(|b| b.status != BookingStatus::Waiting) {
        assert_eq!(booking.waiting_position, None, "booking {} keeps a position", booking.id);
    }

    let mut active_users = HashSet::new();
    for booking in bookings.iter().filter(|b| b.is_active()) {
        assert!(
            active_users.insert(booking.user_id.as_str()),
            "user {} holds two active bookings",
            booking.user_id
        );
    }
}

pub async fn assert_store_consistent(store: &InMemoryTicketStore, event_id: EventId) {
    let (event, bookings) = store.snapshot(event_id).await.expect("event exists");
    assert_ledger_consistent(&event, &bookings);
}

/// Store operation that a [`FaultyStore`] transaction breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    InsertBooking,
    CloseGap,
    Commit,
    /// `active_booking` reports waiting bookings without their position.
    DropWaitingPosition,
}

/// Wraps the in-memory store and fails one operation inside every transaction.
pub struct FaultyStore {
    inner: InMemoryTicketStore,
    fault: Fault,
}

/// Engine over the same events as `store`, with `fault` injected.
pub fn faulty_engine(store: &InMemoryTicketStore, fault: Fault) -> AllocationEngine {
    AllocationEngine::new(Arc::new(FaultyStore {
        inner: store.clone(),
        fault,
    }))
}

fn injected(op: &str) -> StoreError {
    format!("injected {} failure", op).into()
}

#[async_trait]
impl TicketStore for FaultyStore {
    async fn create_event(&self, total_tickets: i32) -> StoreResult<Event> {
        self.inner.create_event(total_tickets).await
    }

    async fn begin(&self, event_id: EventId) -> StoreResult<Box<dyn EventTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin(event_id).await?,
            fault: self.fault,
        }))
    }

    async fn event_status(&self, event_id: EventId) -> StoreResult<Option<EventStatus>> {
        self.inner.event_status(event_id).await
    }

    async fn latest_booking(&self, event_id: EventId, user_id: &str) -> StoreResult<Option<Booking>> {
        self.inner.latest_booking(event_id, user_id).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }
}

struct FaultyTransaction {
    inner: Box<dyn EventTransaction>,
    fault: Fault,
}

#[async_trait]
impl InventoryStore for FaultyTransaction {
    async fn lock_event(&mut self) -> StoreResult<Option<Event>> {
        self.inner.lock_event().await
    }

    async fn adjust_available(&mut self, delta: i32) -> StoreResult<()> {
        self.inner.adjust_available(delta).await
    }
}

#[async_trait]
impl BookingLedger for FaultyTransaction {
    async fn active_booking(&mut self, user_id: &str) -> StoreResult<Option<Booking>> {
        let booking = self.inner.active_booking(user_id).await?;
        if self.fault == Fault::DropWaitingPosition {
            return Ok(booking.map(|b| Booking {
                waiting_position: None,
                ..b
            }));
        }
        Ok(booking)
    }

    async fn waiting_count(&mut self) -> StoreResult<i64> {
        self.inner.waiting_count().await
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking> {
        if self.fault == Fault::InsertBooking {
            return Err(injected("insert"));
        }
        self.inner.insert_booking(booking).await
    }

    async fn update_status(
        &mut self,
        booking_id: BookingId,
        status: BookingStatus,
        waiting_position: Option<i32>,
    ) -> StoreResult<()> {
        self.inner
            .update_status(booking_id, status, waiting_position)
            .await
    }

    async fn queue_head(&mut self) -> StoreResult<Option<Booking>> {
        self.inner.queue_head().await
    }

    async fn close_gap(&mut self, position: i32) -> StoreResult<u64> {
        if self.fault == Fault::CloseGap {
            return Err(injected("renumber"));
        }
        self.inner.close_gap(position).await
    }
}

#[async_trait]
impl EventTransaction for FaultyTransaction {
    fn event_id(&self) -> EventId {
        self.inner.event_id()
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        if this.fault == Fault::Commit {
            this.inner.rollback().await?;
            return Err(injected("commit"));
        }
        this.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

use async_trait::async_trait;
use boxoffice_core::repository::{
    BookingLedger, EventTransaction, InventoryStore, StoreResult, TicketStore,
};
use boxoffice_shared::{Booking, BookingId, BookingStatus, Event, EventId, EventStatus, NewBooking};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// An event row together with its booking rows.
#[derive(Debug, Clone)]
struct EventRecord {
    event: Event,
    bookings: Vec<Booking>,
}

/// In-memory events and booking ledger, for development mode and tests.
///
/// Each event sits behind its own async mutex, so transactions on different
/// events never wait on each other. A transaction works on a staged copy of
/// the record and only writes it back on commit.
#[derive(Clone)]
pub struct InMemoryTicketStore {
    events: Arc<RwLock<HashMap<EventId, Arc<Mutex<EventRecord>>>>>,
    next_event_id: Arc<AtomicI64>,
    next_booking_id: Arc<AtomicI64>,
    lock_timeout: Duration,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
            next_event_id: Arc::new(AtomicI64::new(1)),
            next_booking_id: Arc::new(AtomicI64::new(1)),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    async fn record(&self, event_id: EventId) -> Option<Arc<Mutex<EventRecord>>> {
        self.events.read().await.get(&event_id).cloned()
    }

    /// Committed copy of an event and every booking it has ever had.
    pub async fn snapshot(&self, event_id: EventId) -> Option<(Event, Vec<Booking>)> {
        let record = self.record(event_id).await?;
        let record = record.lock().await;
        Some((record.event.clone(), record.bookings.clone()))
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create_event(&self, total_tickets: i32) -> StoreResult<Event> {
        let now = Utc::now();
        let event = Event {
            id: EventId(self.next_event_id.fetch_add(1, Ordering::SeqCst)),
            total_tickets,
            available_tickets: total_tickets,
            created_at: now,
            updated_at: now,
        };

        let record = EventRecord {
            event: event.clone(),
            bookings: Vec::new(),
        };
        self.events
            .write()
            .await
            .insert(event.id, Arc::new(Mutex::new(record)));

        Ok(event)
    }

    async fn begin(&self, event_id: EventId) -> StoreResult<Box<dyn EventTransaction>> {
        Ok(Box::new(MemoryEventTransaction {
            event_id,
            record: self.record(event_id).await,
            guard: None,
            staged: None,
            next_booking_id: self.next_booking_id.clone(),
            lock_timeout: self.lock_timeout,
        }))
    }

    async fn event_status(&self, event_id: EventId) -> StoreResult<Option<EventStatus>> {
        let Some(record) = self.record(event_id).await else {
            return Ok(None);
        };
        let record = record.lock().await;

        let waiting_list_count = record
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Waiting)
            .count();

        Ok(Some(EventStatus {
            event_id,
            available_tickets: record.event.available_tickets,
            total_tickets: record.event.total_tickets,
            waiting_list_count: i64::try_from(waiting_list_count)?,
        }))
    }

    async fn latest_booking(&self, event_id: EventId, user_id: &str) -> StoreResult<Option<Booking>> {
        let Some(record) = self.record(event_id).await else {
            return Ok(None);
        };
        let record = record.lock().await;

        Ok(record
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .max_by_key(|b| (b.created_at, b.id))
            .cloned())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryEventTransaction {
    event_id: EventId,
    record: Option<Arc<Mutex<EventRecord>>>,
    guard: Option<OwnedMutexGuard<EventRecord>>,
    staged: Option<EventRecord>,
    next_booking_id: Arc<AtomicI64>,
    lock_timeout: Duration,
}

impl MemoryEventTransaction {
    fn staged(&mut self) -> StoreResult<&mut EventRecord> {
        let event_id = self.event_id;
        self.staged
            .as_mut()
            .ok_or_else(|| format!("event {} is not locked by this transaction", event_id).into())
    }
}

#[async_trait]
impl InventoryStore for MemoryEventTransaction {
    async fn lock_event(&mut self) -> StoreResult<Option<Event>> {
        if let Some(staged) = &self.staged {
            return Ok(Some(staged.event.clone()));
        }
        let Some(record) = self.record.clone() else {
            return Ok(None);
        };

        let guard = tokio::time::timeout(self.lock_timeout, record.lock_owned())
            .await
            .map_err(|_| format!("lock timeout on event {}", self.event_id))?;

        let staged = (*guard).clone();
        let event = staged.event.clone();
        self.guard = Some(guard);
        self.staged = Some(staged);
        Ok(Some(event))
    }

    async fn adjust_available(&mut self, delta: i32) -> StoreResult<()> {
        let event_id = self.event_id;
        let event = &mut self.staged()?.event;

        let available = event.available_tickets + delta;
        if !(0..=event.total_tickets).contains(&available) {
            return Err(format!(
                "adjusting available tickets of event {} by {} would leave capacity bounds",
                event_id, delta
            )
            .into());
        }
        event.available_tickets = available;
        event.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl BookingLedger for MemoryEventTransaction {
    async fn active_booking(&mut self, user_id: &str) -> StoreResult<Option<Booking>> {
        Ok(self
            .staged()?
            .bookings
            .iter()
            .find(|b| b.user_id == user_id && b.is_active())
            .cloned())
    }

    async fn waiting_count(&mut self) -> StoreResult<i64> {
        let count = self
            .staged()?
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Waiting)
            .count();
        Ok(i64::try_from(count)?)
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking> {
        let id = BookingId(self.next_booking_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let booking = Booking {
            id,
            event_id: booking.event_id,
            user_id: booking.user_id,
            status: booking.status,
            waiting_position: booking.waiting_position,
            created_at: now,
            updated_at: now,
        };

        self.staged()?.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn update_status(
        &mut self,
        booking_id: BookingId,
        status: BookingStatus,
        waiting_position: Option<i32>,
    ) -> StoreResult<()> {
        let event_id = self.event_id;
        let booking = self
            .staged()?
            .bookings
            .iter_mut()
            .find(|b| b.id == booking_id)
            .ok_or_else(|| format!("booking {} not found in event {}", booking_id, event_id))?;

        booking.status = status;
        booking.waiting_position = waiting_position;
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn queue_head(&mut self) -> StoreResult<Option<Booking>> {
        Ok(self
            .staged()?
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Waiting)
            .min_by_key(|b| (b.waiting_position, b.created_at))
            .cloned())
    }

    async fn close_gap(&mut self, position: i32) -> StoreResult<u64> {
        let now = Utc::now();
        let mut moved = 0;

        for booking in self.staged()?.bookings.iter_mut() {
            if booking.status != BookingStatus::Waiting {
                continue;
            }
            if let Some(current) = booking.waiting_position.filter(|p| *p > position) {
                booking.waiting_position = Some(current - 1);
                booking.updated_at = now;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[async_trait]
impl EventTransaction for MemoryEventTransaction {
    fn event_id(&self) -> EventId {
        self.event_id
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        if let (Some(mut guard), Some(staged)) = (this.guard, this.staged) {
            *guard = staged;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        // Dropping the staged copy discards every write; the guard release
        // lets the next transaction in.
        Ok(())
    }
}

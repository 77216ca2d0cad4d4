use async_trait::async_trait;
use boxoffice_shared::{Booking, BookingId, BookingStatus, Event, EventId, EventStatus, NewBooking};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage for events and their booking ledger.
///
/// Every mutation of an existing event goes through [`TicketStore::begin`];
/// the plain methods here are either inserts of fresh rows or read-only
/// snapshot queries.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create_event(&self, total_tickets: i32) -> StoreResult<Event>;

    /// Open a transaction scoped to a single event's rows.
    ///
    /// Nothing is locked until [`InventoryStore::lock_event`] is called.
    /// Dropping the returned transaction without committing rolls it back.
    async fn begin(&self, event_id: EventId) -> StoreResult<Box<dyn EventTransaction>>;

    /// Capacity and waiting-list size read from one consistent snapshot.
    async fn event_status(&self, event_id: EventId) -> StoreResult<Option<EventStatus>>;

    /// Newest booking for the pair by creation order, whatever its status.
    async fn latest_booking(&self, event_id: EventId, user_id: &str) -> StoreResult<Option<Booking>>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Ticket counts of the event a transaction is scoped to.
#[async_trait]
pub trait InventoryStore: Send {
    /// Lock the event row for the rest of the transaction and read it.
    /// Returns `None` if the event does not exist.
    async fn lock_event(&mut self) -> StoreResult<Option<Event>>;

    /// Move `available_tickets` by `delta`. Fails without writing if the
    /// result would leave `[0, total_tickets]`.
    async fn adjust_available(&mut self, delta: i32) -> StoreResult<()>;
}

/// Booking records of the event a transaction is scoped to.
#[async_trait]
pub trait BookingLedger: Send {
    /// The user's non-cancelled booking, if any.
    async fn active_booking(&mut self, user_id: &str) -> StoreResult<Option<Booking>>;

    async fn waiting_count(&mut self) -> StoreResult<i64>;

    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking>;

    async fn update_status(
        &mut self,
        booking_id: BookingId,
        status: BookingStatus,
        waiting_position: Option<i32>,
    ) -> StoreResult<()>;

    /// Waiting booking with the smallest position.
    async fn queue_head(&mut self) -> StoreResult<Option<Booking>>;

    /// Decrement every waiting position greater than `position`.
    /// Returns the number of bookings moved up.
    async fn close_gap(&mut self, position: i32) -> StoreResult<u64>;
}

/// One atomic unit of work against one event.
#[async_trait]
pub trait EventTransaction: InventoryStore + BookingLedger {
    fn event_id(&self) -> EventId;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

use async_trait::async_trait;
use boxoffice_core::repository::{
    BookingLedger, EventTransaction, InventoryStore, StoreResult, TicketStore,
};
use boxoffice_shared::{Booking, BookingId, BookingStatus, Event, EventId, EventStatus, NewBooking};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

/// Postgres-backed events and booking ledger.
///
/// Transactions serialize on the event row (`SELECT ... FOR UPDATE`), so
/// the default READ COMMITTED isolation is enough: every writer of an
/// event's rows holds that lock until it commits or rolls back.
pub struct PostgresTicketStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PostgresTicketStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    total_tickets: i32,
    available_tickets: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: EventId(row.id),
            total_tickets: row.total_tickets,
            available_tickets: row.available_tickets,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    event_id: i64,
    user_id: String,
    status: String,
    waiting_position: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn try_into_booking(self) -> StoreResult<Booking> {
        Ok(Booking {
            id: BookingId(self.id),
            event_id: EventId(self.event_id),
            user_id: self.user_id,
            status: self.status.parse::<BookingStatus>()?,
            waiting_position: self.waiting_position,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn create_event(&self, total_tickets: i32) -> StoreResult<Event> {
        let row: EventRow = sqlx::query_as(
            r#"
            INSERT INTO events (total_tickets, available_tickets)
            VALUES ($1, $1)
            RETURNING id, total_tickets, available_tickets, created_at, updated_at
            "#,
        )
        .bind(total_tickets)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn begin(&self, event_id: EventId) -> StoreResult<Box<dyn EventTransaction>> {
        let mut tx = self.pool.begin().await?;

        // SET LOCAL does not accept bind parameters.
        sqlx::query(&format!("SET LOCAL lock_timeout = {}", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgEventTransaction { tx, event_id }))
    }

    async fn event_status(&self, event_id: EventId) -> StoreResult<Option<EventStatus>> {
        // One statement, one snapshot: the count can't tear against the event row.
        let row: Option<(i64, i32, i32, i64)> = sqlx::query_as(
            r#"
            SELECT e.id, e.total_tickets, e.available_tickets,
                   (SELECT COUNT(*) FROM bookings b
                     WHERE b.event_id = e.id AND b.status = 'waiting') AS waiting_list_count
            FROM events e
            WHERE e.id = $1
            "#,
        )
        .bind(event_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, total_tickets, available_tickets, waiting_list_count)| EventStatus {
            event_id: EventId(id),
            available_tickets,
            total_tickets,
            waiting_list_count,
        }))
    }

    async fn latest_booking(&self, event_id: EventId, user_id: &str) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, event_id, user_id, status, waiting_position, created_at, updated_at
            FROM bookings
            WHERE event_id = $1 AND user_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(event_id.0)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BookingRow::try_into_booking).transpose()
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgEventTransaction {
    tx: Transaction<'static, Postgres>,
    event_id: EventId,
}

#[async_trait]
impl InventoryStore for PgEventTransaction {
    async fn lock_event(&mut self) -> StoreResult<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(
            r#"
            SELECT id, total_tickets, available_tickets, created_at, updated_at
            FROM events
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(self.event_id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Event::from))
    }

    async fn adjust_available(&mut self, delta: i32) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE events
            SET available_tickets = available_tickets + $2, updated_at = NOW()
            WHERE id = $1 AND available_tickets + $2 BETWEEN 0 AND total_tickets
            "#,
        )
        .bind(self.event_id.0)
        .bind(delta)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(format!(
                "adjusting available tickets of event {} by {} would leave capacity bounds",
                self.event_id, delta
            )
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl BookingLedger for PgEventTransaction {
    async fn active_booking(&mut self, user_id: &str) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, event_id, user_id, status, waiting_position, created_at, updated_at
            FROM bookings
            WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'
            LIMIT 1
            "#,
        )
        .bind(self.event_id.0)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(BookingRow::try_into_booking).transpose()
    }

    async fn waiting_count(&mut self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE event_id = $1 AND status = 'waiting'",
        )
        .bind(self.event_id.0)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking> {
        let row: BookingRow = sqlx::query_as(
            r#"
            INSERT INTO bookings (event_id, user_id, status, waiting_position)
            VALUES ($1, $2, $3, $4)
            RETURNING id, event_id, user_id, status, waiting_position, created_at, updated_at
            "#,
        )
        .bind(booking.event_id.0)
        .bind(&booking.user_id)
        .bind(booking.status.as_str())
        .bind(booking.waiting_position)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into_booking()
    }

    async fn update_status(
        &mut self,
        booking_id: BookingId,
        status: BookingStatus,
        waiting_position: Option<i32>,
    ) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1, waiting_position = $2, updated_at = NOW()
            WHERE id = $3 AND event_id = $4
            "#,
        )
        .bind(status.as_str())
        .bind(waiting_position)
        .bind(booking_id.0)
        .bind(self.event_id.0)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(format!("booking {} not found in event {}", booking_id, self.event_id).into());
        }
        Ok(())
    }

    async fn queue_head(&mut self) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, event_id, user_id, status, waiting_position, created_at, updated_at
            FROM bookings
            WHERE event_id = $1 AND status = 'waiting'
            ORDER BY waiting_position ASC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(self.event_id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(BookingRow::try_into_booking).transpose()
    }

    async fn close_gap(&mut self, position: i32) -> StoreResult<u64> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE bookings
            SET waiting_position = waiting_position - 1, updated_at = NOW()
            WHERE event_id = $1 AND status = 'waiting' AND waiting_position > $2
            "#,
        )
        .bind(self.event_id.0)
        .bind(position)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }
}

#[async_trait]
impl EventTransaction for PgEventTransaction {
    fn event_id(&self) -> EventId {
        self.event_id
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

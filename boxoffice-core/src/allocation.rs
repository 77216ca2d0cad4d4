//! Ticket allocation and waiting-list promotion.
//!
//! Every mutating operation runs inside one [`EventTransaction`]: the event
//! row is locked first, preconditions are checked before any write, and the
//! transaction is either committed as a whole or rolled back. The engine
//! keeps no state between calls.

use std::sync::Arc;

use boxoffice_shared::{Booking, BookingId, BookingStatus, Event, EventId, EventStatus, NewBooking};
use tracing::{debug, error, info};

use crate::repository::{EventTransaction, TicketStore};
use crate::validation::{validate_total_tickets, validate_user_id};
use crate::{CoreError, CoreResult};

/// What a cancellation did to the rest of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A confirmed holder left and nobody was waiting: the ticket went back to the pool.
    Released,
    /// A confirmed holder left and the head of the waiting list took the ticket.
    Promoted(BookingId),
    /// A waiting booking left the queue. Capacity is untouched.
    Withdrawn,
}

impl CancelOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CancelOutcome::Released => "released",
            CancelOutcome::Promoted(_) => "promoted",
            CancelOutcome::Withdrawn => "withdrawn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub booking_id: BookingId,
    pub previous_status: BookingStatus,
    pub outcome: CancelOutcome,
}

#[derive(Clone)]
pub struct AllocationEngine {
    store: Arc<dyn TicketStore>,
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Create an event with every ticket available.
    pub async fn initialize(&self, total_tickets: i64) -> CoreResult<Event> {
        let total_tickets = validate_total_tickets(total_tickets)?;
        let event = self.store.create_event(total_tickets).await?;

        info!("Event initialized with ID: {} ({} tickets)", event.id, event.total_tickets);
        Ok(event)
    }

    /// Confirm a ticket if one is left, otherwise queue the user at the back
    /// of the waiting list.
    pub async fn book(&self, event_id: EventId, user_id: &str) -> CoreResult<Booking> {
        let user_id = validate_user_id(user_id)?;

        let mut tx = self.store.begin(event_id).await?;
        let result = allocate(&mut *tx, user_id).await;
        let booking = finish(tx, result).await?;

        match booking.waiting_position {
            Some(position) => info!(
                "User {} added to waiting list for event {} at position {}",
                user_id, event_id, position
            ),
            None => info!("Ticket booked for user {} in event {}", user_id, event_id),
        }
        Ok(booking)
    }

    /// Cancel the user's active booking. A freed ticket goes to the head of
    /// the waiting list if there is one, otherwise back to the pool.
    pub async fn cancel(&self, event_id: EventId, user_id: &str) -> CoreResult<Cancellation> {
        let user_id = validate_user_id(user_id)?;

        let mut tx = self.store.begin(event_id).await?;
        let result = release(&mut *tx, user_id).await;
        let cancellation = finish(tx, result).await?;

        info!("Booking cancelled for user {} in event {}", user_id, event_id);
        match cancellation.outcome {
            CancelOutcome::Promoted(promoted) => {
                info!("Promoted booking {} from waiting list in event {}", promoted, event_id)
            }
            CancelOutcome::Released => {
                info!("Ticket returned to pool for event {}", event_id)
            }
            CancelOutcome::Withdrawn => {}
        }
        Ok(cancellation)
    }

    pub async fn status(&self, event_id: EventId) -> CoreResult<EventStatus> {
        self.store
            .event_status(event_id)
            .await?
            .ok_or_else(event_not_found)
    }

    /// Most recent booking for the pair, including cancelled ones.
    pub async fn booking_status(&self, event_id: EventId, user_id: &str) -> CoreResult<Booking> {
        let user_id = validate_user_id(user_id)?;

        self.store
            .latest_booking(event_id, user_id)
            .await?
            .ok_or_else(booking_not_found)
    }
}

async fn allocate(tx: &mut dyn EventTransaction, user_id: &str) -> CoreResult<Booking> {
    let event = tx.lock_event().await?.ok_or_else(event_not_found)?;

    if tx.active_booking(user_id).await?.is_some() {
        return Err(CoreError::Conflict(
            "User already has a booking for this event".to_string(),
        ));
    }

    if !event.is_sold_out() {
        tx.adjust_available(-1).await?;
        return Ok(tx.insert_booking(NewBooking::confirmed(event.id, user_id)).await?);
    }

    let waiting = tx.waiting_count().await?;
    let position = i32::try_from(waiting + 1).map_err(|_| {
        CoreError::TransactionFailure(format!("waiting list for event {} is full", event.id))
    })?;
    Ok(tx
        .insert_booking(NewBooking::waiting(event.id, user_id, position))
        .await?)
}

async fn release(tx: &mut dyn EventTransaction, user_id: &str) -> CoreResult<Cancellation> {
    // Locking the event row serializes this with concurrent bookings that
    // compute their waiting position from the current queue length.
    if tx.lock_event().await?.is_none() {
        return Err(booking_not_found());
    }

    let booking = tx
        .active_booking(user_id)
        .await?
        .ok_or_else(booking_not_found)?;

    ensure_transition(booking.status, BookingStatus::Cancelled)?;
    tx.update_status(booking.id, BookingStatus::Cancelled, None)
        .await?;

    let outcome = match booking.status {
        BookingStatus::Confirmed => match tx.queue_head().await? {
            Some(next) => {
                let position = next
                    .waiting_position
                    .ok_or_else(|| missing_position(next.id))?;
                ensure_transition(next.status, BookingStatus::Confirmed)?;
                tx.update_status(next.id, BookingStatus::Confirmed, None)
                    .await?;
                tx.close_gap(position).await?;
                CancelOutcome::Promoted(next.id)
            }
            None => {
                tx.adjust_available(1).await?;
                CancelOutcome::Released
            }
        },
        BookingStatus::Waiting => {
            let position = booking
                .waiting_position
                .ok_or_else(|| missing_position(booking.id))?;
            tx.close_gap(position).await?;
            CancelOutcome::Withdrawn
        }
        BookingStatus::Cancelled => {
            return Err(CoreError::TransactionFailure(format!(
                "booking {} is already cancelled",
                booking.id
            )))
        }
    };

    Ok(Cancellation {
        booking_id: booking.id,
        previous_status: booking.status,
        outcome,
    })
}

/// Commit on success, roll back on any error. The error that aborted the
/// transaction is what the caller sees, even if the rollback itself fails.
async fn finish<T>(tx: Box<dyn EventTransaction>, result: CoreResult<T>) -> CoreResult<T> {
    let event_id = tx.event_id();

    match result {
        Ok(value) => {
            if let Err(commit_err) = tx.commit().await {
                error!("Commit failed for event {}: {}", event_id, commit_err);
                return Err(commit_err.into());
            }
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("Rollback failed for event {}: {}", event_id, rollback_err);
            }
            match &err {
                CoreError::TransactionFailure(msg) => {
                    error!("Transaction for event {} rolled back: {}", event_id, msg)
                }
                other => debug!("Request for event {} rejected: {}", event_id, other),
            }
            Err(err)
        }
    }
}

fn ensure_transition(from: BookingStatus, to: BookingStatus) -> CoreResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::TransactionFailure(format!(
            "invalid booking transition: {from} -> {to}"
        )))
    }
}

fn missing_position(booking_id: BookingId) -> CoreError {
    CoreError::TransactionFailure(format!("waiting booking {} has no position", booking_id))
}

fn event_not_found() -> CoreError {
    CoreError::NotFound("Event not found".to_string())
}

fn booking_not_found() -> CoreError {
    CoreError::NotFound("Booking not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_guard() {
        assert!(ensure_transition(BookingStatus::Confirmed, BookingStatus::Cancelled).is_ok());
        assert!(ensure_transition(BookingStatus::Waiting, BookingStatus::Confirmed).is_ok());
        assert!(matches!(
            ensure_transition(BookingStatus::Cancelled, BookingStatus::Confirmed),
            Err(CoreError::TransactionFailure(_))
        ));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(CancelOutcome::Released.label(), "released");
        assert_eq!(CancelOutcome::Promoted(BookingId(4)).label(), "promoted");
        assert_eq!(CancelOutcome::Withdrawn.label(), "withdrawn");
    }
}

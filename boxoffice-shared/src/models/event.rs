use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a ticketed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A finite ticket inventory.
///
/// `total_tickets` is fixed at creation. `available_tickets` only moves
/// inside an allocation transaction and always equals `total_tickets`
/// minus the number of confirmed bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub total_tickets: i32,
    pub available_tickets: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Tickets currently held by confirmed bookings.
    pub fn confirmed_tickets(&self) -> i32 {
        self.total_tickets - self.available_tickets
    }

    pub fn is_sold_out(&self) -> bool {
        self.available_tickets <= 0
    }
}

/// Read-only capacity summary returned by status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatus {
    pub event_id: EventId,
    pub available_tickets: i32,
    pub total_tickets: i32,
    pub waiting_list_count: i64,
}

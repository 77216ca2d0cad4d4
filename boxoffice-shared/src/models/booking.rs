use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::event::EventId;

/// Identifier of a booking record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub i64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Waiting,
    Cancelled,
}

impl BookingStatus {
    /// Allowed moves: `waiting -> confirmed` (promotion) and
    /// `confirmed | waiting -> cancelled`. `cancelled` is terminal.
    pub fn can_transition_to(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Waiting, Confirmed) | (Waiting, Cancelled) | (Confirmed, Cancelled)
        )
    }

    pub fn is_active(self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Waiting => "waiting",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "waiting" => Ok(BookingStatus::Waiting),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// One user's claim on an event, either holding a ticket or queued for one.
///
/// Records are never deleted; cancelling only flips `status`, so the ledger
/// keeps the full history of every `(event_id, user_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub event_id: EventId,
    pub user_id: String,
    pub status: BookingStatus,
    /// 1-based place in the waiting list. Only set while `status` is `waiting`.
    pub waiting_position: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Insert payload for the booking ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub event_id: EventId,
    pub user_id: String,
    pub status: BookingStatus,
    pub waiting_position: Option<i32>,
}

impl NewBooking {
    pub fn confirmed(event_id: EventId, user_id: impl Into<String>) -> Self {
        Self {
            event_id,
            user_id: user_id.into(),
            status: BookingStatus::Confirmed,
            waiting_position: None,
        }
    }

    pub fn waiting(event_id: EventId, user_id: impl Into<String>, position: i32) -> Self {
        Self {
            event_id,
            user_id: user_id.into(),
            status: BookingStatus::Waiting,
            waiting_position: Some(position),
        }
    }
}

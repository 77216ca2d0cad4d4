pub mod models;

pub use models::booking::{Booking, BookingId, BookingStatus, NewBooking, ParseStatusError};
pub use models::event::{Event, EventId, EventStatus};

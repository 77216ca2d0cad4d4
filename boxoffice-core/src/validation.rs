//! Request field checks shared by every entry point into the engine.

use crate::{CoreError, CoreResult};

pub const MAX_USER_ID_LEN: usize = 255;

/// Capacity must be a positive `i32`; zero capacity is rejected outright.
pub fn validate_total_tickets(total_tickets: i64) -> CoreResult<i32> {
    if total_tickets < 1 {
        return Err(CoreError::InvalidInput(
            "Total tickets must be a positive integer".to_string(),
        ));
    }
    i32::try_from(total_tickets).map_err(|_| {
        CoreError::InvalidInput(format!("Total tickets must not exceed {}", i32::MAX))
    })
}

pub fn validate_user_id(user_id: &str) -> CoreResult<&str> {
    if user_id.trim().is_empty() {
        return Err(CoreError::InvalidInput("User ID is required".to_string()));
    }
    if user_id.chars().count() > MAX_USER_ID_LEN {
        return Err(CoreError::InvalidInput("User ID is too long".to_string()));
    }
    Ok(user_id)
}

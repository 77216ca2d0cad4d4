pub mod allocation;
pub mod repository;
pub mod validation;

pub use allocation::{AllocationEngine, CancelOutcome, Cancellation};
pub use repository::{BookingLedger, EventTransaction, InventoryStore, StoreError, StoreResult, TicketStore};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Transaction failed: {0}")]
    TransactionFailure(String),
}

impl CoreError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::TransactionFailure(_) => "transaction_failure",
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::TransactionFailure(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_become_transaction_failures() {
        let store_err: StoreError = "lock timeout".into();
        let err = CoreError::from(store_err);

        assert!(matches!(err, CoreError::TransactionFailure(ref msg) if msg == "lock timeout"));
        assert_eq!(err.kind(), "transaction_failure");
    }

    #[test]
    fn test_client_errors_display_their_message() {
        assert_eq!(CoreError::NotFound("Event not found".into()).to_string(), "Event not found");
        assert_eq!(
            CoreError::Conflict("User already has a booking for this event".into()).to_string(),
            "User already has a booking for this event"
        );
    }
}

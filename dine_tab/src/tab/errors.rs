//! Tab error types.

use super::models::{TabId, TabStatus};
use thiserror::Error;

/// Tab errors
#[derive(Debug, Error)]
pub enum TabError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Store did not answer in time
    ///
    /// Only raised when nothing was written: reads bounded on the client, or
    /// writes that Postgres cancelled and rolled back.
    #[error("Store operation timed out")]
    Timeout,

    /// A non-terminal tab already exists for the table
    #[error("Table {table_id} at restaurant {restaurant_id} already has an open tab")]
    TableAlreadyOccupied {
        restaurant_id: String,
        table_id: String,
    },

    /// Tab not found
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    /// Table not registered for the restaurant
    #[error("Table {table_id} not found at restaurant {restaurant_id}")]
    TableNotFound {
        restaurant_id: String,
        table_id: String,
    },

    /// Presented token does not match the tab's capability token
    #[error("Invalid tab token")]
    InvalidToken,

    /// Not enough free seats at commit time
    #[error("Capacity exceeded: {occupied}/{capacity} seats taken, {requested} requested")]
    CapacityExceeded {
        capacity: u32,
        occupied: u32,
        requested: u32,
    },

    /// Payment already in progress (or tab no longer open for payment)
    #[error("Tab {tab_id} is already locked for payment")]
    AlreadyLocked { tab_id: TabId },

    /// Requested lifecycle transition is not allowed from the current status
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: TabStatus, to: TabStatus },

    /// Tab is not accepting new guests
    #[error("Tab is {0} and not accepting guests")]
    NotAcceptingGuests(TabStatus),

    /// Optimistic retries exhausted
    #[error("Transaction conflict after {attempts} attempts")]
    TransactionConflict { attempts: u32 },

    /// Malformed or out-of-range request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TabError {
    /// Get a client-safe error message that doesn't leak internals
    ///
    /// Store errors are sanitized, and restaurant/table identifiers are kept
    /// out of messages that might reach a guest device.
    pub fn client_message(&self) -> String {
        match self {
            TabError::Database(_) => "Internal server error".to_string(),
            TabError::Timeout => "Service temporarily unavailable".to_string(),
            TabError::TableAlreadyOccupied { .. } => "Table already has an open tab".to_string(),
            TabError::TableNotFound { .. } => "Table not found".to_string(),
            TabError::TabNotFound(_) => "Tab not found".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether resubmitting the same logical request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TabError::TransactionConflict { .. } | TabError::Timeout
        )
    }
}

impl From<sqlx::Error> for TabError {
    fn from(err: sqlx::Error) -> Self {
        let timed_out = match &err {
            sqlx::Error::Database(db) => is_server_timeout(db.code().as_deref()),
            _ => false,
        };
        if timed_out {
            TabError::Timeout
        } else {
            TabError::Database(err)
        }
    }
}

/// `57014` query_canceled (statement_timeout) or `25P03`
/// idle_in_transaction_session_timeout. Postgres rolls back in both cases.
fn is_server_timeout(sqlstate: Option<&str>) -> bool {
    matches!(sqlstate, Some("57014" | "25P03"))
}

impl From<crate::db::timeouts::TimeoutError> for TabError {
    fn from(err: crate::db::timeouts::TimeoutError) -> Self {
        match err {
            crate::db::timeouts::TimeoutError::Timeout(_) => TabError::Timeout,
            crate::db::timeouts::TimeoutError::Database(e) => e.into(),
        }
    }
}

/// Result type for tab operations
pub type TabResult<T> = Result<T, TabError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_client_message_hides_store_details() {
        let err = TabError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.client_message(), "Internal server error");

        let err = TabError::TableAlreadyOccupied {
            restaurant_id: "bistro".to_string(),
            table_id: "T10".to_string(),
        };
        assert!(!err.client_message().contains("bistro"));
    }

    #[test]
    fn test_business_errors_are_exposed() {
        let err = TabError::CapacityExceeded {
            capacity: 4,
            occupied: 4,
            requested: 1,
        };
        assert!(err.client_message().contains("4/4"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_is_retryable() {
        assert!(TabError::TransactionConflict { attempts: 5 }.is_retryable());
        assert!(!TabError::TabNotFound(Uuid::new_v4()).is_retryable());
        assert!(!TabError::InvalidToken.is_retryable());
    }

    #[test]
    fn test_server_cancellation_maps_to_timeout() {
        assert!(is_server_timeout(Some("57014")));
        assert!(is_server_timeout(Some("25P03")));
        assert!(!is_server_timeout(Some("40001")));
        assert!(!is_server_timeout(None));
    }

    #[test]
    fn test_client_side_store_errors_stay_database_errors() {
        let err = TabError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, TabError::Database(_)));
        assert!(!err.is_retryable());
        assert!(TabError::Timeout.is_retryable());
    }
}

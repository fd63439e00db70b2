//! Mapping of tab errors onto HTTP responses.

use axum::{Json, http::StatusCode};
use dine_tab::tab::{TabError, TabId};
use serde::{Deserialize, Serialize};

use super::request_id::RequestId;
use crate::{logging::log_security_event, metrics};

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Client-safe message
    pub error: String,
}

/// Rejection type shared by the handlers
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// HTTP status for a tab error
pub fn status_for(err: &TabError) -> StatusCode {
    match err {
        TabError::CapacityExceeded { .. } | TabError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        TabError::InvalidToken => StatusCode::FORBIDDEN,
        TabError::TabNotFound(_) | TabError::TableNotFound { .. } => StatusCode::NOT_FOUND,
        TabError::TableAlreadyOccupied { .. }
        | TabError::AlreadyLocked { .. }
        | TabError::InvalidStateTransition { .. }
        | TabError::NotAcceptingGuests(_)
        | TabError::TransactionConflict { .. } => StatusCode::CONFLICT,
        TabError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        TabError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Stable error code for a tab error
pub fn error_code(err: &TabError) -> &'static str {
    match err {
        TabError::Database(_) => "INTERNAL",
        TabError::Timeout => "UNAVAILABLE",
        TabError::TableAlreadyOccupied { .. } => "TABLE_ALREADY_OCCUPIED",
        TabError::TabNotFound(_) => "TAB_NOT_FOUND",
        TabError::TableNotFound { .. } => "TABLE_NOT_FOUND",
        TabError::InvalidToken => "INVALID_TOKEN",
        TabError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
        TabError::AlreadyLocked { .. } => "ALREADY_LOCKED",
        TabError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
        TabError::NotAcceptingGuests(_) => "NOT_ACCEPTING_GUESTS",
        TabError::TransactionConflict { .. } => "TRANSACTION_CONFLICT",
        TabError::InvalidRequest(_) => "INVALID_REQUEST",
    }
}

/// Build an error response without leaking store internals
pub fn error_response(err: &TabError) -> ApiError {
    let status = status_for(err);
    let code = error_code(err);

    if status.is_server_error() {
        tracing::error!(code = code, "Request failed: {}", err);
    } else {
        tracing::debug!(code = code, "Request rejected: {}", err);
    }
    metrics::http_errors_total(code);

    (
        status,
        Json(ErrorResponse {
            code: code.to_string(),
            error: err.client_message(),
        }),
    )
}

/// Error response for a failed tab operation, with security and conflict bookkeeping
pub(crate) fn reject(
    operation: &'static str,
    tab_id: Option<TabId>,
    request_id: &RequestId,
    err: TabError,
) -> ApiError {
    match &err {
        TabError::InvalidToken => log_security_event(
            "invalid_tab_token",
            tab_id,
            Some(request_id.as_str()),
            &format!("Tab token rejected on {operation}"),
        ),
        TabError::TransactionConflict { .. } => metrics::tab_transaction_conflicts_total(operation),
        _ => {}
    }
    error_response(&err)
}

/// Plain error response for failures outside the tab domain
pub(crate) fn plain_error(status: StatusCode, code: &'static str, message: &str) -> ApiError {
    metrics::http_errors_total(code);
    (
        status,
        Json(ErrorResponse {
            code: code.to_string(),
            error: message.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dine_tab::tab::TabStatus;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&TabError::CapacityExceeded {
                capacity: 4,
                occupied: 4,
                requested: 1
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&TabError::InvalidToken), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&TabError::TabNotFound(uuid::Uuid::nil())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&TabError::InvalidStateTransition {
                from: TabStatus::Active,
                to: TabStatus::Completed
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&TabError::TransactionConflict { attempts: 8 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&TabError::Database(sqlx_error())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_are_sanitized() {
        let (status, Json(body)) = error_response(&TabError::Database(sqlx_error()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "INTERNAL");
        assert!(!body.error.contains("pool"));
    }

    #[test]
    fn test_timeout_is_a_retryable_unavailable() {
        let err = TabError::Timeout;
        let (status, Json(body)) = error_response(&err);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.code, "UNAVAILABLE");
        assert!(err.is_retryable());
    }

    fn sqlx_error() -> sqlx::Error {
        sqlx::Error::PoolTimedOut
    }
}

//! Admin key middleware for administrative endpoints.
//!
//! Expects the configured key in the `x-admin-key` header:
//!
//! ```text
//! x-admin-key: 3f1c...
//! ```

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::AppState;
use super::request_id::RequestId;
use crate::logging::log_security_event;

/// Header carrying the admin key
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Reject requests without the configured admin key.
///
/// - **Missing header**: Returns `401 Unauthorized`
/// - **Wrong key**: Returns `401 Unauthorized` and logs a security event
pub async fn admin_key_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    let Some(presented) = presented else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let expected = state.security.admin_api_key.as_bytes();
    if bool::from(expected.ct_eq(presented.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        let request_id = request.extensions().get::<RequestId>();
        log_security_event(
            "invalid_admin_key",
            None,
            request_id.map(RequestId::as_str),
            "Administrative request with wrong key",
        );
        Err(StatusCode::UNAUTHORIZED)
    }
}

//! Structured logging configuration.
//!
//! The library crate logs through the `log` facade; the subscriber installed
//! here picks those records up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG` (default: `info,sqlx=warn,hyper=warn`).
///
/// # Example
///
/// ```no_run
/// use dt_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `tab_id` - Tab the event concerns, if known
/// * `request_id` - Correlating request id, if known
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use dt_server::logging::log_security_event;
///
/// log_security_event("invalid_tab_token", None, Some("req-42"), "Token mismatch on join");
/// ```
pub fn log_security_event(
    event_type: &str,
    tab_id: Option<uuid::Uuid>,
    request_id: Option<&str>,
    message: &str,
) {
    let tab_id = tab_id.map(|id| id.to_string());
    tracing::warn!(
        event_type = event_type,
        tab_id = tab_id.as_deref(),
        request_id = request_id,
        "SECURITY: {}",
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_security_event() {
        // Just ensure it doesn't panic without a subscriber
        log_security_event(
            "bad_callback_signature",
            Some(uuid::Uuid::new_v4()),
            Some("req-1"),
            "Test message",
        );
        log_security_event("invalid_admin_key", None, None, "Test message");
    }
}

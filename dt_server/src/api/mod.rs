//! HTTP API for shared dine-in tabs.
//!
//! # Modules
//!
//! - [`tabs`]: Guest endpoints (create, join, table status, payment lock/unlock, tab detail)
//! - [`payments`]: Payment provider callback and administrative cancellation
//! - [`middleware`]: Admin key check for administrative endpoints
//! - [`request_id`]: Request correlation ids
//! - [`errors`]: Tab error to HTTP status mapping
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                                   - Health check (public)
//! POST /api/v1/create-tab                        - Open a tab (public)
//! POST /api/v1/join-table                        - Join a tab (tab token)
//! GET  /api/v1/table-status?restaurantId&tableId - Table occupancy (public)
//! GET  /api/v1/tabs/{tab_id}                     - Tab detail (x-tab-token header)
//! POST /api/v1/lock-payment                      - Start a payment (tab token)
//! POST /api/v1/unlock-payment                    - Abandon a payment (tab token)
//! POST /api/v1/payment-confirmed                 - Provider callback (x-payment-signature)
//! GET  /api/v1/restaurants/{id}/tables           - Restaurant occupancy (public)
//! POST /api/v1/cancel-tab                        - Cancel a tab (x-admin-key)
//! ```
//!
//! # CORS
//!
//! CORS is permissive: guest devices load the ordering UI from the
//! restaurant's own domain.

pub mod errors;
pub mod middleware;
pub mod payments;
pub mod request_id;
pub mod tabs;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use dine_tab::{PaymentLockCoordinator, TabManager};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::SecurityConfig;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to Arc wrappers). Handlers keep no
/// state of their own; any number of server instances can share one store.
#[derive(Clone)]
pub struct AppState {
    pub tab_manager: Arc<TabManager>,
    pub payments: Arc<PaymentLockCoordinator>,
    pub security: Arc<SecurityConfig>,
}

impl AppState {
    /// Build state around a tab manager; the payment coordinator shares its store
    pub fn new(tab_manager: TabManager, security: SecurityConfig) -> Self {
        let payments = PaymentLockCoordinator::from_manager(&tab_manager);
        Self {
            tab_manager: Arc::new(tab_manager),
            payments: Arc::new(payments),
            security: Arc::new(security),
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router(state: AppState) -> Router<AppState> {
    let guest_routes = Router::new()
        .route("/create-tab", post(tabs::create_tab))
        .route("/join-table", post(tabs::join_table))
        .route("/table-status", get(tabs::table_status))
        .route("/tabs/{tab_id}", get(tabs::get_tab))
        .route("/lock-payment", post(tabs::lock_payment))
        .route("/unlock-payment", post(tabs::unlock_payment))
        .route("/restaurants/{restaurant_id}/tables", get(tabs::list_tables));

    // Signature is checked in the handler against the posted tab id
    let provider_routes =
        Router::new().route("/payment-confirmed", post(payments::payment_confirmed));

    let admin_routes = Router::new()
        .route("/cancel-tab", post(payments::cancel_tab))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::admin_key_middleware,
        ));

    Router::new()
        .merge(guest_routes)
        .merge(provider_routes)
        .merge(admin_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the tab store answers, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","store":true,"version":"0.4.0","timestamp":"2026-10-19T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = match state.tab_manager.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            false
        }
    };

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}

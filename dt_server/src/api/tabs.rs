//! Tab API handlers.
//!
//! Guest-facing endpoints for opening a tab, joining it, checking a table and
//! starting or abandoning a payment. Everything that touches an existing tab
//! requires the tab's capability token.
//!
//! # Examples
//!
//! Open a tab:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/create-tab \
//!   -H "Content-Type: application/json" \
//!   -d '{"restaurantId": "bistro", "tableId": "T10", "capacity": 4, "customerName": "Ana"}'
//! ```
//!
//! Check a table:
//! ```bash
//! curl "http://localhost:8080/api/v1/table-status?restaurantId=bistro&tableId=T10"
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use dine_tab::tab::{
    CreateTab, TabDetails, TabError, TabId, TabStatus, TableStatus, Transition,
};
use dine_tab::table::TableOccupancy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::errors::{ApiError, error_response, reject};
use super::request_id::RequestId;
use crate::metrics;

/// Header carrying the tab token on read requests
pub const TAB_TOKEN_HEADER: &str = "x-tab-token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTabRequest {
    pub restaurant_id: String,
    pub table_id: String,
    /// Used only when the table isn't registered
    pub capacity: Option<u32>,
    /// Seats taken by the founding party (default: 1)
    pub group_size: Option<u32>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTabResponse {
    pub success: bool,
    pub tab_id: TabId,
    pub token: String,
    pub capacity: u32,
    pub occupied_seats: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTableRequest {
    pub tab_id: TabId,
    pub token: String,
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTableResponse {
    pub success: bool,
    pub occupied_seats: u32,
    pub available_seats: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatusQuery {
    pub restaurant_id: String,
    pub table_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockPaymentRequest {
    pub tab_id: TabId,
    pub token: String,
    pub payment_method: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockPaymentResponse {
    pub success: bool,
    pub status: TabStatus,
    pub payment_method: Option<String>,
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockPaymentRequest {
    pub tab_id: TabId,
    pub token: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockPaymentResponse {
    pub success: bool,
    pub unlocked: bool,
}

/// Open a tab on a table.
///
/// # Response
///
/// Returns `200 OK` with the tab id and the capability token. The token is
/// shown exactly once; guests share it (typically via QR code) to join.
///
/// # Errors
///
/// - `400 Bad Request`: Group larger than the table, or malformed ids
/// - `404 Not Found`: Unregistered table and no capacity given
/// - `409 Conflict`: Table already has an open tab
pub async fn create_tab(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<CreateTabRequest>,
) -> Result<Json<CreateTabResponse>, ApiError> {
    let create = CreateTab {
        restaurant_id: request.restaurant_id,
        table_id: request.table_id,
        capacity: request.capacity,
        group_size: request.group_size.unwrap_or(1),
        guest_name: request.customer_name,
    };

    let opened = state
        .tab_manager
        .create_tab(create)
        .await
        .map_err(|e| reject("create_tab", None, &request_id, e))?;

    metrics::tabs_created_total();
    Ok(Json(CreateTabResponse {
        success: true,
        tab_id: opened.tab_id,
        token: opened.token.as_str().to_string(),
        capacity: opened.capacity,
        occupied_seats: opened.occupied_seats,
    }))
}

/// Take a seat on an existing tab.
///
/// # Errors
///
/// - `400 Bad Request`: Tab is full
/// - `403 Forbidden`: Wrong token
/// - `404 Not Found`: Unknown tab
/// - `409 Conflict`: Tab is paying or closed, or too much contention
pub async fn join_table(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<JoinTableRequest>,
) -> Result<Json<JoinTableResponse>, ApiError> {
    match state
        .tab_manager
        .join_tab(
            request.tab_id,
            &request.token,
            request.customer_name.as_deref(),
        )
        .await
    {
        Ok(tab) => {
            metrics::tab_joins_total("accepted");
            Ok(Json(JoinTableResponse {
                success: true,
                occupied_seats: tab.occupied_seats,
                available_seats: tab.available_seats,
            }))
        }
        Err(e) => {
            metrics::tab_joins_total(match &e {
                TabError::CapacityExceeded { .. } => "full",
                _ => "rejected",
            });
            Err(reject("join_table", Some(request.tab_id), &request_id, e))
        }
    }
}

/// Whether a table has an open tab.
///
/// Public and read-only; the summary never includes the tab token.
pub async fn table_status(
    State(state): State<AppState>,
    Query(query): Query<TableStatusQuery>,
) -> Result<Json<TableStatus>, ApiError> {
    state
        .tab_manager
        .get_table_status(&query.restaurant_id, &query.table_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// Full tab detail, for token holders.
///
/// The token travels in the `x-tab-token` header so it stays out of URLs and
/// access logs.
pub async fn get_tab(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(tab_id): Path<TabId>,
    headers: HeaderMap,
) -> Result<Json<TabDetails>, ApiError> {
    let token = headers
        .get(TAB_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    state
        .tab_manager
        .get_tab(tab_id, token)
        .await
        .map(Json)
        .map_err(|e| reject("get_tab", Some(tab_id), &request_id, e))
}

/// Start a payment: `active -> payment_locked`.
///
/// # Errors
///
/// - `403 Forbidden`: Wrong token
/// - `409 Conflict`: Payment already underway, or tab closed
pub async fn lock_payment(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<LockPaymentRequest>,
) -> Result<Json<LockPaymentResponse>, ApiError> {
    let tab = state
        .payments
        .lock_for_payment(request.tab_id, &request.token, &request.payment_method)
        .await
        .map_err(|e| reject("lock_payment", Some(request.tab_id), &request_id, e))?;

    metrics::payment_transitions_total("lock", Transition::Applied);
    Ok(Json(LockPaymentResponse {
        success: true,
        status: tab.status,
        payment_method: tab.payment_method,
        total_amount: tab.total_amount,
        pending_amount: tab.pending_amount,
    }))
}

/// Abandon a payment: `payment_locked -> active`.
///
/// Succeeds without changes if the tab is already active.
pub async fn unlock_payment(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<UnlockPaymentRequest>,
) -> Result<Json<UnlockPaymentResponse>, ApiError> {
    let (tab, transition) = state
        .payments
        .unlock_for_retry(
            request.tab_id,
            &request.token,
            request.reason.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(|e| reject("unlock_payment", Some(request.tab_id), &request_id, e))?;

    metrics::payment_transitions_total("unlock", transition);
    Ok(Json(UnlockPaymentResponse {
        success: true,
        unlocked: tab.status == TabStatus::Active,
    }))
}

/// Occupancy of every registered table in a restaurant.
pub async fn list_tables(
    State(state): State<AppState>,
    Path(restaurant_id): Path<String>,
) -> Result<Json<Vec<TableOccupancy>>, ApiError> {
    state
        .tab_manager
        .registry()
        .occupancy(&restaurant_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

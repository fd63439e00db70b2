//! Payment provider callback and administrative tab endpoints.
//!
//! The provider confirms a settled payment by posting the tab id with an
//! `X-Payment-Signature` header: the hex HMAC-SHA256 of the tab id keyed with
//! the shared callback secret.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use dine_tab::tab::{TabId, TabStatus, Transition};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::AppState;
use super::errors::{ApiError, plain_error, reject};
use super::request_id::RequestId;
use crate::{logging::log_security_event, metrics};

/// Header carrying the provider's callback signature
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmedRequest {
    pub tab_id: TabId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTabRequest {
    pub tab_id: TabId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabTransitionResponse {
    pub success: bool,
    pub tab_id: TabId,
    pub status: TabStatus,
}

type HmacSha256 = Hmac<Sha256>;

fn callback_mac(secret: &str, tab_id: TabId) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(tab_id.to_string().as_bytes());
    Some(mac)
}

/// Signature the provider must send for `tab_id`
pub fn callback_signature(secret: &str, tab_id: TabId) -> Option<String> {
    callback_mac(secret, tab_id).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Check a presented callback signature in constant time
pub fn verify_callback_signature(secret: &str, tab_id: TabId, presented: &str) -> bool {
    let Ok(presented) = hex::decode(presented.trim()) else {
        return false;
    };
    callback_mac(secret, tab_id).is_some_and(|mac| mac.verify_slice(&presented).is_ok())
}

/// Payment provider confirmation: `payment_locked -> completed`.
///
/// Duplicate confirmations for a completed tab succeed without changes.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing or wrong signature
/// - `404 Not Found`: Unknown tab
/// - `409 Conflict`: Tab was not locked for payment
pub async fn payment_confirmed(
    State(state): State<AppState>,
    request_id: RequestId,
    headers: HeaderMap,
    Json(request): Json<PaymentConfirmedRequest>,
) -> Result<Json<TabTransitionResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_callback_signature(
        &state.security.payment_callback_secret,
        request.tab_id,
        signature,
    ) {
        log_security_event(
            "bad_callback_signature",
            Some(request.tab_id),
            Some(request_id.as_str()),
            "Payment confirmation with invalid signature",
        );
        return Err(plain_error(
            StatusCode::UNAUTHORIZED,
            "INVALID_SIGNATURE",
            "Invalid payment signature",
        ));
    }

    let (tab, transition) = state
        .payments
        .finalize(request.tab_id)
        .await
        .map_err(|e| reject("payment_confirmed", Some(request.tab_id), &request_id, e))?;

    metrics::payment_transitions_total("finalize", transition);
    Ok(Json(TabTransitionResponse {
        success: true,
        tab_id: tab.id,
        status: tab.status,
    }))
}

/// Administrative cancellation: `active -> cancelled`.
///
/// Requires the admin key (see [`super::middleware::admin_key_middleware`]).
pub async fn cancel_tab(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<CancelTabRequest>,
) -> Result<Json<TabTransitionResponse>, ApiError> {
    let (tab, transition) = state
        .payments
        .cancel_tab(request.tab_id)
        .await
        .map_err(|e| reject("cancel_tab", Some(request.tab_id), &request_id, e))?;

    if transition == Transition::Applied {
        tracing::info!(
            request_id = %request_id.as_str(),
            tab_id = %tab.id,
            "Tab cancelled by administrator"
        );
    }
    metrics::payment_transitions_total("cancel", transition);
    Ok(Json(TabTransitionResponse {
        success: true,
        tab_id: tab.id,
        status: tab.status,
    }))
}

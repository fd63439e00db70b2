//! Integration tests for the HTTP API.
//!
//! Drives the full router (middleware included) over the in-memory store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dine_tab::db::MemoryTabRepository;
use dine_tab::orders::{MemoryOrderLedger, OrderState};
use dine_tab::tab::TabManager;
use dine_tab::table::Table;
use dt_server::api::{self, AppState};
use dt_server::config::SecurityConfig;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method
use uuid::Uuid;

const CALLBACK_SECRET: &str = "test_callback_secret_for_testing_only";
const ADMIN_KEY: &str = "test_admin_key_0123";

/// Helper to create a test server with fresh in-memory stores
fn create_test_server() -> (axum::Router, Arc<MemoryOrderLedger>) {
    let repo = Arc::new(MemoryTabRepository::with_tables(vec![
        Table::new("bistro", "T10", 4),
        Table::new("bistro", "T11", 2),
    ]));
    let orders = Arc::new(MemoryOrderLedger::new());
    let manager = TabManager::with_defaults(repo, orders.clone());

    let state = AppState::new(
        manager,
        SecurityConfig {
            payment_callback_secret: CALLBACK_SECRET.to_string(),
            admin_api_key: ADMIN_KEY.to_string(),
        },
    );
    (api::create_router(state), orders)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Open a tab on T10 and return (tabId, token)
async fn open_tab(app: &axum::Router) -> (String, String) {
    let (status, body) = send(
        app,
        post(
            "/api/v1/create-tab",
            json!({
                "restaurantId": "bistro",
                "tableId": "T10",
                "capacity": 4,
                "customerName": "Ana"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["tabId"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = create_test_server();

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store"], true);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "kiosk-12")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "kiosk-12");
}

// ============================================================================
// Seat Admission Tests
// ============================================================================

#[tokio::test]
async fn test_four_seat_table_admits_four() {
    let (app, _) = create_test_server();
    let (tab_id, token) = open_tab(&app).await;

    for guest in ["Ben", "Cy", "Dee"] {
        let (status, body) = send(
            &app,
            post(
                "/api/v1/join-table",
                json!({"tabId": tab_id, "token": token, "customerName": guest}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    let (status, body) = send(
        &app,
        post(
            "/api/v1/join-table",
            json!({"tabId": tab_id, "token": token, "customerName": "Eve"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CAPACITY_EXCEEDED");

    let (_, status_body) = send(
        &app,
        get("/api/v1/table-status?restaurantId=bistro&tableId=T10"),
    )
    .await;
    assert_eq!(status_body["tabData"]["occupiedSeats"], 4);
    assert_eq!(status_body["tabData"]["availableSeats"], 0);
}

#[tokio::test]
async fn test_occupied_table_rejects_second_tab() {
    let (app, _) = create_test_server();
    open_tab(&app).await;

    let (status, body) = send(
        &app,
        post(
            "/api/v1/create-tab",
            json!({
                "restaurantId": "bistro",
                "tableId": "T10",
                "capacity": 4,
                "customerName": "Zed"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TABLE_ALREADY_OCCUPIED");
}

#[tokio::test]
async fn test_oversized_group_is_bad_request() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        post(
            "/api/v1/create-tab",
            json!({
                "restaurantId": "bistro",
                "tableId": "T11",
                "groupSize": 3,
                "customerName": "Ana"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CAPACITY_EXCEEDED");
}

#[tokio::test]
async fn test_wrong_token_is_forbidden() {
    let (app, _) = create_test_server();
    let (tab_id, _) = open_tab(&app).await;

    let (status, body) = send(
        &app,
        post(
            "/api/v1/join-table",
            json!({"tabId": tab_id, "token": "0".repeat(64), "customerName": "Mallory"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_unknown_tab_is_not_found() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        post(
            "/api/v1/join-table",
            json!({"tabId": Uuid::new_v4(), "token": "x"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TAB_NOT_FOUND");
}

// ============================================================================
// Table Status Tests
// ============================================================================

#[tokio::test]
async fn test_table_status_shape() {
    let (app, orders) = create_test_server();

    let (status, body) = send(
        &app,
        get("/api/v1/table-status?restaurantId=bistro&tableId=T10"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"hasActiveTab": false}));

    let (tab_id, token) = open_tab(&app).await;
    orders
        .record(
            tab_id.parse().unwrap(),
            Decimal::new(1200, 2),
            OrderState::Pending,
        )
        .await;

    let (_, body) = send(
        &app,
        get("/api/v1/table-status?restaurantId=bistro&tableId=T10"),
    )
    .await;
    assert_eq!(body["hasActiveTab"], true);
    let data = &body["tabData"];
    assert_eq!(data["tabId"], tab_id.as_str());
    assert_eq!(data["status"], "active");
    assert_eq!(data["capacity"], 4);
    assert_eq!(data["occupiedSeats"], 1);
    assert_eq!(data["orderCount"], 1);
    assert_eq!(data["pendingAmount"], "12.00");
    assert!(!body.to_string().contains(&token));
}

#[tokio::test]
async fn test_tab_detail_requires_token_header() {
    let (app, _) = create_test_server();
    let (tab_id, token) = open_tab(&app).await;

    let (status, _) = send(&app, get(&format!("/api/v1/tabs/{tab_id}"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri(format!("/api/v1/tabs/{tab_id}"))
        .header("x-tab-token", &token)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participants"].as_array().unwrap().len(), 1);
    assert_eq!(body["participants"][0]["name"], "Ana");
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn test_restaurant_occupancy_listing() {
    let (app, _) = create_test_server();
    let (tab_id, _) = open_tab(&app).await;

    let (status, body) = send(&app, get("/api/v1/restaurants/bistro/tables")).await;
    assert_eq!(status, StatusCode::OK);

    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["tableId"], "T10");
    assert_eq!(rows[0]["state"], "occupied");
    assert_eq!(rows[0]["openTabId"], tab_id.as_str());
    assert_eq!(rows[1]["state"], "available");
}

// ============================================================================
// Payment Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_lock_unlock_and_relock() {
    let (app, _) = create_test_server();
    let (tab_id, token) = open_tab(&app).await;

    let lock = json!({"tabId": tab_id, "token": token, "paymentMethod": "upi"});
    let (status, body) = send(&app, post("/api/v1/lock-payment", lock.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "payment_locked");

    let (status, body) = send(&app, post("/api/v1/lock-payment", lock.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_LOCKED");

    let (status, body) = send(
        &app,
        post(
            "/api/v1/unlock-payment",
            json!({"tabId": tab_id, "token": token, "reason": "upi app closed"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "unlocked": true}));

    let (status, _) = send(&app, post("/api/v1/lock-payment", lock)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_payment_confirmation_requires_signature() {
    let (app, _) = create_test_server();
    let (tab_id, token) = open_tab(&app).await;

    send(
        &app,
        post(
            "/api/v1/lock-payment",
            json!({"tabId": tab_id, "token": token, "paymentMethod": "card"}),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        post("/api/v1/payment-confirmed", json!({"tabId": tab_id})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    let signature =
        api::payments::callback_signature(CALLBACK_SECRET, tab_id.parse().unwrap()).unwrap();
    for _ in 0..2 {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/payment-confirmed")
            .header("content-type", "application/json")
            .header("x-payment-signature", &signature)
            .body(Body::from(json!({"tabId": tab_id}).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
    }

    let (_, body) = send(
        &app,
        get("/api/v1/table-status?restaurantId=bistro&tableId=T10"),
    )
    .await;
    assert_eq!(body["hasActiveTab"], false);
}

#[tokio::test]
async fn test_cancel_requires_admin_key() {
    let (app, _) = create_test_server();
    let (tab_id, _) = open_tab(&app).await;

    let (status, _) = send(&app, post("/api/v1/cancel-tab", json!({"tabId": tab_id}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = |key: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/cancel-tab")
            .header("content-type", "application/json")
            .header("x-admin-key", key)
            .body(Body::from(json!({"tabId": tab_id}).to_string()))
            .unwrap()
    };

    let (status, _) = send(&app, request("wrong-key-wrong-key")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, request(ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    // The table is free again
    open_tab(&app).await;
}

//! Integration tests for the HTTP API over the in-memory ledger store.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use sb_server::api::{AppState, create_router};
use serde_json::{Value, json};
use simple_bank::currency::Currency;
use simple_bank::db::MemoryLedgerStore;
use simple_bank::ledger::{LedgerManager, TransferConfig};
use simple_bank::numeric::Numeric;
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method

fn create_test_server() -> (axum::Router, MemoryLedgerStore) {
    let store = MemoryLedgerStore::new();
    let ledger = LedgerManager::new(Arc::new(store.clone()), TransferConfig::default());
    let app = create_router(AppState {
        ledger: Arc::new(ledger),
    });
    (app, store)
}

fn amount(s: &str) -> Numeric {
    s.parse().unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_server();

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], true);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_create_and_get_account() {
    let (app, _) = create_test_server();

    let (status, created) = send(
        &app,
        post_json(
            "/api/v1/accounts",
            json!({"owner": "alice", "currency": "EUR"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["owner"], "alice");
    assert_eq!(created["currency"], "EUR");
    assert_eq!(created["balance"], "0");

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, get(&format!("/api/v1/accounts/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);
}

#[tokio::test]
async fn test_get_missing_account_is_404() {
    let (app, _) = create_test_server();

    let (status, body) = send(&app, get("/api/v1/accounts/999")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "account_not_found");
}

#[tokio::test]
async fn test_unsupported_currency_is_400() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/accounts",
            json!({"owner": "alice", "currency": "XYZ"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "unsupported_currency");
}

#[tokio::test]
async fn test_blank_owner_is_400() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        post_json("/api/v1/accounts", json!({"owner": "  ", "currency": "EUR"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_owner");
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/accounts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn test_list_accounts_paging() {
    let (app, store) = create_test_server();
    for owner in ["a", "b", "c", "d", "e", "f", "g"] {
        store
            .seed_account(owner, Currency::Eur, amount("1.00"))
            .unwrap();
    }

    let (status, body) = send(&app, get("/api/v1/accounts?page_id=2&page_size=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, get("/api/v1/accounts?page_id=1&page_size=2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_page");

    let (status, body) = send(
        &app,
        get("/api/v1/accounts?page_id=9223372036854775807&page_size=10"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_page");
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_transfer_moves_money() {
    let (app, store) = create_test_server();
    let from = store
        .seed_account("alice", Currency::Eur, amount("100.00"))
        .unwrap();
    let to = store
        .seed_account("bob", Currency::Eur, amount("100.00"))
        .unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transfers",
            json!({
                "from_account_id": from.id,
                "to_account_id": to.id,
                "amount": 1250,
                "currency": "EUR",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transfer"]["amount"], "12.50");
    assert_eq!(body["from_entry"]["amount"], "-12.50");
    assert_eq!(body["to_entry"]["amount"], "12.50");
    assert_eq!(body["from_account"]["balance"], "87.50");
    assert_eq!(body["to_account"]["balance"], "112.50");

    let transfer_id = body["transfer"]["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, get(&format!("/api/v1/transfers/{transfer_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["from_account_id"], from.id);

    let (status, entries) = send(&app, get(&format!("/api/v1/accounts/{}/entries", from.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().unwrap().len(), 1);

    let (status, transfers) =
        send(&app, get(&format!("/api/v1/accounts/{}/transfers", to.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transfers.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_transfer_currency_mismatch_is_400() {
    let (app, store) = create_test_server();
    let from = store
        .seed_account("alice", Currency::Eur, amount("100.00"))
        .unwrap();
    let to = store
        .seed_account("bob", Currency::Usd, amount("100.00"))
        .unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transfers",
            json!({
                "from_account_id": from.id,
                "to_account_id": to.id,
                "amount": 100,
                "currency": "EUR",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "currency_mismatch");
    assert_eq!(store.entry_count().unwrap(), 0);
}

#[tokio::test]
async fn test_transfer_to_same_account_is_400() {
    let (app, store) = create_test_server();
    let account = store
        .seed_account("alice", Currency::Eur, amount("100.00"))
        .unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transfers",
            json!({
                "from_account_id": account.id,
                "to_account_id": account.id,
                "amount": 100,
                "currency": "EUR",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "same_account");
}

#[tokio::test]
async fn test_transfer_non_positive_amount_is_400() {
    let (app, store) = create_test_server();
    let from = store
        .seed_account("alice", Currency::Eur, amount("100.00"))
        .unwrap();
    let to = store
        .seed_account("bob", Currency::Eur, amount("100.00"))
        .unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transfers",
            json!({
                "from_account_id": from.id,
                "to_account_id": to.id,
                "amount": 0,
                "currency": "EUR",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_amount");
}

#[tokio::test]
async fn test_transfer_missing_account_is_404() {
    let (app, store) = create_test_server();
    let from = store
        .seed_account("alice", Currency::Eur, amount("100.00"))
        .unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transfers",
            json!({
                "from_account_id": from.id,
                "to_account_id": 999,
                "amount": 100,
                "currency": "EUR",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "account_not_found");
}

#[tokio::test]
async fn test_get_missing_transfer_is_404() {
    let (app, _) = create_test_server();

    let (status, body) = send(&app, get("/api/v1/transfers/42")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "transfer_not_found");
}

// ============================================================================
// Request ID
// ============================================================================

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-abc")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-abc"
    );
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let (app, _) = create_test_server();

    let response = app.oneshot(get("/health")).await.unwrap();

    let id = response.headers().get("x-request-id").unwrap();
    assert!(!id.to_str().unwrap().is_empty());
}

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use pickup_orders::api::{self, AppState};
use pickup_orders::config::Config;
use pickup_orders::events::EventPublisher;
use pickup_orders::payments::{CheckoutSession, CheckoutSessionRequest, PaymentGateway, PaymentStatus, SessionDetails};
use pickup_orders::store::MemoryStore;
use pickup_orders::{OrderingError, Result};

#[derive(Default)]
struct ScriptedGateway {
    sessions: Mutex<HashMap<String, (CheckoutSessionRequest, PaymentStatus)>>,
}

impl ScriptedGateway {
    fn mark_paid(&self, id: &str) {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(id) {
            entry.1 = PaymentStatus::Paid;
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutSession> {
        let mut sessions = self.sessions.lock().unwrap();
        let id = format!("cs_test_{}", sessions.len() + 1);
        sessions.insert(id.clone(), (request, PaymentStatus::Unpaid));
        Ok(CheckoutSession { url: format!("https://pay.example/{id}"), id })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails> {
        let sessions = self.sessions.lock().unwrap();
        let (request, status) = sessions.get(session_id).ok_or_else(|| OrderingError::NotFound("checkout session".into()))?;
        let amount_total: Decimal = request.line_items.iter().map(|l| l.unit_amount * Decimal::from(l.quantity)).sum();
        Ok(SessionDetails {
            id: session_id.to_string(),
            payment_status: status.clone(),
            amount_total: Some(amount_total),
            metadata: request.metadata.clone(),
            customer_email: request.customer_email.clone(),
        })
    }
}

/// Gateway that never answers within the router timeout.
struct StalledGateway;

#[async_trait]
impl PaymentGateway for StalledGateway {
    async fn create_checkout_session(&self, _request: CheckoutSessionRequest) -> Result<CheckoutSession> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(OrderingError::UpstreamUnavailable("stalled".into()))
    }

    async fn retrieve_session(&self, _session_id: &str) -> Result<SessionDetails> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(OrderingError::UpstreamUnavailable("stalled".into()))
    }
}

const ADMIN: &[(&str, &str)] = &[("x-identity-id", "staff-1"), ("x-identity-role", "admin")];
const USER: &[(&str, &str)] = &[("x-identity-id", "u-42"), ("x-identity-name", "Yoon"), ("x-identity-email", "yoon@example.com"), ("x-session-id", "guest-7")];
const GUEST: &[(&str, &str)] = &[("x-session-id", "guest-7")];

fn app() -> (Router, Arc<ScriptedGateway>) {
    let gateway = Arc::new(ScriptedGateway::default());
    let state = AppState::new(Arc::new(MemoryStore::new()), gateway.clone(), EventPublisher::default(), &Config { read_retries: 0, ..Config::default() });
    (api::router(state, Duration::from_secs(5)), gateway)
}

async fn send(app: &Router, method: Method, uri: &str, headers: &[(&str, &str)], body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    let request = match body {
        Some(json) => builder.header("content-type", "application/json").body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn decimal(v: &Value) -> Decimal {
    match v {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

fn pickup() -> String { (Utc::now() + chrono::Duration::hours(1)).to_rfc3339() }

async fn seed_menu(app: &Router) {
    for (id, name, price) in [("bbq-1", "Bulgogi Bowl", 6000), ("soup-2", "Kimchi Stew", 8000)] {
        let (status, _) = send(app, Method::POST, "/api/v1/menu", ADMIN, Some(json!({"foodID": id, "name": name, "price": price, "category": "main"}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_guest_cart_merge_and_direct_order() {
    let (app, _) = app();
    seed_menu(&app).await;

    send(&app, Method::POST, "/api/v1/cart/items", GUEST, Some(json!({"foodID": "bbq-1"}))).await;
    let (status, cart) = send(&app, Method::POST, "/api/v1/cart/items", GUEST, Some(json!({"foodID": "bbq-1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"][0]["quantity"], 2);
    assert_eq!(decimal(&cart["totals"]["total"]), Decimal::new(12360, 0));

    let (status, merged) = send(&app, Method::POST, "/api/v1/cart/merge", USER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(merged["items"][0]["foodID"], "bbq-1");
    let (_, guest_cart) = send(&app, Method::GET, "/api/v1/cart", GUEST, None).await;
    assert_eq!(guest_cart["items"].as_array().unwrap().len(), 0);

    let (status, order) = send(&app, Method::POST, "/api/v1/orders", USER, Some(json!({"pickupTime": pickup()}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["paymentMethod"], "pay_at_pickup");
    assert_eq!(decimal(&order["totalAmount"]), Decimal::new(12360, 0));

    let (_, cart) = send(&app, Method::GET, "/api/v1/cart", USER, None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
    let (_, mine) = send(&app, Method::GET, "/api/v1/orders/mine", USER, None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_order_lifecycle_and_authorization() {
    let (app, _) = app();
    seed_menu(&app).await;
    send(&app, Method::POST, "/api/v1/cart/items", USER, Some(json!({"foodID": "soup-2"}))).await;
    let (_, order) = send(&app, Method::POST, "/api/v1/orders", USER, Some(json!({"pickupTime": pickup()}))).await;
    let uri = format!("/api/v1/orders/{}", order["orderNumber"].as_str().unwrap());

    let (status, _) = send(&app, Method::PATCH, &uri, USER, Some(json!({"status": "ready"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::GET, "/api/v1/orders", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, update) = send(&app, Method::PATCH, &uri, ADMIN, Some(json!({"status": "ready"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["previous"], "pending");

    let (status, body) = send(&app, Method::PATCH, &uri, ADMIN, Some(json!({"status": "confirmed"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "status");

    let (status, _) = send(&app, Method::PATCH, &uri, ADMIN, Some(json!({"status": "shipped"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, Method::POST, &format!("{uri}/archive"), ADMIN, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    send(&app, Method::PATCH, &uri, ADMIN, Some(json!({"status": "completed"}))).await;
    let (status, _) = send(&app, Method::POST, &format!("{uri}/archive"), ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = send(&app, Method::GET, "/api/v1/orders/history", ADMIN, None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    let (_, report) = send(&app, Method::GET, "/api/v1/reports/sales", ADMIN, None).await;
    assert_eq!(report["completedOrders"], 1);

    let (status, _) = send(&app, Method::DELETE, &uri, ADMIN, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_card_checkout_is_idempotent() {
    let (app, gateway) = app();
    let body = json!({
        "items": [{"foodID": "bbq-1", "name": "Bulgogi Bowl", "price": 6000, "quantity": 2}],
        "totalAmount": 12360,
        "pickupTime": pickup(),
        "customer": {"name": "Han", "email": "han@example.com"}
    });
    let (status, session) = send(&app, Method::POST, "/api/v1/checkout-session", GUEST, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/v1/checkout-session/{}", session["sessionId"].as_str().unwrap());

    let (status, body) = send(&app, Method::GET, &uri, &[], None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "sessionId");

    gateway.mark_paid(session["sessionId"].as_str().unwrap());
    let (status, first) = send(&app, Method::GET, &uri, &[], None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["paymentMethod"], "card");
    assert_eq!(decimal(&first["totalAmount"]), Decimal::new(12360, 0));

    let (status, second) = send(&app, Method::GET, &uri, &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["orderNumber"], first["orderNumber"]);

    let (_, all) = send(&app, Method::GET, "/api/v1/orders", ADMIN, None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_input_errors() {
    let (app, _) = app();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/v1/cart")
        .header("x-session-id", "g")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/api/v1/checkout-session", GUEST, Some(json!({"items": [], "totalAmount": 1000, "pickupTime": pickup(), "customer": {"name": "A", "email": "a@example.com"}}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "items");

    let (status, body) = send(&app, Method::POST, "/api/v1/orders", USER, Some(json!({"pickupTime": pickup()}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "cart is empty");

    let (status, _) = send(&app, Method::POST, "/api/v1/cart/items", GUEST, Some(json!({"foodID": "missing"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overflowing_cart_is_rejected_and_not_stored() {
    let (app, _) = app();
    let line = json!({"foodID": "bbq-1", "name": "Bulgogi Bowl", "unitPrice": "100000000000000000000", "quantity": 4000000000u32});
    let (status, body) = send(&app, Method::PUT, "/api/v1/cart", GUEST, Some(json!({"items": [line]}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "items");

    let (status, cart) = send(&app, Method::GET, "/api/v1/cart", GUEST, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_request_timeout_is_reported_as_unavailable() {
    let state = AppState::new(Arc::new(MemoryStore::new()), Arc::new(StalledGateway), EventPublisher::default(), &Config { read_retries: 0, ..Config::default() });
    let app = api::router(state, Duration::from_millis(50));
    let body = json!({
        "items": [{"foodID": "bbq-1", "name": "Bulgogi Bowl", "price": 6000, "quantity": 1}],
        "totalAmount": 6300,
        "pickupTime": pickup(),
        "customer": {"name": "Han", "email": "han@example.com"}
    });
    let (status, body) = send(&app, Method::POST, "/api/v1/checkout-session", GUEST, Some(body)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "upstream_unavailable");
}

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use inkpress::config::CatalogConfig;
use inkpress::errors::AppResult;
use inkpress::fulfillment::FulfillmentCoordinator;
use inkpress::models::{Order, OrderStatus, ShippingAddress};
use inkpress::services::db::{MemoryOrderStore, OrderStore};
use inkpress::services::stripe::{StripeClient, WebhookVerifier};
use inkpress::services::teemill::{Fulfillment, PlaceOrderRequest, PlacedOrder};
use inkpress::web::{self, AppState};

const WEBHOOK_SECRET: &str = "whsec_test_secret";

struct AlwaysPlaces;

#[async_trait]
impl Fulfillment for AlwaysPlaces {
    async fn place_order(&self, _request: &PlaceOrderRequest) -> AppResult<PlacedOrder> {
        Ok(PlacedOrder {
            order_id: "F-123".to_string(),
            tracking_url: None,
        })
    }
}

fn pending_order() -> Order {
    Order::new(
        Uuid::new_v4(),
        "pi_123".to_string(),
        "https://cdn.example.com/designs/d1.png".to_string(),
        0,
        ShippingAddress {
            name: "Ada Lovelace".to_string(),
            line1: "1 Analytical Way".to_string(),
            line2: None,
            city: "London".to_string(),
            region: "Greater London".to_string(),
            postcode: "EC1A 1BB".to_string(),
            country: "GB".to_string(),
        },
        2700,
        "usd".to_string(),
    )
}

async fn app_with_order() -> (axum::Router, Arc<MemoryOrderStore>, Order) {
    let store = Arc::new(MemoryOrderStore::new());
    let order = pending_order();
    store.create(&order).await.unwrap();

    let coordinator = Arc::new(FulfillmentCoordinator::new(
        store.clone(),
        Arc::new(AlwaysPlaces),
        CatalogConfig::default(),
    ));
    let state = AppState {
        store: store.clone(),
        stripe: StripeClient::new("sk_test_123"),
        verifier: WebhookVerifier::new(WEBHOOK_SECRET),
        coordinator,
    };
    (web::router(state), store, order)
}

fn sign(secret: &str, timestamp: i64, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn succeeded_payload(order_id: &str) -> String {
    serde_json::json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_123",
            "metadata": { "orderId": order_id }
        }}
    })
    .to_string()
}

fn webhook_request(payload: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

#[tokio::test]
async fn verified_event_is_dispatched_and_acknowledged() {
    let (app, store, order) = app_with_order().await;
    let payload = succeeded_payload(&order.order_id.to_string());
    let signature = sign(WEBHOOK_SECRET, Utc::now().timestamp(), &payload);

    let response = app
        .oneshot(webhook_request(&payload, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({ "received": true }));

    let updated = store
        .get(&order.order_id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, OrderStatus::OrderPlaced);
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let (app, store, order) = app_with_order().await;
    let payload = succeeded_payload(&order.order_id.to_string());

    let response = app.oneshot(webhook_request(&payload, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let untouched = store
        .get(&order.order_id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn invalid_signature_is_rejected() {
    let (app, store, order) = app_with_order().await;
    let payload = succeeded_payload(&order.order_id.to_string());
    let signature = sign("whsec_wrong_secret", Utc::now().timestamp(), &payload);

    let response = app
        .oneshot(webhook_request(&payload, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let untouched = store
        .get(&order.order_id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
    let (app, _store, order) = app_with_order().await;
    let payload = succeeded_payload(&order.order_id.to_string());
    let signature = sign(WEBHOOK_SECRET, Utc::now().timestamp() - 3600, &payload);

    let response = app
        .oneshot(webhook_request(&payload, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_event_type_is_acknowledged() {
    let (app, store, order) = app_with_order().await;
    let payload = serde_json::json!({
        "id": "evt_1",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    })
    .to_string();
    let signature = sign(WEBHOOK_SECRET, Utc::now().timestamp(), &payload);

    let response = app
        .oneshot(webhook_request(&payload, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let untouched = store
        .get(&order.order_id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn undecodable_payload_with_valid_signature_is_acknowledged() {
    let (app, _store, _order) = app_with_order().await;
    let payload = r#"{"not":"an event"}"#;
    let signature = sign(WEBHOOK_SECRET, Utc::now().timestamp(), payload);

    let response = app
        .oneshot(webhook_request(payload, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_post_methods_are_rejected() {
    let (app, _store, _order) = app_with_order().await;

    let request = Request::builder()
        .method("GET")
        .uri("/webhooks/stripe")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (app, _store, _order) = app_with_order().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

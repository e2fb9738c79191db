pub mod checkout;
pub mod webhooks;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::errors::AppError;
use crate::fulfillment::FulfillmentCoordinator;
use crate::services::db::OrderStore;
use crate::services::stripe::{StripeClient, WebhookVerifier};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub stripe: StripeClient,
    pub verifier: WebhookVerifier,
    pub coordinator: Arc<FulfillmentCoordinator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/checkout", post(checkout::create_checkout))
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) | AppError::Signature(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Provider errors and database failures stay in the logs.
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::{AppError, AppResult};
use crate::services::stripe::PaymentEvent;

use super::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Stripe webhook endpoint.
///
/// Requests that fail authentication get a 400 before any order is touched.
/// Once the signature checks out the response is always a 200, whatever
/// happens inside: Stripe redelivers on non-2xx responses, and redelivery
/// cannot fix an unknown event type, a missing order, or a fulfillment
/// failure that is already recorded on the order.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::InvalidInput("Missing stripe-signature header".to_string()))?;

    state.verifier.verify(&body, signature)?;

    match serde_json::from_slice::<PaymentEvent>(&body) {
        Ok(event) => state.coordinator.handle_event(event).await,
        Err(e) => warn!("Discarding undecodable webhook payload: {}", e),
    }

    Ok(Json(json!({ "received": true })))
}

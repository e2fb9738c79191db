use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{Order, ShippingAddress};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub design_url: String,
    pub color_index: usize,
    pub shipping_address: ShippingAddress,
    pub amount_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub client_secret: String,
}

/// Creates the payment intent and the pending order it will settle against.
/// The order id goes into the intent's metadata so the webhook can correlate
/// the eventual payment outcome back to this order.
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    if request.design_url.is_empty() {
        return Err(AppError::InvalidInput("design_url is required".to_string()));
    }
    if request.amount_cents <= 0 {
        return Err(AppError::InvalidInput("amount_cents must be positive".to_string()));
    }

    let order_id = Uuid::new_v4();
    let intent = state
        .stripe
        .create_payment_intent(
            order_id,
            request.amount_cents,
            &request.currency,
            &request.shipping_address,
        )
        .await?;

    let order = Order::new(
        order_id,
        intent.id.clone(),
        request.design_url,
        request.color_index,
        request.shipping_address,
        request.amount_cents,
        request.currency,
    );
    state.store.create(&order).await?;

    info!(
        "Created order {} with payment intent {}",
        order.order_id, order.payment_intent_id
    );

    Ok(Json(CheckoutResponse {
        order_id,
        client_secret: intent.client_secret,
    }))
}

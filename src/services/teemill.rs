use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::models::ShippingAddress;

/// Wire format of Teemill's order creation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderRequest {
    pub image_url: String,
    pub item_code: String,
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub city: String,
    pub region: String,
    pub postcode: String,
    pub country: String,
}

impl PlaceOrderRequest {
    pub fn new(image_url: String, item_code: String, shipping: &ShippingAddress) -> Self {
        Self {
            image_url,
            item_code,
            name: shipping.name.clone(),
            address: shipping.line1.clone(),
            address2: shipping.line2.clone(),
            city: shipping.city.clone(),
            region: shipping.region.clone(),
            postcode: shipping.postcode.clone(),
            country: shipping.country.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacedOrder {
    pub order_id: String,
    #[serde(default)]
    pub tracking_url: Option<String>,
}

/// Print-and-ship provider boundary. The coordinator only sees this trait so
/// tests can substitute a recording double.
#[async_trait]
pub trait Fulfillment: Send + Sync {
    async fn place_order(&self, request: &PlaceOrderRequest) -> AppResult<PlacedOrder>;
}

#[derive(Debug, Clone)]
pub struct TeemillClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TeemillClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Fulfillment for TeemillClient {
    async fn place_order(&self, request: &PlaceOrderRequest) -> AppResult<PlacedOrder> {
        info!(
            "Placing Teemill order for item {} shipping to {}",
            request.item_code, request.country
        );

        let response = self
            .client
            .post(format!("{}/order/create", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Teemill(format!(
                "Order create failed with status {}: {}",
                status, error_text
            )));
        }

        let placed: PlacedOrder = response
            .json()
            .await
            .map_err(|e| AppError::Teemill(format!("Failed to parse order response: {}", e)))?;

        Ok(placed)
    }
}

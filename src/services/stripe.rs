use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::ShippingAddress;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Metadata key carrying our order id on every payment intent. Webhook
/// events are correlated back to orders through this key alone.
pub const ORDER_ID_METADATA_KEY: &str = "orderId";

/// How far a webhook timestamp may drift before the event is rejected as a
/// possible replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEventData {
    pub object: PaymentIntent,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn order_id(&self) -> Option<&str> {
        self.metadata.get(ORDER_ID_METADATA_KEY).map(String::as_str)
    }
}

/// Checks that a webhook request was signed with our endpoint secret.
///
/// Stripe sends a `Stripe-Signature` header of the form
/// `t=<unix ts>,v1=<hex hmac>` where the HMAC-SHA256 input is
/// `"<ts>.<raw body>"`. Anything that fails to verify must be rejected
/// before the event reaches the order state machine.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> AppResult<()> {
        let (timestamp, signatures) = parse_signature_header(header)?;

        let age = (Utc::now().timestamp() - timestamp).abs();
        if age > SIGNATURE_TOLERANCE_SECS {
            return Err(AppError::Signature(format!(
                "Timestamp outside the {}s tolerance window",
                SIGNATURE_TOLERANCE_SECS
            )));
        }

        let mac = self.signed_mac(timestamp, payload)?;
        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|raw| mac.clone().verify_slice(&raw).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(AppError::Signature("No matching v1 signature".to_string()))
        }
    }

    fn signed_mac(&self, timestamp: i64, payload: &[u8]) -> AppResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| AppError::Signature("Invalid webhook secret".to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

fn parse_signature_header(header: &str) -> AppResult<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::Signature("Missing timestamp in signature header".to_string()))?;
    if signatures.is_empty() {
        return Err(AppError::Signature(
            "Missing v1 signature in signature header".to_string(),
        ));
    }
    Ok((timestamp, signatures))
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentCreated {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.into(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Creates a payment intent carrying the order id in its metadata, which
    /// is how webhook events find their way back to the order later.
    pub async fn create_payment_intent(
        &self,
        order_id: Uuid,
        amount_cents: i64,
        currency: &str,
        shipping: &ShippingAddress,
    ) -> AppResult<PaymentIntentCreated> {
        let mut params = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            (
                format!("metadata[{}]", ORDER_ID_METADATA_KEY),
                order_id.to_string(),
            ),
            ("shipping[name]".to_string(), shipping.name.clone()),
            ("shipping[address][line1]".to_string(), shipping.line1.clone()),
            ("shipping[address][city]".to_string(), shipping.city.clone()),
            ("shipping[address][state]".to_string(), shipping.region.clone()),
            (
                "shipping[address][postal_code]".to_string(),
                shipping.postcode.clone(),
            ),
            (
                "shipping[address][country]".to_string(),
                shipping.country.clone(),
            ),
        ];
        if let Some(line2) = &shipping.line2 {
            params.push(("shipping[address][line2]".to_string(), line2.clone()));
        }

        let response = self
            .client
            .post(format!("{}/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Stripe(format!(
                "Failed to create payment intent: {}",
                error_text
            )));
        }

        let intent: PaymentIntentCreated = response.json().await?;
        Ok(intent)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postcode: String,
    pub country: String,
}

/// Order lifecycle. Transitions only move forward:
/// `pending_payment -> payment_received -> order_placed`, with
/// `payment_failed` and `fulfillment_error` as terminal side exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    PaymentReceived,
    OrderPlaced,
    PaymentFailed,
    FulfillmentError,
}

impl OrderStatus {
    /// The string stored in the database, also used in conditional update
    /// filters. Must stay in sync with the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::PaymentReceived => "payment_received",
            OrderStatus::OrderPlaced => "order_placed",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::FulfillmentError => "fulfillment_error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub payment_intent_id: String,
    pub design_url: String,
    /// Raw colour selector from the app. Resolved to a Teemill item code at
    /// fulfillment time so code changes in the catalog apply to open orders.
    pub color_index: usize,
    pub shipping_address: ShippingAddress,
    pub amount_cents: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub fulfillment_order_id: Option<String>,
    pub tracking_url: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        order_id: Uuid,
        payment_intent_id: String,
        design_url: String,
        color_index: usize,
        shipping_address: ShippingAddress,
        amount_cents: i64,
        currency: String,
    ) -> Self {
        Self {
            order_id,
            payment_intent_id,
            design_url,
            color_index,
            shipping_address,
            amount_cents,
            currency,
            status: OrderStatus::PendingPayment,
            fulfillment_order_id: None,
            tracking_url: None,
            last_error: None,
            created_at: Utc::now(),
            paid_at: None,
            fulfilled_at: None,
            failed_at: None,
        }
    }

    pub fn mark_paid(&mut self) {
        self.status = OrderStatus::PaymentReceived;
        self.paid_at.get_or_insert_with(Utc::now);
    }

    pub fn mark_placed(&mut self, fulfillment_order_id: String, tracking_url: Option<String>) {
        self.status = OrderStatus::OrderPlaced;
        self.fulfillment_order_id = Some(fulfillment_order_id);
        self.tracking_url = tracking_url;
        self.fulfilled_at.get_or_insert_with(Utc::now);
    }

    pub fn mark_fulfillment_error(&mut self, message: String) {
        self.status = OrderStatus::FulfillmentError;
        self.last_error = Some(message);
    }

    pub fn mark_payment_failed(&mut self) {
        self.status = OrderStatus::PaymentFailed;
        self.failed_at.get_or_insert_with(Utc::now);
    }
}

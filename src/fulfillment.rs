//! The order fulfillment state machine.
//!
//! Stripe delivers payment events at-least-once and in no particular order,
//! so every transition here is guarded twice: a status check on the loaded
//! order filters obvious duplicates cheaply, and the store's conditional
//! `update_from` decides the winner when two deliveries for the same order
//! race. Only the delivery that wins the `pending_payment ->
//! payment_received` claim ever calls Teemill, which is what keeps one paid
//! order from being printed twice.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::CatalogConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{Order, OrderStatus};
use crate::services::db::OrderStore;
use crate::services::stripe::{PaymentEvent, PaymentIntent};
use crate::services::teemill::{Fulfillment, PlaceOrderRequest, PlacedOrder};

pub struct FulfillmentCoordinator {
    store: Arc<dyn OrderStore>,
    fulfillment: Arc<dyn Fulfillment>,
    catalog: CatalogConfig,
}

impl FulfillmentCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        fulfillment: Arc<dyn Fulfillment>,
        catalog: CatalogConfig,
    ) -> Self {
        Self {
            store,
            fulfillment,
            catalog,
        }
    }

    /// Entry point for verified webhook events. Never fails: every error is
    /// either recorded on the order or logged, because by the time we are
    /// here the webhook response is already going to be a 200 and Stripe
    /// will not usefully redeliver.
    pub async fn handle_event(&self, event: PaymentEvent) {
        match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                if let Err(e) = self.payment_succeeded(&event.data.object).await {
                    error!("Failed to handle payment_intent.succeeded {}: {}", event.id, e);
                }
            }
            "payment_intent.payment_failed" => {
                if let Err(e) = self.payment_failed(&event.data.object).await {
                    error!(
                        "Failed to handle payment_intent.payment_failed {}: {}",
                        event.id, e
                    );
                }
            }
            other => {
                info!("Ignoring unhandled event type: {}", other);
            }
        }
    }

    async fn payment_succeeded(&self, intent: &PaymentIntent) -> AppResult<()> {
        let Some(order) = self.load_order(intent).await? else {
            return Ok(());
        };

        if order.status != OrderStatus::PendingPayment {
            info!(
                "Order {} is already {}, ignoring duplicate payment notification",
                order.order_id,
                order.status.as_str()
            );
            return Ok(());
        }

        let mut paid = order;
        paid.mark_paid();
        if !self
            .store
            .update_from(OrderStatus::PendingPayment, &paid)
            .await?
        {
            info!(
                "Order {} was claimed by a concurrent delivery, skipping",
                paid.order_id
            );
            return Ok(());
        }

        info!("Payment received for order {}, placing Teemill order", paid.order_id);

        match self.place_order(&paid).await {
            Ok(placed) => {
                let mut fulfilled = paid.clone();
                fulfilled.mark_placed(placed.order_id.clone(), placed.tracking_url);
                if self
                    .store
                    .update_from(OrderStatus::PaymentReceived, &fulfilled)
                    .await?
                {
                    info!(
                        "Order {} placed with Teemill as {}",
                        fulfilled.order_id, placed.order_id
                    );
                } else {
                    warn!(
                        "Order {} changed status while fulfillment was in flight",
                        fulfilled.order_id
                    );
                }
            }
            Err(e) => {
                error!("Failed to place Teemill order for {}: {}", paid.order_id, e);
                let mut failed = paid.clone();
                failed.mark_fulfillment_error(e.to_string());
                self.store
                    .update_from(OrderStatus::PaymentReceived, &failed)
                    .await?;
            }
        }

        Ok(())
    }

    async fn payment_failed(&self, intent: &PaymentIntent) -> AppResult<()> {
        let Some(order) = self.load_order(intent).await? else {
            return Ok(());
        };

        // A failure notification for an order that already advanced is stale
        // or duplicated; forward progress is never reverted.
        if order.status != OrderStatus::PendingPayment {
            info!(
                "Order {} is already {}, ignoring payment failure notification",
                order.order_id,
                order.status.as_str()
            );
            return Ok(());
        }

        let mut failed = order;
        failed.mark_payment_failed();
        if self
            .store
            .update_from(OrderStatus::PendingPayment, &failed)
            .await?
        {
            info!("Payment failed for order {}", failed.order_id);
        }
        Ok(())
    }

    /// Resolves the event's order, or logs and returns None when the
    /// correlation key is missing or unknown. Those events cannot be
    /// recovered by redelivery, so they are dropped without side effects.
    async fn load_order(&self, intent: &PaymentIntent) -> AppResult<Option<Order>> {
        let Some(order_id) = intent.order_id() else {
            warn!("Payment intent {} has no orderId metadata, dropping event", intent.id);
            return Ok(None);
        };

        let Some(order) = self.store.get(order_id).await? else {
            warn!(
                "No order {} found for payment intent {}, dropping event",
                order_id, intent.id
            );
            return Ok(None);
        };

        Ok(Some(order))
    }

    async fn place_order(&self, order: &Order) -> AppResult<PlacedOrder> {
        let item_code = self
            .catalog
            .item_code(order.color_index)
            .ok_or_else(|| AppError::InvalidInput("Catalog has no products configured".to_string()))?;

        let request = PlaceOrderRequest::new(
            order.design_url.clone(),
            item_code.to_string(),
            &order.shipping_address,
        );
        self.fulfillment.place_order(&request).await
    }
}

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database as MongoDatabase, IndexModel};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::errors::{AppError, AppResult};
use crate::models::{Order, OrderStatus};

/// Durable keyed store for orders.
///
/// Webhook deliveries for the same order can race, so status transitions go
/// through `update_from`, which only persists the record when the stored
/// status still equals `expected`. The caller that loses the race must treat
/// the event as a duplicate.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, order_id: &str) -> AppResult<Option<Order>>;

    async fn create(&self, order: &Order) -> AppResult<()>;

    /// Compare-and-set replacement. Returns false when another writer moved
    /// the order past `expected` first.
    async fn update_from(&self, expected: OrderStatus, order: &Order) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct MongoOrderStore {
    mongo: MongoDatabase,
}

impl MongoOrderStore {
    pub async fn connect(uri: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let store = Self {
            mongo: client.database("inkpress"),
        };

        let index = IndexModel::builder()
            .keys(doc! { "order_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        store.orders().create_index(index, None).await?;

        Ok(store)
    }

    fn orders(&self) -> Collection<Order> {
        self.mongo.collection("orders")
    }
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    async fn get(&self, order_id: &str) -> AppResult<Option<Order>> {
        let order = self
            .orders()
            .find_one(doc! { "order_id": order_id }, None)
            .await?;
        Ok(order)
    }

    async fn create(&self, order: &Order) -> AppResult<()> {
        self.orders().insert_one(order, None).await?;
        Ok(())
    }

    async fn update_from(&self, expected: OrderStatus, order: &Order) -> AppResult<bool> {
        let result = self
            .orders()
            .replace_one(
                doc! {
                    "order_id": order.order_id.to_string(),
                    "status": expected.as_str(),
                },
                order,
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }
}

/// In-memory store used in tests and local development.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Order>> {
        self.orders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, order_id: &str) -> AppResult<Option<Order>> {
        Ok(self.guard().get(order_id).cloned())
    }

    async fn create(&self, order: &Order) -> AppResult<()> {
        let key = order.order_id.to_string();
        let mut orders = self.guard();
        if orders.contains_key(&key) {
            return Err(AppError::InvalidInput(format!("Order {} already exists", key)));
        }
        orders.insert(key, order.clone());
        Ok(())
    }

    async fn update_from(&self, expected: OrderStatus, order: &Order) -> AppResult<bool> {
        let key = order.order_id.to_string();
        let mut orders = self.guard();
        match orders.get(&key) {
            Some(current) if current.status == expected => {
                orders.insert(key, order.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

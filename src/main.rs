use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use inkpress::config::Config;
use inkpress::fulfillment::FulfillmentCoordinator;
use inkpress::services::db::{MongoOrderStore, OrderStore};
use inkpress::services::stripe::{StripeClient, WebhookVerifier};
use inkpress::services::teemill::TeemillClient;
use inkpress::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load()?;

    let store: Arc<dyn OrderStore> = Arc::new(MongoOrderStore::connect(&config.mongodb_uri).await?);
    let teemill = Arc::new(TeemillClient::new(
        config.teemill_api_url.clone(),
        config.teemill_api_key.clone(),
    ));
    let coordinator = Arc::new(FulfillmentCoordinator::new(
        store.clone(),
        teemill,
        config.catalog.clone(),
    ));

    let state = AppState {
        store,
        stripe: StripeClient::new(config.stripe_secret_key.clone()),
        verifier: WebhookVerifier::new(config.stripe_webhook_secret.clone()),
        coordinator,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("inkpress listening on {}", config.bind_addr);
    axum::serve(listener, web::router(state)).await?;

    Ok(())
}

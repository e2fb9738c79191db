use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub teemill_api_url: String,
    pub teemill_api_key: String,
    pub catalog: CatalogConfig,
}

/// Maps the app's colour selector to Teemill item codes. Kept in a JSON file
/// next to the binary so codes can be updated without a redeploy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub products: Vec<CatalogProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub color: String,
    pub item_code: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let product = |color: &str, item_code: &str| CatalogProduct {
            color: color.to_string(),
            item_code: item_code.to_string(),
        };
        Self {
            products: vec![
                product("White", "RNA1"),
                product("Black", "RNA1-BLK"),
                product("Navy Blue", "RNA1-NVY"),
                product("Dark Grey", "RNA1-CHR"),
                product("Red", "RNA1-RED"),
            ],
        }
    }
}

impl CatalogConfig {
    /// Out-of-range selectors fall back to the first product, matching what
    /// the mobile app expects for stale colour indices.
    pub fn item_code(&self, color_index: usize) -> Option<&str> {
        self.products
            .get(color_index)
            .or_else(|| self.products.first())
            .map(|product| product.item_code.as_str())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let catalog = Self::load_catalog()?;
        ensure!(!catalog.products.is_empty(), "Catalog config has no products");

        Ok(Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            mongodb_uri: env::var("MONGODB_URI").context("MONGODB_URI not set")?,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY not set")?,
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .context("STRIPE_WEBHOOK_SECRET not set")?,
            teemill_api_url: env::var("TEEMILL_API_URL")
                .unwrap_or_else(|_| "https://teemill.com/omnis/v3".to_string()),
            teemill_api_key: env::var("TEEMILL_API_KEY").context("TEEMILL_API_KEY not set")?,
            catalog,
        })
    }

    fn load_catalog() -> Result<CatalogConfig> {
        let config_path =
            env::var("CATALOG_CONFIG_PATH").unwrap_or_else(|_| "catalog.json".to_string());

        if Path::new(&config_path).exists() {
            let content =
                fs::read_to_string(&config_path).context("Failed to read catalog config file")?;
            let catalog: CatalogConfig =
                serde_json::from_str(&content).context("Failed to parse catalog config JSON")?;
            Ok(catalog)
        } else {
            // Create default config file
            let default_catalog = CatalogConfig::default();
            let json = serde_json::to_string_pretty(&default_catalog)
                .context("Failed to serialize default catalog config")?;
            fs::write(&config_path, json).context("Failed to write default catalog config file")?;
            Ok(default_catalog)
        }
    }
}

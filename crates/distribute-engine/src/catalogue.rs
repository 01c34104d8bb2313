//! Export catalogue client
//!
//! The export service publishes which files it generated per catalogue,
//! collection and product at `GET {host}/products`:
//!
//! ```json
//! { "gebieden": { "buurten": { "csv_actueel": ["gebieden/CSV_Actueel/GBD_buurt.csv"] } } }
//! ```

use crate::config::ExportApiSettings;
use crate::error::{DistributeError, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Product key to generated file names, in document order
pub type CollectionProducts = IndexMap<String, Vec<String>>;

/// Collection name to its products
pub type CatalogueProducts = IndexMap<String, CollectionProducts>;

/// Full `/products` response
pub type ProductsDocument = IndexMap<String, CatalogueProducts>;

/// HTTP statuses worth another attempt
pub const RETRYABLE_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Source of export product listings
#[async_trait]
pub trait ExportProducts: Send + Sync {
    /// Products of `catalogue`; empty when the service does not know it
    async fn get_products(&self, catalogue: &str) -> Result<CatalogueProducts>;
}

pub struct ExportCatalogueClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
}

impl ExportCatalogueClient {
    pub fn new(settings: &ExportApiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| DistributeError::settings(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.host.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries.max(1),
            backoff: settings.backoff(),
        })
    }

    pub fn products_url(&self) -> String {
        format!("{}/products", self.base_url)
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Fetch the whole products document, retrying transient failures
    pub async fn fetch_document(&self) -> Result<ProductsDocument> {
        let url = self.products_url();
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            debug!("GET {} attempt {}/{}", url, attempt, self.max_retries);

            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<ProductsDocument>().await.map_err(|e| {
                        DistributeError::remote(format!("Invalid products document from {url}: {e}"))
                    });
                },
                Ok(response) if RETRYABLE_STATUSES.contains(&response.status()) => {
                    last_error = format!("HTTP {}", response.status());
                },
                Ok(response) => {
                    return Err(DistributeError::remote(format!(
                        "GET {} returned HTTP {}",
                        url,
                        response.status()
                    )));
                },
                Err(e) => last_error = e.to_string(),
            }

            if attempt < self.max_retries {
                let delay = self.delay(attempt);
                warn!(
                    "GET {} attempt {}/{} failed: {}. Retrying in {:?}...",
                    url, attempt, self.max_retries, last_error, delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(DistributeError::remote(format!(
            "GET {} failed after {} attempts: {}",
            url, self.max_retries, last_error
        )))
    }
}

#[async_trait]
impl ExportProducts for ExportCatalogueClient {
    async fn get_products(&self, catalogue: &str) -> Result<CatalogueProducts> {
        let mut document = self.fetch_document().await?;
        let products = document.shift_remove(catalogue).unwrap_or_default();

        info!(
            catalogue = %catalogue,
            collections = products.len(),
            "Fetched export products"
        );
        Ok(products)
    }
}

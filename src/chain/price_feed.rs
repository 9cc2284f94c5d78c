// Batched price polling against the external price API.
//
// The feed is deliberately infallible at the call surface: any transport or
// parse problem yields an empty snapshot and a warn line, because the caller
// is an unattended loop that must treat "no data" differently from "price 0".

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// One polling cycle's view of prices: token identifier → price
pub type PriceSnapshot = HashMap<String, f64>;

/// Anything the engine can poll prices from. Production uses [`PriceFeed`];
/// tests substitute a mock.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch current prices for the given ids. An empty map means "no data
    /// this cycle", never "all prices are zero".
    async fn fetch_prices(&self, token_ids: &[String]) -> PriceSnapshot;
}

pub struct PriceFeed {
    http_client: reqwest::Client,
    endpoint: String,
}

impl PriceFeed {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http_client,
            endpoint,
        }
    }

    async fn request_prices(&self, token_ids: &[String]) -> Result<Value, reqwest::Error> {
        let url = format!("{}?ids={}", self.endpoint, token_ids.join(","));
        let response = self.http_client.get(&url).send().await?;
        response.error_for_status()?.json::<Value>().await
    }
}

#[async_trait]
impl PriceSource for PriceFeed {
    async fn fetch_prices(&self, token_ids: &[String]) -> PriceSnapshot {
        if token_ids.is_empty() {
            return PriceSnapshot::new();
        }
        match self.request_prices(token_ids).await {
            Ok(body) => {
                let prices = parse_price_response(&body);
                debug!(
                    "price feed returned {} of {} ids",
                    prices.len(),
                    token_ids.len()
                );
                prices
            }
            Err(e) => {
                warn!("price fetch failed: {}", e);
                PriceSnapshot::new()
            }
        }
    }
}

/// Normalize a price API response. Accepts either a flat `{id: {price}}` map
/// or a `{"data": {...}}` envelope; the price may be a JSON number or string.
/// Entries without a usable non-negative price are dropped, not defaulted.
pub fn parse_price_response(body: &Value) -> PriceSnapshot {
    let entries = match body.get("data").and_then(Value::as_object) {
        Some(data) => data,
        None => match body.as_object() {
            Some(root) => root,
            None => return PriceSnapshot::new(),
        },
    };

    let mut prices = PriceSnapshot::new();
    for (id, entry) in entries {
        let price = entry
            .get("price")
            .and_then(|p| p.as_f64().or_else(|| p.as_str().and_then(|s| s.parse().ok())));
        match price {
            Some(p) if p.is_finite() && p >= 0.0 => {
                prices.insert(id.clone(), p);
            }
            _ => debug!("dropping {}: no usable price field", id),
        }
    }
    prices
}

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::sources::PriceSource;
use crate::domain::wallet::PriceMap;
use crate::shared::config::PriceConfig;

/// `{"polkadot": {"usd": 5.12}}`
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

/// CoinGecko simple price API client
pub struct CoinGeckoClient {
    http_client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(config: &PriceConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn price_url(&self, ids: &[String]) -> String {
        format!("{}/simple/price?ids={}&vs_currencies=usd", self.base_url, ids.join(","))
    }
}

fn usd_prices(response: SimplePriceResponse) -> PriceMap {
    response
        .into_iter()
        .filter_map(|(id, quotes)| quotes.get("usd").map(|usd| (id, *usd)))
        .collect()
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn get_prices(&self, ids: &[String]) -> Result<PriceMap> {
        if ids.is_empty() {
            return Ok(PriceMap::new());
        }

        let url = self.price_url(ids);
        info!("🔍 Fetching prices for {} tokens", ids.len());

        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!("⚠️ CoinGecko returned status: {}", response.status());
            return Err(anyhow!("CoinGecko request failed with status: {}", response.status()));
        }

        let body: SimplePriceResponse = response.json().await?;
        Ok(usd_prices(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_url_joins_ids() {
        let client = CoinGeckoClient::new(&PriceConfig {
            base_url: "https://api.coingecko.com/api/v3/".to_string(),
            timeout_ms: 1_000,
        })
        .unwrap();

        assert_eq!(
            client.price_url(&["polkadot".to_string(), "moonbeam".to_string()]),
            "https://api.coingecko.com/api/v3/simple/price?ids=polkadot,moonbeam&vs_currencies=usd"
        );
    }

    #[test]
    fn test_usd_prices_skips_missing_quotes() {
        let body: SimplePriceResponse =
            serde_json::from_str(r#"{"polkadot":{"usd":5.12},"kusama":{"eur":20.0}}"#).unwrap();

        let prices = usd_prices(body);
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["polkadot"], 5.12);
    }
}

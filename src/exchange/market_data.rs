//! Polygon Market Data REST Client

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::traits::{LastQuote, MarketDataPort, MarketSnapshot};
use super::types::*;

pub struct PolygonRestClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PolygonRestClient {
    pub fn new(endpoints: &Endpoints, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { client, base_url: endpoints.market_data_url.clone(), api_key })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}?apiKey={}", self.base_url, path, urlencoding::encode(&self.api_key))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.client.get(self.url(path)).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("GET {} failed: {} - {}", path, status, body);
        }
        debug!("[POLYGON] GET {} | {}", path, body);
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketDataPort for PolygonRestClient {
    fn name(&self) -> &str {
        "polygon"
    }

    async fn last_quote(&self, symbol: &str) -> Result<LastQuote> {
        let path = format!("/v2/last/nbbo/{}", urlencoding::encode(symbol));
        let resp: PolygonLastQuoteResponse = self.get_json(&path).await?;
        Ok(LastQuote::try_from(resp)?)
    }

    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let path = format!("/v2/snapshot/locale/us/markets/stocks/tickers/{}", urlencoding::encode(symbol));
        let resp: PolygonSnapshotResponse = self.get_json(&path).await?;
        Ok(MarketSnapshot::try_from(resp)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_key() {
        let client = PolygonRestClient::new(&Endpoints::live(), "a b&c".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url("/v2/last/nbbo/SNAP"),
            "https://api.polygon.io/v2/last/nbbo/SNAP?apiKey=a%20b%26c"
        );
    }
}

//! Alpaca Trading REST Client

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::debug;

use super::auth::AlpacaAuth;
use super::traits::{BrokeragePort, Order, OrderId, OrderRequest};
use super::types::*;

// ==================== REST CLIENT ====================

pub struct AlpacaRestClient {
    client: Client,
    base_url: String,
    auth: AlpacaAuth,
}

impl AlpacaRestClient {
    pub fn new(endpoints: &Endpoints, auth: AlpacaAuth, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { client, base_url: endpoints.trading_url.clone(), auth })
    }

    /// Turn a non-2xx response into an error carrying Alpaca's message
    async fn check(resp: Response, what: &str) -> Result<String> {
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            return Ok(body);
        }
        let detail = serde_json::from_str::<AlpacaError>(&body)
            .ok()
            .and_then(|e| e.message.map(|m| format!("{} ({})", m, e.code.unwrap_or_default())))
            .unwrap_or(body);
        anyhow::bail!("{} failed: {} - {}", what, status, detail)
    }

    fn parse_order(body: &str) -> Result<Order> {
        let wire: AlpacaOrder = serde_json::from_str(body)?;
        Ok(Order::try_from(wire)?)
    }
}

#[async_trait]
impl BrokeragePort for AlpacaRestClient {
    fn name(&self) -> &str {
        "alpaca"
    }

    /// Place a new order
    async fn create_order(&self, req: &OrderRequest) -> Result<Order> {
        let start = Instant::now();
        let endpoint = "/v2/orders";
        let body = AlpacaOrderRequest::from_request(req, uuid::Uuid::new_v4().to_string());

        debug!("[ALPACA] POST {} | {} {} {} @ {} | cid: {}", endpoint, body.side, body.qty, body.symbol, body.limit_price, body.client_order_id);

        let resp = self.client
            .post(format!("{}{}", self.base_url, endpoint))
            .headers(self.auth.headers()?)
            .json(&body)
            .send()
            .await?;

        let text = Self::check(resp, "create order").await?;
        debug!("[ALPACA] Order ack in {:?} | {}", start.elapsed(), text);
        Self::parse_order(&text)
    }

    /// Cancel an order by ID
    async fn cancel_order(&self, id: &OrderId) -> Result<()> {
        let endpoint = format!("/v2/orders/{}", id);

        let resp = self.client
            .delete(format!("{}{}", self.base_url, endpoint))
            .headers(self.auth.headers()?)
            .send()
            .await?;

        Self::check(resp, "cancel order").await?;
        debug!("[ALPACA] Cancel requested for {}", id);
        Ok(())
    }

    /// Get order status by order ID
    async fn get_order(&self, id: &OrderId) -> Result<Order> {
        let endpoint = format!("/v2/orders/{}", id);

        let resp = self.client
            .get(format!("{}{}", self.base_url, endpoint))
            .headers(self.auth.headers()?)
            .send()
            .await?;

        let text = Self::check(resp, "get order").await?;
        Self::parse_order(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::traits::{OrderStatus, Side};

    #[test]
    fn test_parse_order_body() {
        let body = r#"{"id":"904837e3-3b76-47ec-b432-046db621571b","symbol":"SNAP","side":"buy",
            "qty":"100","filled_qty":"100","status":"filled"}"#;
        let order = AlpacaRestClient::parse_order(body).unwrap();

        assert_eq!(order.id.as_str(), "904837e3-3b76-47ec-b432-046db621571b");
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_quantity, 100);
    }

    #[test]
    fn test_parse_order_body_garbage() {
        assert!(AlpacaRestClient::parse_order("<html>bad gateway</html>").is_err());
    }

    #[test]
    fn test_client_builds_for_paper() {
        let auth = AlpacaAuth::new("PK".into(), "SK".into());
        let client = AlpacaRestClient::new(&Endpoints::paper(), auth, Duration::from_secs(2)).unwrap();
        assert_eq!(client.base_url, "https://paper-api.alpaca.markets");
        assert_eq!(client.name(), "alpaca");
    }
}

//! Port Abstractions for Market Data and Brokerage
//!
//! Traits that define what the trading loop needs from the outside world.
//! Concrete venues implement these; tests implement them in memory.

use async_trait::async_trait;
use anyhow::Result;
use std::fmt;

use crate::error::TradeError;

// ======================= TYPES =======================

/// Opaque brokerage order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// Sign applied to share counts when this side fills
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order request handed to the brokerage
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub quantity: i64,
    pub side: Side,
    pub limit_price: f64,
    pub extended_hours: bool,
}

impl OrderRequest {
    /// Regular-hours day limit order; the only order shape the engine sends
    pub fn day_limit(symbol: &str, side: Side, quantity: i64, limit_price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            side,
            limit_price,
            extended_hours: false,
        }
    }
}

/// Order status as reported by the brokerage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    Rejected,
    /// Any other venue status (pending_cancel, accepted, ...); treated as still open
    Other(String),
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "new" => OrderStatus::New,
            "partially_filled" | "partial_fill" => OrderStatus::PartiallyFilled,
            "filled" | "fill" => OrderStatus::Filled,
            "canceled" | "cancelled" => OrderStatus::Canceled,
            "expired" | "done_for_day" => OrderStatus::Expired,
            "rejected" => OrderStatus::Rejected,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    /// Order will never fill again; reserved shares can be released
    pub fn releases_reservation(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected)
    }
}

/// Order info returned from the brokerage
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub filled_quantity: i64,
    pub status: OrderStatus,
}

/// Top-of-book quote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastQuote {
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: i64,
    pub ask_size: i64,
    /// Venue timestamp (nanoseconds since epoch)
    pub timestamp: i64,
}

impl LastQuote {
    /// Reject quotes the level detector must never see
    pub fn validate(&self) -> Result<(), TradeError> {
        if !self.bid_price.is_finite() || !self.ask_price.is_finite() {
            return Err(TradeError::MalformedPayload("non-finite quote price".into()));
        }
        if self.bid_price <= 0.0 || self.ask_price <= 0.0 {
            return Err(TradeError::MalformedPayload(format!(
                "non-positive quote price: bid={} ask={}",
                self.bid_price, self.ask_price
            )));
        }
        if self.ask_price < self.bid_price {
            return Err(TradeError::MalformedPayload(format!(
                "crossed quote: bid={} ask={}",
                self.bid_price, self.ask_price
            )));
        }
        if self.bid_size < 0 || self.ask_size < 0 {
            return Err(TradeError::MalformedPayload("negative quote size".into()));
        }
        Ok(())
    }
}

/// Latest trade and aggregate volume for a symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    pub last_trade_price: f64,
    pub last_trade_size: i64,
    pub aggregate_volume: i64,
}

// ======================= TRAITS =======================

/// Market data source
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Source name (e.g., "polygon")
    fn name(&self) -> &str;

    /// Latest top-of-book quote
    async fn last_quote(&self, symbol: &str) -> Result<LastQuote>;

    /// Latest trade and aggregate volume
    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot>;
}

/// Order entry and status
#[async_trait]
pub trait BrokeragePort: Send + Sync {
    /// Brokerage name (e.g., "alpaca")
    fn name(&self) -> &str;

    /// Submit an order
    async fn create_order(&self, req: &OrderRequest) -> Result<Order>;

    /// Request cancellation of an order
    async fn cancel_order(&self, id: &OrderId) -> Result<()>;

    /// Fetch current order state
    async fn get_order(&self, id: &OrderId) -> Result<Order>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(OrderStatus::parse("partially_filled"), OrderStatus::PartiallyFilled);
        assert_eq!(OrderStatus::parse("partial_fill"), OrderStatus::PartiallyFilled);
        assert_eq!(OrderStatus::parse("filled"), OrderStatus::Filled);
        assert_eq!(OrderStatus::parse("pending_cancel"), OrderStatus::Other("pending_cancel".into()));
        assert!(OrderStatus::parse("rejected").releases_reservation());
        assert!(OrderStatus::parse("expired").releases_reservation());
        assert!(!OrderStatus::parse("new").releases_reservation());
    }

    #[test]
    fn test_quote_validation() {
        let ok = LastQuote { bid_price: 10.0, ask_price: 10.01, bid_size: 3, ask_size: 4, timestamp: 1 };
        assert!(ok.validate().is_ok());

        let crossed = LastQuote { ask_price: 9.99, ..ok };
        assert!(matches!(crossed.validate(), Err(TradeError::MalformedPayload(_))));

        let zero = LastQuote { bid_price: 0.0, ..ok };
        assert!(zero.validate().is_err());

        let nan = LastQuote { ask_price: f64::NAN, ..ok };
        assert!(nan.validate().is_err());
    }
}

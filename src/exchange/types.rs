//! Alpaca and Polygon wire types
//!
//! Request/response shapes for the two REST venues plus conversion into
//! the port types. Conversions validate shape; they never panic.

use serde::{Deserialize, Serialize};

use super::traits::{LastQuote, MarketSnapshot, Order, OrderId, OrderRequest, OrderStatus, Side};
use crate::config::Environment;
use crate::error::TradeError;

// ======================= ENDPOINTS =======================

/// Venue endpoint configuration
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Alpaca trading REST base URL
    pub trading_url: String,
    /// Polygon market data REST base URL
    pub market_data_url: String,
}

impl Endpoints {
    /// Paper trading account
    pub fn paper() -> Self {
        Self {
            trading_url: "https://paper-api.alpaca.markets".to_string(),
            market_data_url: "https://api.polygon.io".to_string(),
        }
    }

    /// Live trading account
    pub fn live() -> Self {
        Self {
            trading_url: "https://api.alpaca.markets".to_string(),
            market_data_url: "https://api.polygon.io".to_string(),
        }
    }

    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Paper => Self::paper(),
            Environment::Live => Self::live(),
        }
    }
}

// ======================= ALPACA ORDERS =======================

/// Order body for POST /v2/orders
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaOrderRequest {
    pub symbol: String,
    pub qty: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub time_in_force: &'static str,
    pub limit_price: String,
    pub extended_hours: bool,
    pub client_order_id: String,
}

impl AlpacaOrderRequest {
    pub fn from_request(req: &OrderRequest, client_order_id: String) -> Self {
        Self {
            symbol: req.symbol.clone(),
            qty: req.quantity.to_string(),
            side: req.side.as_str().to_string(),
            order_type: "limit",
            time_in_force: "day",
            limit_price: format!("{:.2}", req.limit_price),
            extended_hours: req.extended_hours,
            client_order_id,
        }
    }
}

/// Order entity as returned by Alpaca
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrder {
    pub id: String,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub qty: Option<String>,
    #[serde(default)]
    pub filled_qty: Option<String>,
    pub status: String,
}

/// Error body Alpaca returns on 4xx/5xx
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

fn parse_shares(field: &str, raw: Option<&str>) -> Result<i64, TradeError> {
    let raw = raw.ok_or_else(|| TradeError::MalformedPayload(format!("missing {}", field)))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| TradeError::MalformedPayload(format!("{} is not a whole share count: {:?}", field, raw)))
}

impl TryFrom<AlpacaOrder> for Order {
    type Error = TradeError;

    fn try_from(o: AlpacaOrder) -> Result<Self, Self::Error> {
        let side = match o.side.as_str() {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            other => return Err(TradeError::MalformedPayload(format!("unknown side {:?}", other))),
        };
        let quantity = parse_shares("qty", o.qty.as_deref())?;
        let filled_quantity = match o.filled_qty.as_deref() {
            Some(_) => parse_shares("filled_qty", o.filled_qty.as_deref())?,
            None => 0,
        };
        Ok(Order {
            id: OrderId::new(o.id),
            symbol: o.symbol,
            side,
            quantity,
            filled_quantity,
            status: OrderStatus::parse(&o.status),
        })
    }
}

// ======================= POLYGON QUOTES =======================

/// GET /v2/last/nbbo/{ticker}
#[derive(Debug, Clone, Deserialize)]
pub struct PolygonLastQuoteResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Option<PolygonNbbo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolygonNbbo {
    #[serde(rename = "p")]
    pub bid_price: Option<f64>,
    #[serde(rename = "s")]
    pub bid_size: Option<f64>,
    #[serde(rename = "P")]
    pub ask_price: Option<f64>,
    #[serde(rename = "S")]
    pub ask_size: Option<f64>,
    #[serde(rename = "t")]
    pub timestamp: Option<i64>,
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, TradeError> {
    value.ok_or_else(|| TradeError::MalformedPayload(format!("missing {}", field)))
}

/// Polygon reports "OK" or "DELAYED" on usable bodies
fn check_status(status: Option<&str>) -> Result<(), TradeError> {
    match status {
        None | Some("OK") | Some("DELAYED") => Ok(()),
        Some(other) => Err(TradeError::MalformedPayload(format!("status {}", other))),
    }
}

impl TryFrom<PolygonLastQuoteResponse> for LastQuote {
    type Error = TradeError;

    fn try_from(resp: PolygonLastQuoteResponse) -> Result<Self, Self::Error> {
        check_status(resp.status.as_deref())?;
        let nbbo = required("results", resp.results)?;
        Ok(LastQuote {
            bid_price: required("results.p", nbbo.bid_price)?,
            ask_price: required("results.P", nbbo.ask_price)?,
            bid_size: required("results.s", nbbo.bid_size)? as i64,
            ask_size: required("results.S", nbbo.ask_size)? as i64,
            timestamp: nbbo.timestamp.unwrap_or_default(),
        })
    }
}

// ======================= POLYGON SNAPSHOT =======================

/// GET /v2/snapshot/locale/us/markets/stocks/tickers/{ticker}
#[derive(Debug, Clone, Deserialize)]
pub struct PolygonSnapshotResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ticker: Option<PolygonTickerSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolygonTickerSnapshot {
    #[serde(rename = "lastTrade", default)]
    pub last_trade: Option<PolygonTrade>,
    /// Most recent minute bar
    #[serde(default)]
    pub min: Option<PolygonBar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolygonTrade {
    #[serde(rename = "p")]
    pub price: Option<f64>,
    #[serde(rename = "s")]
    pub size: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolygonBar {
    #[serde(rename = "c")]
    pub close: Option<f64>,
    #[serde(rename = "v")]
    pub volume: Option<f64>,
}

impl TryFrom<PolygonSnapshotResponse> for MarketSnapshot {
    type Error = TradeError;

    fn try_from(resp: PolygonSnapshotResponse) -> Result<Self, Self::Error> {
        check_status(resp.status.as_deref())?;
        let ticker = required("ticker", resp.ticker)?;
        let bar = required("ticker.min", ticker.min)?;
        let trade_price = ticker.last_trade.as_ref().and_then(|t| t.price);
        let trade_size = ticker.last_trade.as_ref().and_then(|t| t.size);

        // Minute close stands in when the trade print is absent
        let last_trade_price = required("ticker.lastTrade.p", trade_price.or(bar.close))?;
        if !last_trade_price.is_finite() || last_trade_price <= 0.0 {
            return Err(TradeError::MalformedPayload(format!("bad last trade price {}", last_trade_price)));
        }
        Ok(MarketSnapshot {
            last_trade_price,
            last_trade_size: trade_size.unwrap_or_default() as i64,
            aggregate_volume: required("ticker.min.v", bar.volume)? as i64,
        })
    }
}

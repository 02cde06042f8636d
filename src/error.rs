//! Domain errors the engine branches on.
//!
//! Transport and startup failures stay `anyhow::Error`; these are the
//! conditions the trading loop recovers from explicitly.

use thiserror::Error;

use crate::exchange::traits::OrderId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TradeError {
    /// Position tracker was asked about an order it never registered.
    #[error("order {0} is not tracked")]
    UnknownOrder(OrderId),

    /// A market or brokerage payload was missing fields or carried nonsense values.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

//! Engine diagnostics channel
//!
//! The decision engine publishes what it did on a broadcast channel instead
//! of printing; a logger task renders events through `tracing`.

use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::exchange::traits::{OrderId, OrderStatus, Side};

/// Events emitted by the decision engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Bid and ask moved to a new one-tick level
    LevelChange {
        prev_bid: f64,
        prev_ask: f64,
        bid: f64,
        ask: f64,
        prev_spread: f64,
        spread: f64,
        rearmed: bool,
        level_count: u64,
    },
    /// Quote or snapshot failed shape validation; tick skipped
    MalformedPayload { source: &'static str, reason: String },
    /// Venue call for market data failed; tick skipped
    MarketDataUnavailable { source: &'static str, error: String },
    /// Order accepted by the brokerage (cancel follows immediately)
    OrderSubmitted {
        order_id: OrderId,
        side: Side,
        price: f64,
        quantity: i64,
    },
    /// Create or cancel failed at this level
    SubmissionFailed {
        side: Side,
        price: f64,
        error: String,
        attempts: u32,
        retry_in: Option<Duration>,
        gave_up: bool,
    },
    FillApplied {
        order_id: OrderId,
        side: Side,
        delta: i64,
        total_shares: i64,
    },
    ReservationReleased {
        order_id: OrderId,
        side: Side,
        released: i64,
        status: OrderStatus,
    },
    /// Order status could not be fetched; retried next tick
    ReconcileFailed { order_id: OrderId, error: String },
    /// Brokerage reported an order for a different symbol
    ForeignOrder { order_id: OrderId, symbol: String },
    /// Position tracker had no entry for the order
    UnknownOrder { order_id: OrderId },
}

pub fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::LevelChange { prev_bid, prev_ask, bid, ask, prev_spread, spread, rearmed, level_count } => {
            info!("[LEVEL] {:.2}/{:.2} ({:.3}) -> {:.2}/{:.2} ({:.3}) | rearmed: {} | level #{}",
                prev_bid, prev_ask, prev_spread, bid, ask, spread, rearmed, level_count);
        }
        EngineEvent::MalformedPayload { source, reason } => {
            warn!("[{}] Malformed payload, skipping tick: {}", source, reason);
        }
        EngineEvent::MarketDataUnavailable { source, error } => {
            warn!("[{}] Unavailable, skipping tick: {}", source, error);
        }
        EngineEvent::OrderSubmitted { order_id, side, price, quantity } => {
            info!("[ORDER] {} {} @ {:.2} | id: {}", side.as_str().to_uppercase(), quantity, price, order_id);
        }
        EngineEvent::SubmissionFailed { side, price, error, attempts, retry_in, gave_up } => {
            if *gave_up {
                warn!("[ORDER] {} @ {:.2} failed (attempt {}), giving up on this level: {}", side, price, attempts, error);
            } else {
                warn!("[ORDER] {} @ {:.2} failed (attempt {}), retry in {:?}: {}",
                    side, price, attempts, retry_in.unwrap_or_default(), error);
            }
        }
        EngineEvent::FillApplied { order_id, side, delta, total_shares } => {
            info!("[FILL] {} {} {} | total: {}", order_id, side, delta, total_shares);
        }
        EngineEvent::ReservationReleased { order_id, side, released, status } => {
            debug!("[RECON] {} {:?}: released {} pending {}", order_id, status, released, side);
        }
        EngineEvent::ReconcileFailed { order_id, error } => {
            warn!("[RECON] Status fetch for {} failed, retrying next tick: {}", order_id, error);
        }
        EngineEvent::ForeignOrder { order_id, symbol } => {
            warn!("[RECON] Order {} belongs to {}, ignored", order_id, symbol);
        }
        EngineEvent::UnknownOrder { order_id } => {
            warn!("[RECON] Order {} is not tracked, ignored", order_id);
        }
    }
}

/// Render engine events until the engine is dropped
pub fn spawn_event_logger(mut rx: broadcast::Receiver<EngineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => warn!("[EVENTS] Logger lagged, {} events dropped", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logger_exits_when_sender_dropped() {
        let (tx, rx) = broadcast::channel(8);
        let handle = spawn_event_logger(rx);

        tx.send(EngineEvent::UnknownOrder { order_id: OrderId::new("x") }).unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("logger should stop")
            .unwrap();
    }
}

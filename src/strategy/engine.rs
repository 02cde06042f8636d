//! Decision engine - one pass per poll tick
//!
//! Reconcile tracked orders, refresh the quote, then decide whether this
//! level gets its one order. Orders are day limits cancelled right after
//! acceptance, which approximates IOC on a venue that lacks it.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::debug;

use super::events::EngineEvent;
use super::position::PositionTracker;
use super::quote::{LevelUpdate, QuoteTracker};
use crate::config::TraderConfig;
use crate::error::TradeError;
use crate::exchange::traits::{
    BrokeragePort, LastQuote, MarketDataPort, MarketSnapshot, OrderId, OrderRequest, OrderStatus, Side,
};

const PRICE_EPSILON: f64 = 1e-9;
const EVENT_CAPACITY: usize = 1024;

/// Why a tick ended without an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    QuoteUnavailable,
    AlreadyTraded,
    BackingOff,
    SnapshotUnavailable,
    LowVolume,
    NoSignal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Ordered { side: Side, order_id: OrderId },
    SubmissionFailed { side: Side },
    Idle(SkipReason),
}

/// Failed submissions at the current level
#[derive(Debug, Default)]
struct RetryState {
    failures: u32,
    next_attempt: Option<Instant>,
}

impl RetryState {
    fn clear(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }

    fn backing_off(&self, now: Instant) -> bool {
        matches!(self.next_attempt, Some(at) if now < at)
    }
}

/// Point-in-time view for status lines
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub bid: f64,
    pub ask: f64,
    pub traded: bool,
    pub level_count: u64,
    pub total_shares: i64,
    pub pending_buy_shares: i64,
    pub pending_sell_shares: i64,
    pub tracked_orders: usize,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}/{:.2} | level #{} traded: {} | total: {} | pending B:{} S:{} | tracked: {}",
            self.bid, self.ask, self.level_count, self.traded, self.total_shares,
            self.pending_buy_shares, self.pending_sell_shares, self.tracked_orders)
    }
}

pub struct DecisionEngine {
    config: TraderConfig,
    market: Arc<dyn MarketDataPort>,
    broker: Arc<dyn BrokeragePort>,
    quote: QuoteTracker,
    position: PositionTracker,
    retry: RetryState,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl DecisionEngine {
    pub fn new(config: TraderConfig, market: Arc<dyn MarketDataPort>, broker: Arc<dyn BrokeragePort>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            quote: QuoteTracker::new(config.price_deviation_threshold),
            position: PositionTracker::new(),
            retry: RetryState::default(),
            config,
            market,
            broker,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    pub fn quote(&self) -> &QuoteTracker {
        &self.quote
    }

    pub fn position(&self) -> &PositionTracker {
        &self.position
    }

    #[cfg(test)]
    pub(crate) fn position_mut(&mut self) -> &mut PositionTracker {
        &mut self.position
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            bid: self.quote.bid,
            ask: self.quote.ask,
            traded: self.quote.traded,
            level_count: self.quote.level_count,
            total_shares: self.position.total_shares(),
            pending_buy_shares: self.position.pending_buy_shares(),
            pending_sell_shares: self.position.pending_sell_shares(),
            tracked_orders: self.position.tracked_orders().len(),
        }
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Run one full tick
    pub async fn tick(&mut self) -> TickOutcome {
        self.reconcile().await;

        if !self.refresh_quote().await {
            return TickOutcome::Idle(SkipReason::QuoteUnavailable);
        }
        if self.quote.traded {
            return TickOutcome::Idle(SkipReason::AlreadyTraded);
        }
        if self.retry.backing_off(Instant::now()) {
            return TickOutcome::Idle(SkipReason::BackingOff);
        }

        let snapshot = match self.market.snapshot(&self.config.symbol).await {
            Ok(s) => s,
            Err(e) => {
                self.report_market_error("SNAPSHOT", e);
                return TickOutcome::Idle(SkipReason::SnapshotUnavailable);
            }
        };
        if snapshot.aggregate_volume < self.config.min_volume() {
            return TickOutcome::Idle(SkipReason::LowVolume);
        }

        match self.signal(&snapshot) {
            Some(side) => self.submit(side).await,
            None => TickOutcome::Idle(SkipReason::NoSignal),
        }
    }

    // ======================= RECONCILE =======================

    async fn reconcile(&mut self) {
        for order_id in self.position.tracked_orders() {
            let order = match self.broker.get_order(&order_id).await {
                Ok(o) => o,
                Err(e) => {
                    self.emit(EngineEvent::ReconcileFailed { order_id, error: format!("{:#}", e) });
                    continue;
                }
            };
            if order.symbol != self.config.symbol {
                self.emit(EngineEvent::ForeignOrder { order_id, symbol: order.symbol });
                continue;
            }

            let applied = match &order.status {
                OrderStatus::Filled => self
                    .position
                    .complete_order(&order_id, order.filled_quantity, order.side)
                    .map(|delta| self.fill_event(&order_id, order.side, delta)),
                OrderStatus::PartiallyFilled => self
                    .position
                    .update_filled_amount(&order_id, order.filled_quantity, order.side)
                    .map(|delta| self.fill_event(&order_id, order.side, delta)),
                status if status.releases_reservation() => {
                    // Pick up fills that landed before the cancel
                    self.position
                        .update_filled_amount(&order_id, order.filled_quantity, order.side)
                        .map(|delta| self.fill_event(&order_id, order.side, delta))
                        .and_then(|_| self.position.remove_pending_order(&order_id, order.side, order.quantity))
                        .map(|released| {
                            self.emit(EngineEvent::ReservationReleased {
                                order_id: order_id.clone(),
                                side: order.side,
                                released,
                                status: order.status.clone(),
                            })
                        })
                }
                _ => Ok(()),
            };

            if let Err(TradeError::UnknownOrder(id)) = applied {
                self.emit(EngineEvent::UnknownOrder { order_id: id });
            }
        }
    }

    fn fill_event(&self, order_id: &OrderId, side: Side, delta: i64) {
        if delta > 0 {
            self.emit(EngineEvent::FillApplied {
                order_id: order_id.clone(),
                side,
                delta,
                total_shares: self.position.total_shares(),
            });
        }
    }

    // ======================= QUOTE =======================

    /// Returns false when the tick has no usable quote
    async fn refresh_quote(&mut self) -> bool {
        let data: LastQuote = match self.market.last_quote(&self.config.symbol).await {
            Ok(q) => q,
            Err(e) => {
                self.report_market_error("QUOTE", e);
                return false;
            }
        };
        if let Err(e) = data.validate() {
            let reason = match e {
                TradeError::MalformedPayload(reason) => reason,
                other => other.to_string(),
            };
            self.emit(EngineEvent::MalformedPayload { source: "QUOTE", reason });
            return false;
        }

        let update = self.quote.update(&data);
        if update != LevelUpdate::Unchanged {
            if update == LevelUpdate::Reset {
                self.retry.clear();
            }
            let q = &self.quote;
            self.emit(EngineEvent::LevelChange {
                prev_bid: q.prev_bid,
                prev_ask: q.prev_ask,
                bid: q.bid,
                ask: q.ask,
                prev_spread: q.prev_spread,
                spread: q.spread,
                rearmed: update == LevelUpdate::Reset,
                level_count: q.level_count,
            });
        }
        true
    }

    fn report_market_error(&self, source: &'static str, e: anyhow::Error) {
        match e.downcast::<TradeError>() {
            Ok(TradeError::MalformedPayload(reason)) => {
                self.emit(EngineEvent::MalformedPayload { source, reason });
            }
            Ok(other) => self.emit(EngineEvent::MarketDataUnavailable { source, error: other.to_string() }),
            Err(e) => self.emit(EngineEvent::MarketDataUnavailable { source, error: format!("{:#}", e) }),
        }
    }

    // ======================= SIGNAL =======================

    /// Buy if the print is at the ask and bids dominate; otherwise sell if the
    /// print is at or above the bid and asks dominate.
    fn signal(&self, snapshot: &MarketSnapshot) -> Option<Side> {
        let q = &self.quote;
        let p = &self.position;
        let ratio = self.config.imbalance_ratio;
        let last = snapshot.last_trade_price;

        let buy = (last - q.ask).abs() < PRICE_EPSILON
            && q.bid_size as f64 > q.ask_size as f64 * ratio
            && p.total_shares() + p.pending_buy_shares() < self.config.max_shares;
        if buy {
            return Some(Side::Buy);
        }

        let sell = last >= q.bid - PRICE_EPSILON
            && q.ask_size as f64 > q.bid_size as f64 * ratio
            && p.total_shares() - p.pending_sell_shares() >= self.config.clip_quantity;
        if sell {
            return Some(Side::Sell);
        }

        debug!("[ENGINE] No signal | last: {:.2} x {} | {}x{} | total: {}",
            last, snapshot.last_trade_size, q.bid_size, q.ask_size, p.total_shares());
        None
    }

    // ======================= ORDER =======================

    async fn submit(&mut self, side: Side) -> TickOutcome {
        let price = match side {
            Side::Buy => self.quote.ask,
            Side::Sell => self.quote.bid,
        };
        let quantity = self.config.clip_quantity;
        let req = OrderRequest::day_limit(&self.config.symbol, side, quantity, price);

        let order = match self.broker.create_order(&req).await {
            Ok(o) => o,
            Err(e) => return self.on_submission_failure(side, price, format!("create: {:#}", e)),
        };

        // Track before cancelling so fills racing the cancel are still reconciled
        self.position.track_order(order.id.clone(), side, quantity);
        self.emit(EngineEvent::OrderSubmitted { order_id: order.id.clone(), side, price, quantity });

        if let Err(e) = self.broker.cancel_order(&order.id).await {
            return self.on_submission_failure(side, price, format!("cancel {}: {:#}", order.id, e));
        }

        self.quote.mark_traded();
        self.retry.clear();
        TickOutcome::Ordered { side, order_id: order.id }
    }

    fn on_submission_failure(&mut self, side: Side, price: f64, error: String) -> TickOutcome {
        let policy = &self.config.retry;
        self.retry.failures += 1;
        let attempts = self.retry.failures;

        let gave_up = policy.exhausted(attempts);
        let mut retry_in = None;
        if gave_up {
            self.quote.mark_traded();
        } else {
            let delay = policy.backoff(attempts);
            if !delay.is_zero() {
                self.retry.next_attempt = Some(Instant::now() + delay);
            }
            retry_in = Some(delay);
        }

        self.emit(EngineEvent::SubmissionFailed { side, price, error, attempts, retry_in, gave_up });
        TickOutcome::SubmissionFailed { side }
    }
}

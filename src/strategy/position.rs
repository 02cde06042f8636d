//! Position Tracker
//!
//! Local projection of filled and reserved shares. Orders can fill partially,
//! so every tracked order keeps the last filled quantity we have applied;
//! brokerage fill reports are treated as append-only.
//!
//! The brokerage's own records stay authoritative. This is reconciled every
//! tick and only ever moves by observed deltas.

use std::collections::HashMap;
use tracing::debug;

use crate::error::TradeError;
use crate::exchange::traits::{OrderId, Side};

#[derive(Debug, Default, Clone)]
pub struct PositionTracker {
    /// order_id -> filled quantity already applied
    orders_filled_amount: HashMap<OrderId, i64>,
    pending_buy_shares: i64,
    pending_sell_shares: i64,
    /// Net signed holding
    total_shares: i64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_pending_buy_shares(&mut self, quantity: i64) {
        self.pending_buy_shares += quantity;
    }

    pub fn update_pending_sell_shares(&mut self, quantity: i64) {
        self.pending_sell_shares += quantity;
    }

    pub fn update_total_shares(&mut self, quantity: i64) {
        self.total_shares += quantity;
    }

    fn update_pending(&mut self, side: Side, quantity: i64) {
        match side {
            Side::Buy => self.update_pending_buy_shares(quantity),
            Side::Sell => self.update_pending_sell_shares(quantity),
        }
    }

    /// Register a freshly created order and reserve its shares
    pub fn track_order(&mut self, order_id: OrderId, side: Side, quantity: i64) {
        self.update_pending(side, quantity);
        self.orders_filled_amount.insert(order_id, 0);
    }

    /// Apply the growth of an order's filled quantity. Returns the delta applied.
    pub fn update_filled_amount(&mut self, order_id: &OrderId, new_amount: i64, side: Side) -> Result<i64, TradeError> {
        let old_amount = *self
            .orders_filled_amount
            .get(order_id)
            .ok_or_else(|| TradeError::UnknownOrder(order_id.clone()))?;
        if new_amount <= old_amount {
            return Ok(0);
        }

        let delta = new_amount - old_amount;
        self.update_pending(side, -delta);
        self.update_total_shares(side.sign() * delta);
        self.orders_filled_amount.insert(order_id.clone(), new_amount);

        debug!("[POSITION] {} {} +{} | total: {} | pending: {}/{}",
            order_id, side, delta, self.total_shares, self.pending_buy_shares, self.pending_sell_shares);
        Ok(delta)
    }

    /// Order fully filled: apply whatever has not been applied yet and stop tracking it
    pub fn complete_order(&mut self, order_id: &OrderId, filled: i64, side: Side) -> Result<i64, TradeError> {
        let delta = self.update_filled_amount(order_id, filled, side)?;
        self.orders_filled_amount.remove(order_id);
        Ok(delta)
    }

    /// Order canceled or rejected: release its unfilled reservation and stop tracking it.
    /// Returns the number of shares released.
    pub fn remove_pending_order(&mut self, order_id: &OrderId, side: Side, quantity: i64) -> Result<i64, TradeError> {
        let old_amount = self
            .orders_filled_amount
            .remove(order_id)
            .ok_or_else(|| TradeError::UnknownOrder(order_id.clone()))?;
        let released = (quantity - old_amount).max(0);
        self.update_pending(side, -released);
        Ok(released)
    }

    pub fn is_tracked(&self, order_id: &OrderId) -> bool {
        self.orders_filled_amount.contains_key(order_id)
    }

    pub fn filled_amount(&self, order_id: &OrderId) -> Option<i64> {
        self.orders_filled_amount.get(order_id).copied()
    }

    /// Tracked order ids in a stable order
    pub fn tracked_orders(&self) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = self.orders_filled_amount.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn pending_buy_shares(&self) -> i64 {
        self.pending_buy_shares
    }

    pub fn pending_sell_shares(&self) -> i64 {
        self.pending_sell_shares
    }

    pub fn total_shares(&self) -> i64 {
        self.total_shares
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> OrderId {
        OrderId::new(s)
    }

    #[test]
    fn test_partial_fills_move_pending_into_total() {
        let mut p = PositionTracker::new();
        p.track_order(id("b1"), Side::Buy, 100);
        assert_eq!(p.pending_buy_shares(), 100);

        assert_eq!(p.update_filled_amount(&id("b1"), 40, Side::Buy), Ok(40));
        assert_eq!(p.total_shares(), 40);
        assert_eq!(p.pending_buy_shares(), 60);

        assert_eq!(p.update_filled_amount(&id("b1"), 70, Side::Buy), Ok(30));
        assert_eq!(p.total_shares(), 70);
        assert_eq!(p.pending_buy_shares(), 30);
        assert_eq!(p.filled_amount(&id("b1")), Some(70));
    }

    #[test]
    fn test_stale_fill_report_is_ignored() {
        let mut p = PositionTracker::new();
        p.track_order(id("b1"), Side::Buy, 100);
        p.update_filled_amount(&id("b1"), 40, Side::Buy).unwrap();

        assert_eq!(p.update_filled_amount(&id("b1"), 40, Side::Buy), Ok(0));
        assert_eq!(p.update_filled_amount(&id("b1"), 10, Side::Buy), Ok(0));
        assert_eq!(p.total_shares(), 40);
        assert_eq!(p.pending_buy_shares(), 60);
    }

    #[test]
    fn test_sell_fills_reduce_total() {
        let mut p = PositionTracker::new();
        p.update_total_shares(200);
        p.track_order(id("s1"), Side::Sell, 100);

        p.update_filled_amount(&id("s1"), 25, Side::Sell).unwrap();
        assert_eq!(p.total_shares(), 175);
        assert_eq!(p.pending_sell_shares(), 75);

        assert_eq!(p.complete_order(&id("s1"), 100, Side::Sell), Ok(75));
        assert_eq!(p.total_shares(), 100);
        assert_eq!(p.pending_sell_shares(), 0);
        assert!(!p.is_tracked(&id("s1")));
    }

    #[test]
    fn test_complete_order_counts_once() {
        let mut p = PositionTracker::new();
        p.track_order(id("b1"), Side::Buy, 100);

        assert_eq!(p.complete_order(&id("b1"), 100, Side::Buy), Ok(100));
        assert_eq!(p.total_shares(), 100);
        assert_eq!(p.pending_buy_shares(), 0);

        // Seen again on a later tick: no double count
        assert_eq!(p.complete_order(&id("b1"), 100, Side::Buy), Err(TradeError::UnknownOrder(id("b1"))));
        assert_eq!(p.total_shares(), 100);
    }

    #[test]
    fn test_cancel_releases_unfilled_remainder() {
        let mut p = PositionTracker::new();
        p.track_order(id("b1"), Side::Buy, 100);
        p.update_filled_amount(&id("b1"), 40, Side::Buy).unwrap();

        assert_eq!(p.remove_pending_order(&id("b1"), Side::Buy, 100), Ok(60));
        assert_eq!(p.pending_buy_shares(), 0);
        assert_eq!(p.total_shares(), 40);
        assert!(p.tracked_orders().is_empty());
    }

    #[test]
    fn test_reject_releases_whole_reservation() {
        let mut p = PositionTracker::new();
        p.update_total_shares(300);
        p.track_order(id("s1"), Side::Sell, 100);

        assert_eq!(p.remove_pending_order(&id("s1"), Side::Sell, 100), Ok(100));
        assert_eq!(p.pending_sell_shares(), 0);
        assert_eq!(p.total_shares(), 300);
    }

    #[test]
    fn test_unknown_order_is_a_noop() {
        let mut p = PositionTracker::new();
        p.track_order(id("b1"), Side::Buy, 100);

        assert_eq!(p.update_filled_amount(&id("zz"), 50, Side::Buy), Err(TradeError::UnknownOrder(id("zz"))));
        assert!(p.remove_pending_order(&id("zz"), Side::Buy, 100).is_err());
        assert_eq!(p.total_shares(), 0);
        assert_eq!(p.pending_buy_shares(), 100);
        assert_eq!(p.tracked_orders(), vec![id("b1")]);
    }

    #[test]
    fn test_total_is_net_sum_of_applied_deltas() {
        let mut p = PositionTracker::new();
        p.track_order(id("b1"), Side::Buy, 100);
        p.track_order(id("b2"), Side::Buy, 100);
        p.track_order(id("s1"), Side::Sell, 100);

        let mut net = 0;
        net += p.update_filled_amount(&id("b1"), 30, Side::Buy).unwrap();
        net += p.update_filled_amount(&id("b2"), 100, Side::Buy).unwrap();
        net -= p.update_filled_amount(&id("s1"), 50, Side::Sell).unwrap();
        net += p.complete_order(&id("b1"), 100, Side::Buy).unwrap();
        net -= p.update_filled_amount(&id("s1"), 20, Side::Sell).unwrap();

        assert_eq!(net, 150);
        assert_eq!(p.total_shares(), net);
    }
}

//! Level-change detector over the rolling top-of-book quote.
//!
//! A level change is a simultaneous move of bid and ask that lands on a
//! one-tick spread. Only a move from one one-tick level to another re-arms
//! trading; wider spreads are treated as irregular and never re-arm.

use crate::exchange::traits::LastQuote;

/// Round to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Outcome of feeding one quote into the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelUpdate {
    /// Sizes refreshed only
    Unchanged,
    /// Bid/ask shifted to a new level, but the previous level was irregular
    Shifted,
    /// Moved between two one-tick levels; trading re-armed
    Reset,
}

#[derive(Debug, Clone)]
pub struct QuoteTracker {
    pub prev_bid: f64,
    pub prev_ask: f64,
    pub prev_spread: f64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: i64,
    pub ask_size: i64,
    pub spread: f64,
    /// An order was already attempted at the current level
    pub traded: bool,
    pub level_count: u64,
    /// Venue timestamp of the last level change
    pub time: i64,
    price_deviation: f64,
}

impl QuoteTracker {
    pub fn new(price_deviation: f64) -> Self {
        Self {
            prev_bid: 0.0,
            prev_ask: 0.0,
            prev_spread: 0.0,
            bid: 0.0,
            ask: 0.0,
            bid_size: 0,
            ask_size: 0,
            spread: 0.0,
            // Nothing is tradable until the first full level transition
            traded: true,
            level_count: 0,
            time: 0,
            price_deviation,
        }
    }

    /// Re-arm trading for a fresh level
    pub fn reset(&mut self) {
        self.traded = false;
        self.level_count += 1;
    }

    pub fn mark_traded(&mut self) {
        self.traded = true;
    }

    pub fn update(&mut self, data: &LastQuote) -> LevelUpdate {
        self.bid_size = data.bid_size;
        self.ask_size = data.ask_size;

        let level_change = self.bid != data.bid_price
            && self.ask != data.ask_price
            && round_to(data.ask_price - data.bid_price, 2) == self.price_deviation;
        if !level_change {
            return LevelUpdate::Unchanged;
        }

        self.prev_bid = self.bid;
        self.prev_ask = self.ask;
        self.bid = data.bid_price;
        self.ask = data.ask_price;
        self.time = data.timestamp;
        self.prev_spread = round_to(self.prev_ask - self.prev_bid, 3);
        self.spread = round_to(self.ask - self.bid, 3);

        if self.prev_spread == self.price_deviation {
            self.reset();
            LevelUpdate::Reset
        } else {
            LevelUpdate::Shifted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(bid: f64, ask: f64, bid_size: i64, ask_size: i64) -> LastQuote {
        LastQuote { bid_price: bid, ask_price: ask, bid_size, ask_size, timestamp: 7 }
    }

    #[test]
    fn test_first_level_only_shifts() {
        let mut q = QuoteTracker::new(0.01);
        assert_eq!(q.update(&quote(10.00, 10.01, 5, 5)), LevelUpdate::Shifted);
        assert!(q.traded);
        assert_eq!(q.level_count, 0);
        assert_eq!(q.bid, 10.00);
        assert_eq!(q.prev_spread, 0.0);
        assert_eq!(q.spread, 0.01);
    }

    #[test]
    fn test_one_tick_to_one_tick_resets() {
        let mut q = QuoteTracker::new(0.01);
        q.update(&quote(10.00, 10.01, 5, 5));
        assert_eq!(q.update(&quote(10.01, 10.02, 100, 40)), LevelUpdate::Reset);

        assert!(!q.traded);
        assert_eq!(q.level_count, 1);
        assert_eq!((q.prev_bid, q.prev_ask), (10.00, 10.01));
        assert_eq!((q.bid, q.ask), (10.01, 10.02));
        assert_eq!(q.prev_spread, 0.01);
        assert_eq!((q.bid_size, q.ask_size), (100, 40));
        assert_eq!(q.time, 7);
    }

    #[test]
    fn test_wide_spread_is_not_a_level() {
        let mut q = QuoteTracker::new(0.01);
        q.update(&quote(10.00, 10.01, 5, 5));
        assert_eq!(q.update(&quote(10.01, 10.03, 8, 9)), LevelUpdate::Unchanged);

        assert_eq!((q.bid, q.ask), (10.00, 10.01));
        assert_eq!((q.bid_size, q.ask_size), (8, 9));
        assert_eq!(q.spread, 0.01);
    }

    #[test]
    fn test_one_side_move_is_not_a_level() {
        let mut q = QuoteTracker::new(0.01);
        q.update(&quote(10.00, 10.01, 5, 5));
        q.update(&quote(10.01, 10.02, 5, 5));
        q.mark_traded();

        // Ask unchanged: no transition even though spread is one tick
        assert_eq!(q.update(&quote(10.01, 10.02, 1, 1)), LevelUpdate::Unchanged);
        assert!(q.traded);
        assert_eq!(q.level_count, 1);
    }

    #[test]
    fn test_consecutive_levels_rearm() {
        let mut q = QuoteTracker::new(0.01);
        q.update(&quote(10.00, 10.01, 5, 5));
        q.update(&quote(10.01, 10.02, 5, 5));
        q.mark_traded();

        assert_eq!(q.update(&quote(10.02, 10.03, 5, 5)), LevelUpdate::Reset);
        assert_eq!(q.level_count, 2);
        assert!(!q.traded);
    }

    #[test]
    fn test_subpenny_previous_level_does_not_rearm() {
        let mut q = QuoteTracker::new(0.01);
        // 0.014 rounds to a cent at 2dp, so it is adopted as a level...
        assert_eq!(q.update(&quote(10.000, 10.014, 5, 5)), LevelUpdate::Shifted);
        q.mark_traded();

        // ...but at 3dp the previous spread is not one tick
        assert_eq!(q.update(&quote(10.01, 10.02, 5, 5)), LevelUpdate::Shifted);
        assert_eq!(q.prev_spread, 0.014);
        assert!(q.traded);
        assert_eq!(q.level_count, 0);
    }

    #[test]
    fn test_traded_untouched_without_level_change() {
        let mut q = QuoteTracker::new(0.01);
        q.update(&quote(10.00, 10.01, 5, 5));
        q.update(&quote(10.01, 10.02, 5, 5));
        assert!(!q.traded);

        for sizes in [(1, 2), (300, 4), (0, 0)] {
            q.update(&quote(10.01, 10.02, sizes.0, sizes.1));
            assert!(!q.traded);
        }
        assert_eq!(q.level_count, 1);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(10.02 - 10.01, 2), 0.01);
        assert_eq!(round_to(10.01 - 10.0, 3), 0.01);
        assert_eq!(round_to(0.0149, 2), 0.01);
    }
}

//! Poll loop - drives the decision engine on a fixed interval until shutdown

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::strategy::{DecisionEngine, TickOutcome};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub orders: u64,
    pub submission_failures: u64,
}

pub struct PollLoop {
    engine: DecisionEngine,
    interval: Duration,
    /// Status line every N ticks (0 = never)
    status_every: u64,
}

impl PollLoop {
    pub fn new(engine: DecisionEngine, interval: Duration, status_every: u64) -> Self {
        Self { engine, interval, status_every }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Tick until `shutdown` flips to true. A tick in flight always completes,
    /// so an order is never left between create and cancel.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> LoopStats {
        let mut stats = LoopStats::default();
        if *shutdown.borrow() {
            return stats;
        }

        let mut tick = tokio::time::interval(self.interval);
        // A slow venue call delays the next tick instead of bursting
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    // Sender gone counts as shutdown too
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tick.tick() => {
                    stats.ticks += 1;
                    match self.engine.tick().await {
                        TickOutcome::Ordered { .. } => stats.orders += 1,
                        TickOutcome::SubmissionFailed { .. } => stats.submission_failures += 1,
                        TickOutcome::Idle(_) => {}
                    }
                    if self.status_every > 0 && stats.ticks % self.status_every == 0 {
                        info!("[STATUS] tick {} | {}", stats.ticks, self.engine.status());
                    }
                }
            }
        }

        info!("[LOOP] Stopped after {} ticks | orders: {} | failures: {}",
            stats.ticks, stats.orders, stats.submission_failures);
        stats
    }
}

//! Strategy Layer
//!
//! Level detection, position bookkeeping and the per-tick decision engine.

pub mod engine;
pub mod events;
pub mod position;
pub mod quote;

pub use engine::{DecisionEngine, EngineStatus, SkipReason, TickOutcome};
pub use events::{spawn_event_logger, EngineEvent};
pub use position::PositionTracker;
pub use quote::{LevelUpdate, QuoteTracker};

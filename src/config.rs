//! Trader configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file is a
//! valid paper-trading setup. Credentials never live here (see `exchange::auth`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::TradeError;

/// Which brokerage account the orders go to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Paper,
    Live,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// What happens after a failed order submission at the same price level
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Failed attempts allowed per level before giving up on it (0 = unlimited)
    pub max_attempts_per_level: u32,
    /// Delay before the first retry; 0 retries on the very next tick
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_level: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `failures`-th consecutive failure
    pub fn backoff(&self, failures: u32) -> Duration {
        if self.initial_backoff_ms == 0 || failures == 0 {
            return Duration::ZERO;
        }
        let exp = self.multiplier.max(1.0).powi(failures.saturating_sub(1) as i32);
        let ms = (self.initial_backoff_ms as f64 * exp).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms as u64)
    }

    /// True once `failures` exhausts the per-level budget
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts_per_level > 0 && failures >= self.max_attempts_per_level
    }
}

/// Strategy and runtime configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TraderConfig {
    /// Ticker to trade (upper-cased on validation)
    pub symbol: String,
    pub environment: Environment,
    /// Exposure cap in shares
    pub max_shares: i64,
    /// Shares per order attempt
    pub clip_quantity: i64,
    pub poll_interval_secs: f64,
    /// Spread that defines an eligible level (one cent)
    pub price_deviation_threshold: f64,
    /// Size ratio the favoured side must exceed
    pub imbalance_ratio: f64,
    /// Minimum minute volume before acting; defaults to the clip quantity
    pub min_volume: Option<i64>,
    /// Upper bound on every venue request
    pub request_timeout_ms: u64,
    /// Log an engine status line every N ticks (0 = never)
    pub status_every_ticks: u64,
    pub retry: RetryPolicy,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            symbol: "SNAP".to_string(),
            environment: Environment::Paper,
            max_shares: 500,
            clip_quantity: 100,
            poll_interval_secs: 2.0,
            price_deviation_threshold: 0.01,
            imbalance_ratio: 1.8,
            min_volume: None,
            request_timeout_ms: 5_000,
            status_every_ticks: 30,
            retry: RetryPolicy::default(),
        }
    }
}

fn positive_finite(field: &str, value: f64) -> Result<(), TradeError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TradeError::InvalidConfig(format!("{} must be positive and finite, got {}", field, value)))
    }
}

impl TraderConfig {
    /// Read and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: TraderConfig = toml::from_str(text)?;
        Ok(config.validate()?)
    }

    pub fn validate(mut self) -> Result<Self, TradeError> {
        self.symbol = self.symbol.trim().to_uppercase();
        if self.symbol.is_empty() {
            return Err(TradeError::InvalidConfig("symbol must not be empty".into()));
        }
        if self.max_shares <= 0 {
            return Err(TradeError::InvalidConfig("max_shares must be positive".into()));
        }
        if self.clip_quantity <= 0 {
            return Err(TradeError::InvalidConfig("clip_quantity must be positive".into()));
        }
        positive_finite("poll_interval_secs", self.poll_interval_secs)?;
        // tokio rejects a zero period, so sub-nanosecond intervals are out too
        match Duration::try_from_secs_f64(self.poll_interval_secs) {
            Ok(d) if !d.is_zero() => {}
            _ => return Err(TradeError::InvalidConfig("poll_interval_secs is not a usable interval".into())),
        }
        positive_finite("price_deviation_threshold", self.price_deviation_threshold)?;
        positive_finite("imbalance_ratio", self.imbalance_ratio)?;
        if matches!(self.min_volume, Some(v) if v < 0) {
            return Err(TradeError::InvalidConfig("min_volume must not be negative".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(TradeError::InvalidConfig("request_timeout_ms must be positive".into()));
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn min_volume(&self) -> i64 {
        self.min_volume.unwrap_or(self.clip_quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gets_defaults() {
        let config = TraderConfig::from_toml("").unwrap();
        assert_eq!(config, TraderConfig::default());
        assert_eq!(config.min_volume(), 100);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_overrides_and_symbol_normalised() {
        let config = TraderConfig::from_toml(
            r#"
            symbol = " aapl "
            environment = "live"
            clip_quantity = 50
            min_volume = 1000

            [retry]
            max_attempts_per_level = 3
            initial_backoff_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.symbol, "AAPL");
        assert_eq!(config.environment, Environment::Live);
        assert_eq!(config.min_volume(), 1000);
        assert_eq!(config.retry.max_attempts_per_level, 3);
        assert_eq!(config.retry.max_backoff_ms, 30_000);
    }

    #[test]
    fn test_sample_config_parses() {
        let config = TraderConfig::from_toml(include_str!("../config/trader.toml")).unwrap();
        assert_eq!(config, TraderConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TraderConfig::from_toml("clip_quantity = 0").is_err());
        assert!(TraderConfig::from_toml("poll_interval_secs = -1.0").is_err());
        assert!(TraderConfig::from_toml("symbol = \"\"").is_err());
        assert!(TraderConfig::from_toml("environment = \"demo\"").is_err());
        assert!(TraderConfig::from_toml("poll_interval_secs = inf").is_err());
        assert!(TraderConfig::from_toml("poll_interval_secs = nan").is_err());
        assert!(TraderConfig::from_toml("poll_interval_secs = 1e-12").is_err());
        assert!(TraderConfig::from_toml("price_deviation_threshold = inf").is_err());
        assert!(TraderConfig::from_toml("imbalance_ratio = inf").is_err());
    }

    #[test]
    fn test_small_but_usable_interval_accepted() {
        let config = TraderConfig::from_toml("poll_interval_secs = 0.25").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy {
            max_attempts_per_level: 0,
            initial_backoff_ms: 100,
            max_backoff_ms: 250,
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(250));
        assert!(!policy.exhausted(100));

        assert_eq!(RetryPolicy::default().backoff(5), Duration::ZERO);
        let capped = RetryPolicy { max_attempts_per_level: 2, ..RetryPolicy::default() };
        assert!(!capped.exhausted(1));
        assert!(capped.exhausted(2));
    }
}

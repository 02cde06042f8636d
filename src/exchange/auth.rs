//! Venue credentials
//!
//! Alpaca authenticates with a key id / secret header pair; Polygon with an
//! `apiKey` query parameter. Credentials come from the environment only.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

pub const ALPACA_KEY_ID_VAR: &str = "APCA_API_KEY_ID";
pub const ALPACA_SECRET_VAR: &str = "APCA_API_SECRET_KEY";
pub const POLYGON_KEY_VAR: &str = "POLYGON_API_KEY";

/// Alpaca authentication handler
#[derive(Clone)]
pub struct AlpacaAuth {
    key_id: String,
    secret_key: String,
}

impl AlpacaAuth {
    pub fn new(key_id: String, secret_key: String) -> Self {
        Self { key_id, secret_key }
    }

    /// Headers attached to every trading request
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", HeaderValue::from_str(&self.key_id)?);
        headers.insert("APCA-API-SECRET-KEY", HeaderValue::from_str(&self.secret_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

impl std::fmt::Debug for AlpacaAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlpacaAuth")
            .field("key_id", &redact(&self.key_id))
            .finish()
    }
}

/// Everything needed to talk to both venues
#[derive(Clone)]
pub struct Credentials {
    pub alpaca: AlpacaAuth,
    pub polygon_api_key: String,
}

impl Credentials {
    /// Missing credentials are the one fatal startup condition
    pub fn from_env() -> Result<Self> {
        let key_id = non_empty_var(ALPACA_KEY_ID_VAR)?;
        let secret = non_empty_var(ALPACA_SECRET_VAR)?;
        let polygon = non_empty_var(POLYGON_KEY_VAR)?;
        Ok(Self {
            alpaca: AlpacaAuth::new(key_id, secret),
            polygon_api_key: polygon,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("alpaca", &self.alpaca)
            .field("polygon_api_key", &redact(&self.polygon_api_key))
            .finish()
    }
}

fn non_empty_var(name: &str) -> Result<String> {
    let value = std::env::var(name).with_context(|| format!("{} environment variable is required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} environment variable is empty", name);
    }
    Ok(value)
}

fn redact(secret: &str) -> String {
    format!("{}...", secret.chars().take(4).collect::<String>())
}

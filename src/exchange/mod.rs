//! Venue Layer
//!
//! Port traits plus REST adapters for Alpaca (orders) and Polygon (quotes).

pub mod auth;
pub mod market_data;
pub mod rest;
pub mod traits;
pub mod types;

pub use auth::{AlpacaAuth, Credentials};
pub use market_data::PolygonRestClient;
pub use rest::AlpacaRestClient;
pub use traits::*;
pub use types::Endpoints;

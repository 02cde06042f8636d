//! Level-change trader: one IOC-style order per one-tick price level on a single symbol
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod config;
mod error;
mod exchange;
mod poll_loop;
mod strategy;

use config::{Environment, TraderConfig};
use exchange::{AlpacaRestClient, BrokeragePort, Credentials, Endpoints, MarketDataPort, PolygonRestClient};
use poll_loop::PollLoop;
use strategy::{spawn_event_logger, DecisionEngine};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML config file; built-in defaults when omitted
    #[arg(short, long, env = "LEVEL_TRADER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured brokerage environment
    #[arg(short, long, value_enum)]
    environment: Option<Environment>,

    /// Override the configured symbol
    #[arg(short, long)]
    symbol: Option<String>,
}

fn load_config(args: &Args) -> Result<TraderConfig> {
    let mut config = match &args.config {
        Some(path) => TraderConfig::load(path)?,
        None => TraderConfig::default(),
    };
    if let Some(env) = args.environment {
        config.environment = env;
    }
    if let Some(symbol) = &args.symbol {
        config.symbol = symbol.clone();
    }
    Ok(config.validate()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!("═══ Level trader: {} ({}) ═══", config.symbol, config.environment);
    info!("[CONFIG] max: {} | clip: {} | poll: {:.1}s | ratio: {} | min vol: {}",
        config.max_shares, config.clip_quantity, config.poll_interval_secs,
        config.imbalance_ratio, config.min_volume());
    if config.environment == Environment::Live {
        warn!("[CONFIG] LIVE environment: orders hit a real account");
    }

    let creds = Credentials::from_env()?;
    info!("[AUTH] {:?}", creds);
    let endpoints = Endpoints::for_environment(config.environment);
    let broker: Arc<dyn BrokeragePort> =
        Arc::new(AlpacaRestClient::new(&endpoints, creds.alpaca, config.request_timeout())?);
    let market: Arc<dyn MarketDataPort> =
        Arc::new(PolygonRestClient::new(&endpoints, creds.polygon_api_key, config.request_timeout())?);
    info!("[VENUE] orders: {} | quotes: {}", broker.name(), market.name());

    let engine = DecisionEngine::new(config.clone(), market, broker);
    let logger = spawn_event_logger(engine.subscribe());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("[SHUTDOWN] Ctrl-C received, finishing current tick"),
            Err(e) => error!("[SHUTDOWN] Signal handler failed: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let mut poll_loop = PollLoop::new(engine, config.poll_interval(), config.status_every_ticks);
    let stats = poll_loop.run(shutdown_rx).await;

    let status = poll_loop.engine().status();
    info!("[FINAL] {} ticks | {} orders | {} failures | {}",
        stats.ticks, stats.orders, stats.submission_failures, status);
    if status.tracked_orders > 0 {
        warn!("[FINAL] {} orders still tracked; check the brokerage for late fills", status.tracked_orders);
    }

    // Dropping the engine closes the event channel and stops the logger
    drop(poll_loop);
    let _ = logger.await;
    Ok(())
}

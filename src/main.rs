//! FinPulse: binary entrypoint.
//! Wires config, metrics, the news scheduler, the price stream and the FX
//! poller, then runs until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use rustls::crypto::{ring, CryptoProvider};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use finpulse::ai_bootstrap::{probe_requested, AiRuntime};
use finpulse::config::{self, ai::DEFAULT_AI_CONFIG_PATH};
use finpulse::fx::{spawn_fx_poller, HttpFxSource};
use finpulse::ingest::providers::rss::RssProvider;
use finpulse::ingest::scheduler::{spawn_news_scheduler, IngestSchedulerCfg};
use finpulse::ingest::types::SourceProvider;
use finpulse::metrics::{listen_addr_from_env, Metrics};
use finpulse::price_stream::{PriceStreamConfig, PriceStreamManager, WsConnector};
use finpulse::{MarketBoard, NewsAggregator};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("finpulse=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    // rustls 0.23 needs a process-wide provider before the first TLS handshake.
    if CryptoProvider::install_default(ring::default_provider()).is_err() {
        warn!("rustls CryptoProvider already installed");
    }

    let cfg = config::load_default()?;
    let metrics = Metrics::init(listen_addr_from_env())?;

    let ai = match AiRuntime::from_path(DEFAULT_AI_CONFIG_PATH) {
        Ok(rt) => rt,
        Err(e) => {
            warn!(error = ?e, "AI config invalid; continuing with AI disabled");
            AiRuntime::disabled()
        }
    };
    if probe_requested() {
        ai.quick_probe().await;
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.http_timeout_secs))
        .user_agent("finpulse/0.1")
        .build()?;

    // --- News pipeline ---
    let providers: Vec<Box<dyn SourceProvider>> = cfg
        .feeds
        .iter()
        .cloned()
        .map(|src| {
            Box::new(
                RssProvider::from_url(src, http.clone())
                    .with_display_offset(cfg.display_utc_offset_hours),
            ) as Box<dyn SourceProvider>
        })
        .collect();
    info!(feeds = providers.len(), "news sources configured");

    let aggregator = Arc::new(
        NewsAggregator::new(providers, ai.service.clone())
            .with_capacity(cfg.store_capacity)
            .with_display_offset(cfg.display_utc_offset_hours),
    );
    let news_task = spawn_news_scheduler(
        aggregator.clone(),
        IngestSchedulerCfg {
            interval_secs: cfg.news_interval_secs,
        },
    );

    // --- Market data ---
    let board = MarketBoard::new();
    let prices = PriceStreamManager::spawn(
        Arc::new(WsConnector::new(cfg.price_stream_url())),
        board.clone(),
        PriceStreamConfig {
            assets: cfg.price_assets.clone(),
            reconnect_delay: Duration::from_secs(cfg.price_reconnect_delay_secs),
        },
    );
    let fx_task = spawn_fx_poller(
        Arc::new(HttpFxSource::new(http.clone(), cfg.fx_url.clone())),
        board.clone(),
        Duration::from_secs(cfg.fx_interval_secs),
    );

    info!(
        ws = %cfg.price_stream_url(),
        interval_secs = cfg.news_interval_secs,
        "finpulse running; Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;

    aggregator.pause();
    prices.pause();
    news_task.abort();
    fx_task.abort();
    prices.shutdown();

    let market = board.snapshot();
    info!(
        items = aggregator.len(),
        bullish_pct = aggregator.bullish_ratio_percent(),
        last_sync = %aggregator.last_sync_display(),
        quotes = market.quotes.len(),
        "shutdown"
    );
    let scrape = metrics.render();
    if !scrape.is_empty() {
        tracing::debug!(target: "metrics", "{scrape}");
    }
    Ok(())
}

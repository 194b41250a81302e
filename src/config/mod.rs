// src/config/mod.rs
//! Application configuration. Every field has a default, so an absent config
//! file is valid and reproduces the stock FinPulse setup.

pub mod ai;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::news::{Category, DEFAULT_DISPLAY_OFFSET_HOURS};

pub const ENV_CONFIG_PATH: &str = "FINPULSE_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/finpulse.toml";
pub const DEFAULT_JSON_PATH: &str = "config/finpulse.json";

/// One RSS source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    pub default_category: Category,
    /// Used when the channel carries no title.
    #[serde(default)]
    pub label: Option<String>,
}

impl FeedSource {
    pub fn new(url: impl Into<String>, default_category: Category) -> Self {
        Self {
            url: url.into(),
            default_category,
            label: None,
        }
    }
}

fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "https://news.google.com/rss/search?q=when:1h+financial+markets&hl=zh-TW&gl=TW&ceid=TW:zh-hant",
            Category::Macro,
        ),
        FeedSource::new(
            "https://news.google.com/rss/search?q=when:1h+stock+market+breaking&hl=zh-TW&gl=TW&ceid=TW:zh-hant",
            Category::Stock,
        ),
        FeedSource::new("https://www.coindesk.com/arc/outboundfeeds/rss/", Category::Crypto),
        FeedSource::new(
            "https://news.google.com/rss/search?q=when:1h+fed+interest+rates&hl=en-US&gl=US&ceid=US:en",
            Category::Macro,
        ),
    ]
}

fn default_news_interval_secs() -> u64 {
    45
}
fn default_store_capacity() -> usize {
    crate::store::DEFAULT_CAPACITY
}
fn default_display_offset() -> i32 {
    DEFAULT_DISPLAY_OFFSET_HOURS
}
fn default_price_ws_base() -> String {
    "wss://ws.coincap.io/prices".to_string()
}
fn default_price_assets() -> Vec<String> {
    vec!["bitcoin".to_string(), "ethereum".to_string()]
}
fn default_reconnect_delay_secs() -> u64 {
    crate::price_stream::DEFAULT_RECONNECT_DELAY.as_secs()
}
fn default_fx_url() -> String {
    crate::fx::DEFAULT_FX_URL.to_string()
}
fn default_fx_interval_secs() -> u64 {
    crate::fx::DEFAULT_FX_INTERVAL.as_secs()
}
fn default_http_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,
    #[serde(default = "default_news_interval_secs")]
    pub news_interval_secs: u64,
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,
    #[serde(default = "default_display_offset")]
    pub display_utc_offset_hours: i32,
    /// Base URL; the asset list is appended as `?assets=a,b`.
    #[serde(default = "default_price_ws_base")]
    pub price_ws_url: String,
    #[serde(default = "default_price_assets")]
    pub price_assets: Vec<String>,
    #[serde(default = "default_reconnect_delay_secs")]
    pub price_reconnect_delay_secs: u64,
    #[serde(default = "default_fx_url")]
    pub fx_url: String,
    #[serde(default = "default_fx_interval_secs")]
    pub fx_interval_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            news_interval_secs: default_news_interval_secs(),
            store_capacity: default_store_capacity(),
            display_utc_offset_hours: default_display_offset(),
            price_ws_url: default_price_ws_base(),
            price_assets: default_price_assets(),
            price_reconnect_delay_secs: default_reconnect_delay_secs(),
            fx_url: default_fx_url(),
            fx_interval_secs: default_fx_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Full subscription URL, e.g. `wss://ws.coincap.io/prices?assets=bitcoin,ethereum`.
    pub fn price_stream_url(&self) -> String {
        format!("{}?assets={}", self.price_ws_url, self.price_assets.join(","))
    }

    fn sanitize(mut self) -> Self {
        if self.store_capacity == 0 {
            self.store_capacity = default_store_capacity();
        }
        // the feed never holds more than 100 items
        self.store_capacity = self.store_capacity.min(crate::store::DEFAULT_CAPACITY);
        if self.news_interval_secs == 0 {
            self.news_interval_secs = default_news_interval_secs();
        }
        if self.fx_interval_secs == 0 {
            self.fx_interval_secs = default_fx_interval_secs();
        }
        if !(-12..=14).contains(&self.display_utc_offset_hours) {
            self.display_utc_offset_hours = default_display_offset();
        }
        self.feeds.retain(|f| !f.url.trim().is_empty());
        self
    }
}

/// Load config from an explicit path. Supports TOML or JSON.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str()).map(AppConfig::sanitize)
}

/// Load config using env var + fallbacks:
/// 1) $FINPULSE_CONFIG_PATH
/// 2) config/finpulse.toml
/// 3) config/finpulse.json
/// 4) built-in defaults
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    Ok(AppConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing json config");
    }
    match toml::from_str::<AppConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported config format: {toml_err}")),
    }
}

// src/fx.rs
//! FX poller: USD/TWD and JPY/TWD cross-rates from a USD-based rate table.
//! On failure the previous values on the board stay in place.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::market::{FxRates, MarketBoard};

pub const DEFAULT_FX_URL: &str = "https://open.er-api.com/v6/latest/USD";
pub const DEFAULT_FX_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RateTable {
    #[serde(default)]
    rates: std::collections::HashMap<String, f64>,
}

/// `usd_twd = TWD` (2 dp), `jpy_twd = TWD / JPY` (4 dp).
pub fn derive_cross_rates(body: &str) -> Result<FxRates> {
    let table: RateTable = serde_json::from_str(body).context("fx: invalid JSON")?;
    let twd = positive_rate(&table, "TWD")?;
    let jpy = positive_rate(&table, "JPY")?;
    Ok(FxRates {
        usd_twd: format!("{:.2}", twd),
        jpy_twd: format!("{:.4}", twd / jpy),
    })
}

fn positive_rate(table: &RateTable, code: &str) -> Result<f64> {
    match table.rates.get(code) {
        Some(v) if v.is_finite() && *v > 0.0 => Ok(*v),
        Some(v) => Err(anyhow!("fx: unusable {code} rate {v}")),
        None => Err(anyhow!("fx: missing {code} rate")),
    }
}

#[async_trait]
pub trait FxSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<FxRates>;
}

pub struct HttpFxSource {
    client: reqwest::Client,
    url: String,
}

impl HttpFxSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl FxSource for HttpFxSource {
    async fn fetch_rates(&self) -> Result<FxRates> {
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("fx: HTTP {}", resp.status()));
        }
        let body = resp.text().await?;
        derive_cross_rates(&body)
    }
}

/// One poll. Writes the board on success; leaves it untouched otherwise.
pub async fn poll_once(source: &dyn FxSource, board: &MarketBoard) -> bool {
    match source.fetch_rates().await {
        Ok(fx) => {
            debug!(target: "fx", usd_twd = %fx.usd_twd, jpy_twd = %fx.jpy_twd, "fx updated");
            board.set_fx(fx);
            true
        }
        Err(e) => {
            counter!("fx_fetch_errors_total").increment(1);
            warn!(target: "fx", error = %e, "fx fetch failed; keeping previous rates");
            false
        }
    }
}

/// Poll immediately, then every `interval`.
pub fn spawn_fx_poller(
    source: Arc<dyn FxSource>,
    board: MarketBoard,
    interval: Duration,
) -> JoinHandle<()> {
    let period = interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            poll_once(source.as_ref(), &board).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_cross_rates() {
        let body = r#"{"result":"success","rates":{"USD":1,"TWD":32.5,"JPY":150.0}}"#;
        let fx = derive_cross_rates(body).unwrap();
        assert_eq!(fx.usd_twd, "32.50");
        assert_eq!(fx.jpy_twd, "0.2167");
    }

    #[test]
    fn missing_or_zero_rates_are_errors() {
        assert!(derive_cross_rates(r#"{"rates":{"TWD":32.5}}"#).is_err());
        assert!(derive_cross_rates(r#"{"rates":{"TWD":32.5,"JPY":0}}"#).is_err());
        assert!(derive_cross_rates("<html>").is_err());
    }
}

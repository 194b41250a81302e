use std::net::SocketAddr;

use anyhow::Context;
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const ENV_METRICS_ADDR: &str = "FINPULSE_METRICS_ADDR";

pub struct Metrics {
    /// Present when the recorder was installed without an HTTP listener.
    pub handle: Option<PrometheusHandle>,
}

impl Metrics {
    /// Install the global Prometheus recorder. With `listen` set, the exporter
    /// serves `/metrics` on that address; otherwise call `render()` to scrape.
    pub fn init(listen: Option<SocketAddr>) -> anyhow::Result<Self> {
        let builder = PrometheusBuilder::new();

        let handle = match listen {
            Some(addr) => {
                builder
                    .with_http_listener(addr)
                    .install()
                    .context("prometheus: install exporter")?;
                None
            }
            None => Some(
                builder
                    .install_recorder()
                    .context("prometheus: install recorder")?,
            ),
        };

        crate::ingest::ensure_metrics_described();
        describe_stream_metrics();
        Ok(Self { handle })
    }

    /// Prometheus exposition text, or empty when served by the listener.
    pub fn render(&self) -> String {
        self.handle.as_ref().map(|h| h.render()).unwrap_or_default()
    }
}

/// Reads `FINPULSE_METRICS_ADDR`; unparsable values are ignored.
pub fn listen_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_METRICS_ADDR)
        .ok()
        .and_then(|v| v.trim().parse().ok())
}

fn describe_stream_metrics() {
    describe_counter!(
        "price_ws_reconnects_total",
        "Price stream connection attempts."
    );
    describe_counter!("price_ws_messages_total", "Price stream messages received.");
    describe_counter!("fx_fetch_errors_total", "Failed FX polls.");
    describe_counter!("ai_calls_total", "AI requests by operation.");
    describe_counter!("ai_failures_total", "Failed AI requests by operation.");
}

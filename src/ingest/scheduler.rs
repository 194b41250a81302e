// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aggregator::{CycleOutcome, NewsAggregator};

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval_secs: u64,
}

impl Default for IngestSchedulerCfg {
    fn default() -> Self {
        Self { interval_secs: 45 }
    }
}

/// Spawn the fixed-interval ingest loop. The first cycle runs immediately.
///
/// Cycles are awaited in-line, so this loop never overlaps itself; a tick
/// that comes due while a cycle is still running is skipped rather than
/// queued. Pausing the aggregator turns ticks into no-ops.
pub fn spawn_news_scheduler(
    aggregator: Arc<NewsAggregator>,
    cfg: IngestSchedulerCfg,
) -> JoinHandle<()> {
    let period = Duration::from_secs(cfg.interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match aggregator.run_cycle().await {
                CycleOutcome::Committed { fetched, added } => {
                    tracing::info!(
                        target: "ingest",
                        fetched,
                        added,
                        last_sync = %aggregator.last_sync_display(),
                        "ingest tick"
                    );
                }
                other => {
                    tracing::debug!(target: "ingest", outcome = ?other, "ingest tick");
                }
            }
        }
    })
}

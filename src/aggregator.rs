//! # News Aggregator
//! Orchestrates one ingest cycle: fan-out fetch → flatten/sort → dedup →
//! batched translation → commit into the bounded store.
//!
//! The aggregator owns all feed state (store, seen-id registry, last sync).
//! Collaborators get it by `Arc` handle; nothing lives in globals.
//!
//! Concurrency:
//! - a single-flight guard makes a second `run_cycle` call return
//!   `CycleOutcome::Skipped` while one is running;
//! - the commit is one critical section, so two commits never interleave;
//! - pause is checked only at cycle start. A running cycle finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tracing::{debug, info};

use crate::ai_adapter::{AiService, ANALYSIS_CONTEXT_LIMIT};
use crate::dedup::{partition_new, SeenIdRegistry};
use crate::enrich::enrich;
use crate::ingest::{self, types::SourceProvider};
use crate::news::{
    format_clock, CategoryFilter, NewsItem, Sentiment, DEFAULT_DISPLAY_OFFSET_HOURS,
};
use crate::store::NewsStore;

/// Result of one `run_cycle` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Pipeline paused; nothing fetched.
    Paused,
    /// Another cycle was still in flight.
    Skipped,
    /// Everything fetched was already known. Store and sync time untouched.
    NoNewItems { fetched: usize },
    Committed { fetched: usize, added: usize },
}

impl CycleOutcome {
    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Paused => "paused",
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::NoNewItems { .. } => "no_new",
            CycleOutcome::Committed { .. } => "committed",
        }
    }
}

#[derive(Debug, Default)]
struct FeedState {
    store: NewsStore,
    seen: SeenIdRegistry,
    last_sync: Option<DateTime<Utc>>,
}

/// Resets the in-flight flag when the cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct NewsAggregator {
    providers: Vec<Box<dyn SourceProvider>>,
    ai: AiService,
    state: Mutex<FeedState>,
    paused: AtomicBool,
    in_flight: AtomicBool,
    display_offset_hours: i32,
}

impl NewsAggregator {
    pub fn new(providers: Vec<Box<dyn SourceProvider>>, ai: AiService) -> Self {
        Self {
            providers,
            ai,
            state: Mutex::new(FeedState::default()),
            paused: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            display_offset_hours: DEFAULT_DISPLAY_OFFSET_HOURS,
        }
    }

    pub fn with_capacity(self, cap: usize) -> Self {
        {
            let mut st = self.lock();
            st.store = NewsStore::with_capacity(cap);
        }
        self
    }

    pub fn with_display_offset(mut self, hours: i32) -> Self {
        self.display_offset_hours = hours;
        self
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().expect("feed state mutex poisoned")
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        info!(target: "ingest", "news pipeline paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        info!(target: "ingest", "news pipeline resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_cycle_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one ingest cycle. Never fails: source and AI errors are absorbed.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let outcome = self.run_cycle_inner().await;
        counter!("ingest_cycles_total", "outcome" => outcome.label()).increment(1);
        outcome
    }

    async fn run_cycle_inner(&self) -> CycleOutcome {
        if self.is_paused() {
            return CycleOutcome::Paused;
        }
        let Some(_flight) = InFlight::try_acquire(&self.in_flight) else {
            debug!(target: "ingest", "cycle already in flight; skipping");
            return CycleOutcome::Skipped;
        };

        // Fetching
        let fetched = ingest::fetch_all(&self.providers).await;
        let fetched_n = fetched.len();

        // Filtering
        let mut fresh = {
            let st = self.lock();
            partition_new(&st.seen, fetched)
        };
        if fresh.is_empty() {
            debug!(target: "ingest", fetched = fetched_n, "no new items");
            return CycleOutcome::NoNewItems { fetched: fetched_n };
        }

        // Enriching
        enrich(&self.ai, &mut fresh).await;
        let added = fresh.len();

        // Committing
        let now = Utc::now();
        let store_len = {
            let mut st = self.lock();
            st.seen.commit(fresh.iter().map(|i| i.id.as_str()));
            st.store.merge(fresh);
            st.last_sync = Some(now);
            st.store.len()
        };

        counter!("ingest_new_total").increment(added as u64);
        gauge!("news_store_size").set(store_len as f64);
        gauge!("ingest_pipeline_last_run_ts").set(now.timestamp() as f64);
        info!(
            target: "ingest",
            fetched = fetched_n,
            added,
            store = store_len,
            "cycle committed"
        );

        CycleOutcome::Committed {
            fetched: fetched_n,
            added,
        }
    }

    /// Full feed, newest first.
    pub fn snapshot(&self) -> Vec<NewsItem> {
        self.lock().store.items().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().store.capacity()
    }

    pub fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }

    /// Feed restricted by category and a case-insensitive text query.
    /// An empty query matches everything.
    pub fn filtered(&self, filter: CategoryFilter, query: &str) -> Vec<NewsItem> {
        let q = query.trim().to_lowercase();
        self.lock()
            .store
            .items()
            .iter()
            .filter(|i| filter.matches(i.category))
            .filter(|i| q.is_empty() || i.text.to_lowercase().contains(&q))
            .cloned()
            .collect()
    }

    /// Share of bullish items, rounded percent. 0 for an empty feed.
    pub fn bullish_ratio_percent(&self) -> u32 {
        let st = self.lock();
        let items = st.store.items();
        let total = items.len().max(1) as f64;
        let bullish = items
            .iter()
            .filter(|i| i.sentiment == Sentiment::Bullish)
            .count() as f64;
        (bullish / total * 100.0).round() as u32
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.lock().last_sync
    }

    /// `HH:MM:SS` in the display offset, `--:--` before the first commit.
    pub fn last_sync_display(&self) -> String {
        self.last_sync()
            .map(|t| format_clock(t, self.display_offset_hours))
            .unwrap_or_else(|| "--:--".to_string())
    }

    /// Lazily fetch and attach a summary for a stored item.
    /// Returns `None` if the id is not (or no longer) in the store.
    pub async fn attach_summary(&self, id: &str) -> Option<String> {
        let text = {
            let st = self.lock();
            let item = st.store.get(id)?;
            if let Some(existing) = &item.summary {
                return Some(existing.clone());
            }
            item.text.clone()
        };

        let summary = self.ai.summarize(&text).await;

        let mut st = self.lock();
        if st.store.set_summary(id, summary.clone()) {
            Some(summary)
        } else {
            // evicted while the summary was in flight
            None
        }
    }

    fn recent_texts(&self) -> Vec<String> {
        self.lock()
            .store
            .items()
            .iter()
            .take(ANALYSIS_CONTEXT_LIMIT)
            .map(|i| i.text.clone())
            .collect()
    }

    /// Narrative outlook over the most recent headlines.
    pub async fn market_analysis(&self) -> String {
        let texts = self.recent_texts();
        self.ai.market_analysis(&texts).await
    }

    /// Free-form question answered against the most recent headlines.
    pub async fn chat_with_analyst(&self, message: &str) -> String {
        let context = self.recent_texts().join("\n");
        self.ai.chat_with_analyst(message, &context).await
    }
}

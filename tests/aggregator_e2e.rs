// tests/aggregator_e2e.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use finpulse::ai_adapter::{AiService, MockClient, CHAT_ERROR, SUMMARY_ERROR};
use finpulse::config::FeedSource;
use finpulse::ingest::providers::rss::RssProvider;
use finpulse::ingest::types::SourceProvider;
use finpulse::{Category, CategoryFilter, CycleOutcome, NewsAggregator, NewsItem, Sentiment};

const GOOGLE_XML: &str = include_str!("fixtures/google_markets.xml");
const COINDESK_XML: &str = include_str!("fixtures/coindesk.xml");
const FED_XML: &str = include_str!("fixtures/fed_rates.xml");

struct FailingProvider;

#[async_trait]
impl SourceProvider for FailingProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        Err(anyhow!("connection reset by peer"))
    }
    fn name(&self) -> &str {
        "failing"
    }
}

/// Sleeps before delegating, so a cycle stays in flight for a while.
struct SlowProvider(RssProvider);

#[async_trait]
impl SourceProvider for SlowProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        self.0.fetch_latest().await
    }
    fn name(&self) -> &str {
        "slow"
    }
}

fn google() -> RssProvider {
    RssProvider::from_fixture(
        FeedSource::new("https://news.google.com/rss/search?q=markets", Category::Macro),
        GOOGLE_XML,
    )
}

fn coindesk() -> RssProvider {
    RssProvider::from_fixture(
        FeedSource::new("https://www.coindesk.com/arc/outboundfeeds/rss/", Category::Crypto),
        COINDESK_XML,
    )
}

fn fed() -> RssProvider {
    RssProvider::from_fixture(
        FeedSource::new("https://news.google.com/rss/search?q=fed", Category::Macro),
        FED_XML,
    )
}

fn all_sources() -> Vec<Box<dyn SourceProvider>> {
    vec![Box::new(google()), Box::new(coindesk()), Box::new(fed())]
}

fn ids(items: &[NewsItem]) -> Vec<&str> {
    items.iter().map(|i| i.id.as_str()).collect()
}

#[tokio::test]
async fn same_guid_from_two_sources_is_stored_once() {
    let agg = NewsAggregator::new(all_sources(), AiService::disabled());
    let out = agg.run_cycle().await;
    assert_eq!(out, CycleOutcome::Committed { fetched: 8, added: 7 });

    let feed = agg.snapshot();
    assert_eq!(feed.iter().filter(|i| i.id == "abc123").count(), 1);
    assert_eq!(
        ids(&feed),
        vec![
            "gm-1",
            "abc123",
            "gm-3",
            "cd-2",
            "https://www.coindesk.com/policy/2024/10/14/binance-faces-new-lawsuit",
            "fr-1",
            "fr-2",
        ]
    );
    assert_eq!(agg.seen_count(), 7);
}

#[tokio::test]
async fn cycle_without_new_items_changes_nothing() {
    let agg = NewsAggregator::new(all_sources(), AiService::disabled());
    assert!(matches!(agg.run_cycle().await, CycleOutcome::Committed { .. }));
    let before = agg.snapshot();
    let sync_before = agg.last_sync();
    assert!(sync_before.is_some());

    assert_eq!(agg.run_cycle().await, CycleOutcome::NoNewItems { fetched: 8 });
    assert_eq!(agg.snapshot(), before);
    assert_eq!(agg.last_sync(), sync_before);
}

#[tokio::test]
async fn failing_source_does_not_block_the_others() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(google()),
        Box::new(FailingProvider),
        Box::new(coindesk()),
        Box::new(fed()),
    ];
    let agg = NewsAggregator::new(providers, AiService::disabled());
    assert_eq!(
        agg.run_cycle().await,
        CycleOutcome::Committed { fetched: 8, added: 7 }
    );
    assert_eq!(agg.len(), 7);
}

#[tokio::test]
async fn every_source_failing_is_a_quiet_cycle() {
    let providers: Vec<Box<dyn SourceProvider>> =
        vec![Box::new(FailingProvider), Box::new(FailingProvider)];
    let agg = NewsAggregator::new(providers, AiService::disabled());
    assert_eq!(agg.run_cycle().await, CycleOutcome::NoNewItems { fetched: 0 });
    assert!(agg.is_empty());
    assert_eq!(agg.last_sync_display(), "--:--");
}

#[tokio::test]
async fn paused_cycle_is_a_no_op() {
    let agg = NewsAggregator::new(all_sources(), AiService::disabled());
    agg.pause();
    assert_eq!(agg.run_cycle().await, CycleOutcome::Paused);
    assert!(agg.is_empty());
    assert!(agg.last_sync().is_none());

    agg.resume();
    assert!(matches!(agg.run_cycle().await, CycleOutcome::Committed { .. }));
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycle_is_skipped() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(SlowProvider(google()))];
    let agg = Arc::new(NewsAggregator::new(providers, AiService::disabled()));

    let first = {
        let agg = agg.clone();
        tokio::spawn(async move { agg.run_cycle().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(agg.is_cycle_in_flight());
    assert_eq!(agg.run_cycle().await, CycleOutcome::Skipped);

    let done = first.await.unwrap();
    assert_eq!(done, CycleOutcome::Committed { fetched: 3, added: 3 });
    assert!(!agg.is_cycle_in_flight());
}

#[tokio::test(start_paused = true)]
async fn pause_lets_in_flight_cycle_finish() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(SlowProvider(google()))];
    let agg = Arc::new(NewsAggregator::new(providers, AiService::disabled()));

    let first = {
        let agg = agg.clone();
        tokio::spawn(async move { agg.run_cycle().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(agg.is_cycle_in_flight());
    agg.pause();

    let done = first.await.unwrap();
    assert_eq!(done, CycleOutcome::Committed { fetched: 3, added: 3 });
    assert_eq!(agg.len(), 3);
    assert!(agg.last_sync().is_some());

    assert_eq!(agg.run_cycle().await, CycleOutcome::Paused);
    assert_eq!(agg.len(), 3);
}

#[tokio::test]
async fn capacity_evicts_oldest() {
    let agg = NewsAggregator::new(all_sources(), AiService::disabled()).with_capacity(4);
    agg.run_cycle().await;
    let feed = agg.snapshot();
    assert_eq!(feed.len(), 4);
    assert!(feed.windows(2).all(|w| w[0].published_ms >= w[1].published_ms));
    assert!(!feed.iter().any(|i| i.id == "fr-2"));
    // evicted ids stay known and never come back
    assert_eq!(agg.seen_count(), 7);
    assert_eq!(agg.run_cycle().await, CycleOutcome::NoNewItems { fetched: 8 });
}

#[tokio::test]
async fn translation_rewrites_text_and_keeps_category() {
    let agg = NewsAggregator::new(all_sources(), AiService::new(Arc::new(MockClient::default())));
    agg.run_cycle().await;
    let feed = agg.snapshot();
    assert!(feed.iter().all(|i| i.text.starts_with("[zh] ")));
    let btc = feed.iter().find(|i| i.id == "abc123").unwrap();
    assert_eq!(btc.category, Category::Crypto);
}

#[tokio::test]
async fn filters_and_ratio() {
    let agg = NewsAggregator::new(all_sources(), AiService::disabled());
    agg.run_cycle().await;

    let crypto = agg.filtered(CategoryFilter::Only(Category::Crypto), "");
    assert_eq!(crypto.len(), 3);
    let searched = agg.filtered(CategoryFilter::All, "  POWELL ");
    assert_eq!(ids(&searched), vec!["fr-1"]);
    assert!(agg.filtered(CategoryFilter::Only(Category::Forex), "bitcoin").is_empty());

    // abc123, gm-3, cd-2, fr-2 of 7
    assert_eq!(agg.bullish_ratio_percent(), 57);
    // keyword matching is by substring: "against" carries "gain"
    let gm3 = agg.snapshot().into_iter().find(|i| i.id == "gm-3").unwrap();
    assert_eq!(gm3.sentiment, Sentiment::Bullish);
}

#[tokio::test]
async fn summaries_attach_lazily_with_fallback() {
    let agg = NewsAggregator::new(all_sources(), AiService::disabled());
    agg.run_cycle().await;

    assert_eq!(agg.attach_summary("gm-1").await.as_deref(), Some(SUMMARY_ERROR));
    let stored = agg.snapshot().into_iter().find(|i| i.id == "gm-1").unwrap();
    assert_eq!(stored.summary.as_deref(), Some(SUMMARY_ERROR));
    assert_eq!(agg.attach_summary("unknown").await, None);

    assert_eq!(agg.chat_with_analyst("Where is BTC going?").await, CHAT_ERROR);
}

#[tokio::test]
async fn analysis_uses_mock_reply() {
    let agg = NewsAggregator::new(all_sources(), AiService::new(Arc::new(MockClient::default())));
    agg.run_cycle().await;
    assert_eq!(agg.market_analysis().await, "Neutral outlook (mock)");
    assert_eq!(agg.attach_summary("abc123").await.as_deref(), Some("Neutral outlook (mock)"));
}

#[tokio::test(start_paused = true)]
async fn scheduler_runs_first_cycle_immediately_and_honours_pause() {
    use finpulse::ingest::scheduler::{spawn_news_scheduler, IngestSchedulerCfg};

    let agg = Arc::new(NewsAggregator::new(all_sources(), AiService::disabled()));
    let task = spawn_news_scheduler(agg.clone(), IngestSchedulerCfg { interval_secs: 45 });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(agg.len(), 7);
    let first_sync = agg.last_sync();

    agg.pause();
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(agg.last_sync(), first_sync);

    task.abort();
}

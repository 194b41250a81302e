// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod news;

// News pipeline: fetch, classify, dedup, translate, store
pub mod aggregator;
pub mod classify;
pub mod dedup;
pub mod enrich;
pub mod ingest;
pub mod store;

// AI contract
pub mod ai_adapter;
pub mod ai_bootstrap;

// Market data: price stream + FX
pub mod fx;
pub mod market;
pub mod price_stream;

pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{CycleOutcome, NewsAggregator};
pub use crate::market::MarketBoard;
pub use crate::news::{Category, CategoryFilter, Importance, NewsItem, Sentiment};
pub use crate::price_stream::{ConnectionStatus, PriceStreamManager};

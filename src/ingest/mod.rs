// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::ingest::types::SourceProvider;
use crate::news::NewsItem;
use futures_util::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total items parsed from providers.");
        describe_counter!(
            "ingest_new_total",
            "Items that survived dedup and were committed to the store."
        );
        describe_counter!("ingest_cycles_total", "Ingest cycles by outcome.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_gauge!("news_store_size", "Items currently held in the feed store.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts of the last committed ingest cycle."
        );
    });
}

/// Normalize a headline: decode entities, strip tags, fold quotes and whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| {
        regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("static tag regex")
    });
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (includes NBSP)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

/// Newest first, by raw publish instant. Stable for equal instants.
pub fn sort_newest_first(items: &mut [NewsItem]) {
    items.sort_by(|a, b| b.published_ms.cmp(&a.published_ms));
}

async fn fetch_isolated(p: &dyn SourceProvider) -> Vec<NewsItem> {
    match p.fetch_latest().await {
        Ok(v) => {
            tracing::debug!(provider = p.name(), items = v.len(), "provider fetched");
            v
        }
        Err(e) => {
            tracing::warn!(error = ?e, provider = p.name(), "provider error");
            counter!("ingest_provider_errors_total").increment(1);
            Vec::new()
        }
    }
}

/// Fetch every provider concurrently and wait for all of them.
/// A failing provider contributes zero items; the error never reaches the caller.
/// Result is flattened and sorted newest first.
pub async fn fetch_all(providers: &[Box<dyn SourceProvider>]) -> Vec<NewsItem> {
    ensure_metrics_described();

    let results = join_all(providers.iter().map(|p| fetch_isolated(p.as_ref()))).await;
    let mut all: Vec<NewsItem> = results.into_iter().flatten().collect();
    sort_newest_first(&mut all);
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_and_collapses() {
        let s = "  Fed&nbsp;&nbsp;holds <b>rates</b> &ldquo;steady&rdquo;  ";
        assert_eq!(normalize_text(s), r#"Fed holds rates "steady""#);
    }

    #[test]
    fn normalize_text_keeps_trailing_question_mark() {
        assert_eq!(normalize_text("Is the rally over?"), "Is the rally over?");
    }

    #[test]
    fn normalize_text_keeps_comparison_signs() {
        assert_eq!(normalize_text("CPI < 3% > forecast"), "CPI < 3% > forecast");
    }
}

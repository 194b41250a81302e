//! # Translation enrichment
//! One batched translation call per ingest cycle, aligned back onto the items
//! by position. Sentiment and importance are recomputed afterwards because
//! display and filtering work on the translated text. Category is kept from the
//! fetch step.

use crate::ai_adapter::AiService;
use crate::classify::{classify_importance, classify_sentiment};
use crate::news::NewsItem;

/// Always returns exactly `texts.len()` strings in input order.
///
/// Surplus lines are dropped; missing or blank lines fall back to the original
/// text at that index. A failed call yields the inputs unchanged.
pub async fn translate_aligned(service: &AiService, texts: &[String]) -> Vec<String> {
    if texts.is_empty() {
        return Vec::new();
    }
    let translated = service.translate_headlines(texts).await;
    if translated.len() != texts.len() {
        tracing::warn!(
            expected = texts.len(),
            got = translated.len(),
            "translation count mismatch; aligning to input"
        );
    }
    align(texts, translated)
}

fn align(originals: &[String], translated: Vec<String>) -> Vec<String> {
    let mut it = translated.into_iter();
    originals
        .iter()
        .map(|orig| match it.next() {
            Some(t) if !t.trim().is_empty() => t,
            _ => orig.clone(),
        })
        .collect()
}

/// Rewrite `items` in place with translated text and re-derived tags.
pub async fn enrich(service: &AiService, items: &mut [NewsItem]) {
    if items.is_empty() {
        return;
    }
    let texts: Vec<String> = items.iter().map(|i| i.text.clone()).collect();
    let translated = translate_aligned(service, &texts).await;
    for (item, text) in items.iter_mut().zip(translated) {
        item.sentiment = classify_sentiment(&text);
        item.importance = classify_importance(&text);
        item.text = text;
    }
}

//! # Classifier
//! Keyword tagging for category, importance and sentiment.
//!
//! Matching is case-insensitive *substring* search, not tokenized, so "Gains"
//! matches "gain" and "wall st" matches across punctuation. Bullish keywords are
//! checked before bearish ones, so a headline that carries both reads as
//! bullish.
//!
//! All functions are pure and idempotent.

use once_cell::sync::Lazy;

use crate::news::{Category, Importance, Sentiment};

const HIGH_IMPORTANCE: &[&str] = &[
    "Fed", "CPI", "GDP", "Rates", "Inflation", "War", "Crisis", "Breaking", "Crash", "Surge",
    "Unemployment", "ECB", "BoE", "Powell", "Yellen", "Deficit", "Default", "SEC", "ETF", "Nvidia",
    "TSMC", "Apple", "聯準會", "升息", "通膨",
];

const BULLISH: &[&str] = &[
    "Surge", "Soar", "Rally", "Gain", "Profit", "Bullish", "Buy", "Upgrade", "Outperform",
    "Recovery", "Approve", "Wins", "Beat", "大漲", "反彈", "看好",
];

const BEARISH: &[&str] = &[
    "Plunge", "Tumble", "Slump", "Loss", "Bearish", "Sell", "Downgrade", "Underperform",
    "Recession", "Deny", "Lawsuit", "Miss", "暴跌", "衰退", "看淡",
];

/// Category keyword sets in priority order; first set with a hit wins.
const CATEGORY_RULES: &[(Category, &[&str])] = &[
    (
        Category::Crypto,
        &["bitcoin", "crypto", "btc", "ethereum", "binance"],
    ),
    (
        Category::Forex,
        &["fx", "currency", "dollar", "forex", "yen"],
    ),
    (
        Category::Stock,
        &["stock", "market", "nasdaq", "nvidia", "wall st"],
    ),
];

fn lowered(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

static HIGH_IMPORTANCE_LC: Lazy<Vec<String>> = Lazy::new(|| lowered(HIGH_IMPORTANCE));
static BULLISH_LC: Lazy<Vec<String>> = Lazy::new(|| lowered(BULLISH));
static BEARISH_LC: Lazy<Vec<String>> = Lazy::new(|| lowered(BEARISH));

#[inline]
fn contains_any(haystack_lc: &str, needles_lc: &[String]) -> bool {
    needles_lc.iter().any(|k| haystack_lc.contains(k.as_str()))
}

/// Scan for crypto, then forex, then stock keywords. No hit returns `fallback`
/// (the configured source's default category).
pub fn classify_category(text: &str, fallback: Category) -> Category {
    let t = text.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, words)| words.iter().any(|w| t.contains(w)))
        .map(|(cat, _)| *cat)
        .unwrap_or(fallback)
}

pub fn classify_importance(text: &str) -> Importance {
    if contains_any(&text.to_lowercase(), &HIGH_IMPORTANCE_LC) {
        Importance::High
    } else {
        Importance::Normal
    }
}

pub fn classify_sentiment(text: &str) -> Sentiment {
    let t = text.to_lowercase();
    if contains_any(&t, &BULLISH_LC) {
        Sentiment::Bullish
    } else if contains_any(&t, &BEARISH_LC) {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

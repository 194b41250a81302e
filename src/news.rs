//! # News model
//! The item type that flows through the ingest pipeline, plus the display-time
//! helpers. Ordering always uses `published_ms`; the formatted `time` string is
//! presentation only.

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Default regional display offset (Asia/Taipei, no DST).
pub const DEFAULT_DISPLAY_OFFSET_HOURS: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Macro,
    Forex,
    Crypto,
    Stock,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Macro => "macro",
            Category::Forex => "forex",
            Category::Crypto => "crypto",
            Category::Stock => "stock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// guid, else link
    pub id: String,
    /// Final display text (translated once enrichment ran).
    pub text: String,
    /// Unix milliseconds. Immutable once set.
    pub published_ms: i64,
    /// e.g. "2025-01-31 21:05" in the display offset
    pub time: String,
    pub category: Category,
    pub importance: Importance,
    pub sentiment: Sentiment,
    pub source: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Category filter used by feed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, c: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(want) => *want == c,
        }
    }
}

fn display_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

fn to_local(ms: i64, offset_hours: i32) -> Option<DateTime<FixedOffset>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.with_timezone(&display_offset(offset_hours)))
}

/// Post time, `YYYY-MM-DD HH:MM`.
pub fn format_post_time(ms: i64, offset_hours: i32) -> String {
    to_local(ms, offset_hours)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Wall clock, `HH:MM:SS`.
pub fn format_clock(at: DateTime<Utc>, offset_hours: i32) -> String {
    at.with_timezone(&display_offset(offset_hours))
        .format("%H:%M:%S")
        .to_string()
}

/// Human relative age label.
pub fn relative_time(published_ms: i64, now_ms: i64) -> String {
    let mins = now_ms.saturating_sub(published_ms) / 60_000;
    if mins < 1 {
        return "剛剛".to_string();
    }
    if mins < 60 {
        return format!("{mins} 分鐘前");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours} 小時前");
    }
    format!("{} 天前", hours / 24)
}

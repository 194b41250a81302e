use std::borrow::Cow;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::{Captures, Regex};
use serde::Deserialize;
use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    OffsetDateTime,
};

use crate::classify::{classify_category, classify_importance, classify_sentiment};
use crate::config::FeedSource;
use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;
use crate::news::{format_post_time, NewsItem, DEFAULT_DISPLAY_OFFSET_HOURS};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// `<guid isPermaLink="false">…</guid>`; only the text matters.
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// RFC 2822 (RSS) with an RFC 3339 fallback. Unparseable → 0.
pub fn parse_pub_date_ms(ts: &str) -> i64 {
    let ts = ts.trim();
    // obsolete zone names are common in feeds
    let numeric = match ts.rsplit_once(' ') {
        Some((head, "GMT" | "UT" | "UTC" | "Z")) => format!("{head} +0000"),
        _ => ts.to_string(),
    };
    OffsetDateTime::parse(&numeric, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .map(|dt| (dt.unix_timestamp_nanos() / 1_000_000) as i64)
        .unwrap_or(0)
}

/// Channel title without the "RSS Feed" boilerplate.
fn clean_label(title: &str) -> String {
    title.replace("RSS Feed", "").trim().to_string()
}

fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct RssProvider {
    source: FeedSource,
    display_offset_hours: i32,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl RssProvider {
    pub fn from_url(source: FeedSource, client: reqwest::Client) -> Self {
        Self {
            source,
            display_offset_hours: DEFAULT_DISPLAY_OFFSET_HOURS,
            mode: Mode::Http { client },
        }
    }

    /// Serves the given XML instead of hitting the network.
    pub fn from_fixture(source: FeedSource, xml: &str) -> Self {
        Self {
            source,
            display_offset_hours: DEFAULT_DISPLAY_OFFSET_HOURS,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn with_display_offset(mut self, hours: i32) -> Self {
        self.display_offset_hours = hours;
        self
    }

    fn fallback_label(&self) -> String {
        self.source
            .label
            .clone()
            .or_else(|| host_of(&self.source.url))
            .unwrap_or_else(|| self.source.url.clone())
    }

    /// Parse an RSS document into draft items.
    pub fn parse_items_from_str(&self, s: &str) -> Result<Vec<NewsItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let label = rss
            .channel
            .title
            .as_deref()
            .map(clean_label)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.fallback_label());

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let link = non_empty(it.link);
            let guid = non_empty(it.guid.map(|g| g.value));
            let Some(id) = guid.or_else(|| link.clone()) else {
                tracing::debug!(source = %label, "skipping entry without guid or link");
                continue;
            };

            let text = normalize_text(it.title.as_deref().unwrap_or_default());
            if text.is_empty() {
                continue;
            }

            let published_ms = it.pub_date.as_deref().map(parse_pub_date_ms).unwrap_or(0);

            out.push(NewsItem {
                id,
                time: format_post_time(published_ms, self.display_offset_hours),
                published_ms,
                category: classify_category(&text, self.source.default_category),
                importance: classify_importance(&text),
                sentiment: classify_sentiment(&text),
                source: label.clone(),
                url: link.unwrap_or_default(),
                text,
                summary: None,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { client } => {
                let resp = client
                    .get(&self.source.url)
                    .send()
                    .await
                    .with_context(|| format!("rss http get {}", self.source.url))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(anyhow!("rss http status {status} for {}", self.source.url));
                }
                let body = resp.text().await.context("rss http .text()")?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.source.url
    }
}

static RE_NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]{1,31});").expect("static entity regex"));

/// Feeds routinely carry HTML named entities (`&hellip;`, `&eacute;`) that XML
/// does not define. Resolve them up front; the five XML entities are left for
/// the parser and unknown names are escaped so one title cannot sink the feed.
fn scrub_html_entities_for_xml(s: &str) -> Cow<'_, str> {
    RE_NAMED_ENTITY.replace_all(s, |caps: &Captures| {
        let (whole, name) = (&caps[0], &caps[1]);
        if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
            return whole.to_string();
        }
        let decoded = html_escape::decode_html_entities(whole);
        if decoded == whole {
            format!("&amp;{name};")
        } else {
            html_escape::encode_text(&decoded).into_owned()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::{Category, Importance, Sentiment};

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Markets RSS Feed</title>
    <item>
      <title>Bitcoin &amp; ether surge after ETF approval</title>
      <link>https://example.test/a</link>
      <guid isPermaLink="false">guid-a</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Powell speaks&nbsp;today</title>
      <link>https://example.test/b</link>
      <pubDate>not a date</pubDate>
    </item>
    <item>
      <title>Orphan without identity</title>
    </item>
  </channel>
</rss>"#;

    fn provider() -> RssProvider {
        RssProvider::from_fixture(
            FeedSource::new("https://example.test/rss", Category::Macro),
            XML,
        )
    }

    #[test]
    fn rfc2822_and_rfc3339_dates() {
        assert_eq!(
            parse_pub_date_ms("Mon, 01 Jan 2024 00:00:00 GMT"),
            1_704_067_200_000
        );
        assert_eq!(parse_pub_date_ms("2024-01-01T00:00:00Z"), 1_704_067_200_000);
        assert_eq!(parse_pub_date_ms("yesterday"), 0);
    }

    #[test]
    fn parses_items_with_identity_fallback() {
        let items = provider().parse_items_from_str(XML).unwrap();
        assert_eq!(items.len(), 2);

        let a = &items[0];
        assert_eq!(a.id, "guid-a");
        assert_eq!(a.source, "Markets");
        assert_eq!(a.category, Category::Crypto);
        assert_eq!(a.sentiment, Sentiment::Bullish);
        assert_eq!(a.importance, Importance::High);
        assert_eq!(a.time, "2024-01-01 08:00");
        assert_eq!(a.text, "Bitcoin & ether surge after ETF approval");

        let b = &items[1];
        assert_eq!(b.id, "https://example.test/b");
        assert_eq!(b.published_ms, 0);
        assert_eq!(b.category, Category::Macro);
        assert_eq!(b.text, "Powell speaks today");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(provider().parse_items_from_str("<rss><channel>").is_err());
    }

    #[test]
    fn html_entities_resolve_before_parse() {
        let out = scrub_html_entities_for_xml("a&hellip; caf&eacute; &amp; &bogus; &#8230;");
        assert_eq!(out, "a\u{2026} caf\u{e9} &amp; &amp;bogus; &#8230;");
    }

    #[test]
    fn label_falls_back_to_host() {
        let xml = r#"<rss><channel><item><title>x</title>
            <link>https://e.test/1</link></item></channel></rss>"#;
        let items = provider().parse_items_from_str(xml).unwrap();
        assert_eq!(items[0].source, "example.test");
    }
}

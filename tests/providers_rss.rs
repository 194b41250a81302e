// tests/providers_rss.rs
use finpulse::config::FeedSource;
use finpulse::ingest::providers::rss::RssProvider;
use finpulse::ingest::types::SourceProvider;
use finpulse::{Category, Importance, Sentiment};

const GOOGLE_XML: &str = include_str!("fixtures/google_markets.xml");
const COINDESK_XML: &str = include_str!("fixtures/coindesk.xml");
const FED_XML: &str = include_str!("fixtures/fed_rates.xml");

fn fixture(url: &str, cat: Category, xml: &str) -> RssProvider {
    RssProvider::from_fixture(FeedSource::new(url, cat), xml)
}

#[tokio::test]
async fn google_fixture_parses_and_classifies() {
    let p = fixture("https://news.google.com/rss/search?q=markets", Category::Macro, GOOGLE_XML);
    let items = p.fetch_latest().await.expect("google parse ok");
    assert_eq!(items.len(), 3);

    let fed = &items[0];
    assert_eq!(fed.id, "gm-1");
    assert_eq!(fed.category, Category::Macro, "no category keyword → source default");
    assert_eq!(fed.importance, Importance::High);
    assert_eq!(fed.sentiment, Sentiment::Neutral);
    assert_eq!(fed.time, "2024-10-14 16:00");
    assert_eq!(fed.source, r#""when:1h financial markets" - Google 新聞"#);

    assert_eq!(items[1].category, Category::Crypto);
    assert_eq!(items[1].sentiment, Sentiment::Bullish);
    assert_eq!(items[2].category, Category::Forex);
}

#[tokio::test]
async fn link_is_identity_when_guid_missing() {
    let p = fixture(
        "https://www.coindesk.com/arc/outboundfeeds/rss/",
        Category::Crypto,
        COINDESK_XML,
    );
    let items = p.fetch_latest().await.unwrap();
    assert_eq!(items.len(), 3);
    let orphan = items.iter().find(|i| i.text.starts_with("Binance")).unwrap();
    assert_eq!(
        orphan.id,
        "https://www.coindesk.com/policy/2024/10/14/binance-faces-new-lawsuit"
    );
    assert_eq!(orphan.sentiment, Sentiment::Bearish);
    assert!(items.iter().all(|i| i.source.starts_with("CoinDesk")));
}

#[tokio::test]
async fn entities_are_decoded_and_blank_titles_skipped() {
    let p = fixture("https://news.google.com/rss/search?q=fed", Category::Macro, FED_XML);
    let items = p.fetch_latest().await.unwrap();
    assert_eq!(items.len(), 2, "blank title is dropped");
    assert_eq!(items[0].source, "Fed Interest Rates");
    assert_eq!(items[1].text, "Wall St futures gain after S&P record close");
    assert_eq!(items[1].category, Category::Stock);
    assert_eq!(items[1].sentiment, Sentiment::Bullish);
}

#[tokio::test]
async fn garbage_document_is_an_error() {
    let p = fixture("https://e.test/rss", Category::Macro, "<html><body>503</body>");
    assert!(p.fetch_latest().await.is_err());
}

#[tokio::test]
async fn html_named_entities_do_not_sink_the_feed() {
    let p = fixture(
        "https://www.reuters.com/business/rss",
        Category::Stock,
        include_str!("fixtures/reuters_entities.xml"),
    );
    let items = p.fetch_latest().await.expect("entities resolve");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "rt-1");
    assert_eq!(items[0].text, "Fed holds rates\u{2026} markets wait for Powell");
    assert_eq!(items[0].source, "Reuters Business");
    assert_eq!(items[1].text, "Nestl\u{e9} shares slump on weak outlook\u{2122}");
    assert_eq!(items[1].sentiment, Sentiment::Bearish);
}

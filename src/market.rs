//! # Market board
//! Latest crypto quotes and FX cross-rates, written by the price stream and the
//! FX poller and read by everyone else. Values are only ever overwritten; a
//! missing entry means "no data yet".

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    /// en-US formatted, e.g. "67,012.5" → "67,012.50"
    pub price: String,
    /// Absolute change; 0.0 when the feed does not provide it.
    pub change: f64,
    /// e.g. "1.25"; "0.00" when unavailable.
    pub change_percent: String,
}

impl PriceQuote {
    /// Quote from a raw price string. Change data is unavailable on the
    /// price-only stream and is coerced to zero.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let v: f64 = raw.trim().parse().ok()?;
        if !v.is_finite() {
            return None;
        }
        Some(Self {
            price: format_price(v),
            change: 0.0,
            change_percent: "0.00".to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FxRates {
    /// TWD per USD, 2 decimals
    pub usd_twd: String,
    /// TWD per JPY, 4 decimals
    pub jpy_twd: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub quotes: BTreeMap<String, PriceQuote>,
    pub fx: Option<FxRates>,
}

/// Cheap-to-clone handle.
#[derive(Debug, Clone, Default)]
pub struct MarketBoard {
    inner: Arc<RwLock<MarketSnapshot>>,
}

impl MarketBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite only the given assets; others keep their last value.
    pub fn apply_quotes<I>(&self, updates: I)
    where
        I: IntoIterator<Item = (String, PriceQuote)>,
    {
        let mut g = self.inner.write().expect("market board poisoned");
        for (asset, q) in updates {
            g.quotes.insert(asset, q);
        }
    }

    pub fn set_fx(&self, fx: FxRates) {
        let mut g = self.inner.write().expect("market board poisoned");
        g.fx = Some(fx);
    }

    pub fn quote(&self, asset: &str) -> Option<PriceQuote> {
        let g = self.inner.read().expect("market board poisoned");
        g.quotes.get(asset).cloned()
    }

    pub fn fx(&self) -> Option<FxRates> {
        self.inner.read().expect("market board poisoned").fx.clone()
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        self.inner.read().expect("market board poisoned").clone()
    }
}

/// en-US style: thousands separators, at least 2 and at most 3 decimals.
pub fn format_price(v: f64) -> String {
    let fixed = format!("{:.3}", v.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "000"));
    let frac = if frac.ends_with('0') { &frac[..2] } else { frac };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(67012.5), "67,012.50");
        assert_eq!(format_price(1234567.891), "1,234,567.891");
        assert_eq!(format_price(0.1), "0.10");
        assert_eq!(format_price(999.0), "999.00");
        assert_eq!(format_price(-1500.25), "-1,500.25");
    }

    #[test]
    fn quote_from_raw_coerces_change() {
        let q = PriceQuote::from_raw("3500.1").unwrap();
        assert_eq!(q.price, "3,500.10");
        assert_eq!(q.change, 0.0);
        assert_eq!(q.change_percent, "0.00");
        assert!(PriceQuote::from_raw("n/a").is_none());
        assert!(PriceQuote::from_raw("NaN").is_none());
    }

    #[test]
    fn partial_update_keeps_other_assets() {
        let board = MarketBoard::new();
        board.apply_quotes([
            ("bitcoin".to_string(), PriceQuote::from_raw("100").unwrap()),
            ("ethereum".to_string(), PriceQuote::from_raw("10").unwrap()),
        ]);
        board.apply_quotes([("bitcoin".to_string(), PriceQuote::from_raw("200").unwrap())]);
        assert_eq!(board.quote("bitcoin").unwrap().price, "200.00");
        assert_eq!(board.quote("ethereum").unwrap().price, "10.00");
    }
}

//! store.rs: bounded, newest-first feed of committed news items.

use std::collections::HashSet;

use crate::ingest::sort_newest_first;
use crate::news::NewsItem;

pub const DEFAULT_CAPACITY: usize = 100;

/// Invariants: unique by id, sorted descending by `published_ms`,
/// `len() <= cap`. Overflow evicts the oldest items.
#[derive(Debug, Clone)]
pub struct NewsStore {
    items: Vec<NewsItem>,
    cap: usize,
}

impl Default for NewsStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NewsStore {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            items: Vec::with_capacity(cap),
            cap,
        }
    }

    /// Prepend `fresh`, re-sort, truncate. An id already held is replaced by
    /// the incoming copy.
    pub fn merge(&mut self, fresh: Vec<NewsItem>) {
        let incoming: HashSet<&str> = fresh.iter().map(|i| i.id.as_str()).collect();
        let kept: Vec<NewsItem> = self
            .items
            .drain(..)
            .filter(|i| !incoming.contains(i.id.as_str()))
            .collect();

        let mut combined = fresh;
        combined.extend(kept);
        sort_newest_first(&mut combined);
        combined.truncate(self.cap);
        self.items = combined;
    }

    pub fn items(&self) -> &[NewsItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&NewsItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// The only in-place mutation allowed after commit.
    pub fn set_summary(&mut self, id: &str, summary: String) -> bool {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.summary = Some(summary);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}

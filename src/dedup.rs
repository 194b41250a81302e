//! # Deduplication
//! Identity-based filtering of draft items across ingest cycles.
//!
//! `partition_new` is read-only with respect to the registry. The aggregator
//! commits ids only after enrichment, so a failing translation never marks an
//! item as seen before it reached the store.

use std::collections::HashSet;

use crate::news::NewsItem;

/// Ids seen during this process lifetime. Grows without bound.
#[derive(Debug, Default, Clone)]
pub struct SeenIdRegistry {
    ids: HashSet<String>,
}

impl SeenIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn commit<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in ids {
            self.ids.insert(id.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Keep items whose id is unknown to `registry`, preserving order.
/// A repeated id within `drafts` keeps only its first occurrence.
pub fn partition_new(registry: &SeenIdRegistry, drafts: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut batch_seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(drafts.len());
    for item in drafts {
        if registry.contains(&item.id) {
            continue;
        }
        if !batch_seen.insert(item.id.clone()) {
            tracing::debug!(id = %item.id, "duplicate id within batch");
            continue;
        }
        out.push(item);
    }
    out
}

//! Feed tracking: fetch the RSS feed and report entries not seen last cycle.
//!
//! An entry is identified by its `link`. The previous snapshot lives in the
//! data directory; a missing snapshot means every current entry is new.

mod parser;

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use lawwatch_fetcher::{ACCEPT_XML, HttpFetcher};
use lawwatch_shared::{FeedEntry, FeedSnapshot, Result};
use lawwatch_storage::Storage;

// ---------------------------------------------------------------------------
// FeedTracker
// ---------------------------------------------------------------------------

/// Fetches the feed and diffs it against the stored snapshot.
#[derive(Debug, Clone)]
pub struct FeedTracker {
    fetcher: HttpFetcher,
    storage: Storage,
    feed_url: String,
}

impl FeedTracker {
    pub fn new(fetcher: HttpFetcher, storage: Storage, feed_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            storage,
            feed_url: feed_url.into(),
        }
    }

    /// Fetch and parse the feed without touching stored state.
    pub async fn fetch(&self) -> Result<FeedSnapshot> {
        let body = self.fetcher.get_bytes(&self.feed_url, ACCEPT_XML).await?;
        let xml = String::from_utf8_lossy(&body);
        parser::parse_feed(&xml)
    }

    /// Entries added since the previous cycle.
    ///
    /// The fetched snapshot replaces the stored one even when nothing is new,
    /// so entries are reported at most once. Fetch and parse failures abort
    /// before the stored snapshot is touched.
    #[instrument(skip_all, fields(url = %self.feed_url))]
    pub async fn scan(&self) -> Result<Vec<FeedEntry>> {
        let previous = match self.storage.load_snapshot().await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "stored snapshot unreadable, treating as first run");
                None
            }
        };

        let current = self.fetch().await?;
        let fresh = new_entries(&current, previous.as_ref());

        self.storage.save_snapshot(&current).await?;

        info!(
            total = current.items.len(),
            new = fresh.len(),
            "feed scanned"
        );
        Ok(fresh)
    }
}

/// Entries of `current` whose link is absent from `previous`, in feed order.
pub fn new_entries(current: &FeedSnapshot, previous: Option<&FeedSnapshot>) -> Vec<FeedEntry> {
    let seen: HashSet<&str> = previous
        .map(|p| p.items.iter().map(|e| e.link.as_str()).collect())
        .unwrap_or_default();

    current
        .items
        .iter()
        .filter(|e| !seen.contains(e.link.as_str()))
        .cloned()
        .collect()
}

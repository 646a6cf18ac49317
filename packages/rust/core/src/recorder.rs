//! Match ledger and dispatch.
//!
//! Workers share one [`MatchRecorder`]. The match counter and the on-disk
//! ledger sit behind a single lock that is never held across a network call;
//! notification happens after the lock is released.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};

use lawwatch_notify::Notifier;
use lawwatch_shared::{LedgerRecord, Match};
use lawwatch_storage::Storage;

pub struct MatchRecorder {
    storage: Storage,
    notifier: Arc<dyn Notifier>,
    matches: Mutex<u64>,
}

impl MatchRecorder {
    pub fn new(storage: Storage, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            storage,
            notifier,
            matches: Mutex::new(0),
        }
    }

    /// Count the match, append it to the ledger if it is attachment-level,
    /// then notify.
    ///
    /// Ledger and notification failures are logged and do not affect each
    /// other.
    #[instrument(skip_all, fields(url = %matched.file_url, keywords = ?matched.keywords))]
    pub async fn record_and_notify(&self, matched: Match) {
        {
            let mut count = self.matches.lock().await;
            *count += 1;

            if !matched.is_page_level() {
                let record = LedgerRecord {
                    matched: matched.clone(),
                    recorded_at: Utc::now(),
                };
                match self.storage.append_ledger(record).await {
                    Ok(len) => debug!(ledger_len = len, "match appended to ledger"),
                    Err(e) => error!(error = %e, "failed to append match to ledger"),
                }
            }
        }

        if let Err(e) = self.notifier.notify(&matched).await {
            warn!(error = %e, "notification failed");
        }
    }

    /// Matches recorded so far, page-level included.
    pub async fn count(&self) -> u64 {
        *self.matches.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingNotifier, test_storage};
    use lawwatch_shared::EntryMeta;

    fn attachment(n: usize) -> Match {
        Match {
            project_url: "https://regulation.gov.ru/projects/9".into(),
            file_url: format!("https://regulation.gov.ru/api/public/Files/GetFile/{n}"),
            keywords: vec!["транспорт".into()],
            meta: EntryMeta::default(),
        }
    }

    #[tokio::test]
    async fn concurrent_appends_are_neither_lost_nor_duplicated() {
        let storage = test_storage().await;
        let notifier = Arc::new(CountingNotifier::default());
        let recorder = Arc::new(MatchRecorder::new(storage.clone(), notifier.clone()));

        let handles: Vec<_> = (0..24)
            .map(|n| {
                let recorder = recorder.clone();
                tokio::spawn(async move { recorder.record_and_notify(attachment(n)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let ledger = storage.load_ledger().await.unwrap();
        assert_eq!(ledger.len(), 24);
        let mut urls: Vec<_> = ledger.iter().map(|r| r.matched.file_url.clone()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 24);

        assert_eq!(recorder.count().await, 24);
        assert_eq!(notifier.calls(), 24);
    }

    #[tokio::test]
    async fn page_level_matches_are_notified_but_not_persisted() {
        let storage = test_storage().await;
        let notifier = Arc::new(CountingNotifier::default());
        let recorder = MatchRecorder::new(storage.clone(), notifier.clone());

        let mut page = attachment(1);
        page.file_url = page.project_url.clone();
        recorder.record_and_notify(page).await;

        assert!(storage.load_ledger().await.unwrap().is_empty());
        assert_eq!(recorder.count().await, 1);
        assert_eq!(notifier.calls(), 1);
    }

    #[tokio::test]
    async fn ledger_failure_still_notifies() {
        let storage = test_storage().await;
        std::fs::write(storage.ledger_path(), b"{broken").unwrap();

        let notifier = Arc::new(CountingNotifier::default());
        let recorder = MatchRecorder::new(storage, notifier.clone());
        recorder.record_and_notify(attachment(1)).await;

        assert_eq!(notifier.calls(), 1);
        assert_eq!(recorder.count().await, 1);
    }

    #[tokio::test]
    async fn notify_failure_still_persists() {
        let storage = test_storage().await;
        let notifier = Arc::new(CountingNotifier::failing());
        let recorder = MatchRecorder::new(storage.clone(), notifier.clone());
        recorder.record_and_notify(attachment(1)).await;

        assert_eq!(storage.load_ledger().await.unwrap().len(), 1);
        assert_eq!(notifier.calls(), 1);
    }
}

//! File-backed state for the scan pipeline.
//!
//! The [`Storage`] struct owns one data directory:
//!
//! ```text
//! <data_dir>/
//!   rss.json               last observed feed snapshot
//!   keywords.json          {"keywords": [...]}
//!   pending.json           attachment tasks carried over to the next cycle
//!   matched/file_urls.json attachment-level match ledger
//! ```
//!
//! **Access rules:**
//! - Snapshot: written only by the feed tracker, once per cycle.
//! - Ledger: appended only by the match recorder, which serialises writers.
//! - Keywords: read once per cycle; mutated by the CLI.

mod files;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lawwatch_shared::{
    AttachmentTask, FeedSnapshot, KeywordSet, LawWatchError, LedgerRecord, Result, normalize_keyword,
};

use crate::files::{read_json, write_json};

const SNAPSHOT_FILE: &str = "rss.json";
const KEYWORDS_FILE: &str = "keywords.json";
const PENDING_FILE: &str = "pending.json";
const MATCHED_DIR: &str = "matched";
const LEDGER_FILE: &str = "file_urls.json";

/// On-disk shape of `keywords.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct KeywordsDocument {
    #[serde(default)]
    keywords: Vec<String>,
}

/// Handle to the data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Open (creating if needed) the data directory at `root`.
    pub async fn open(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root.join(MATCHED_DIR))
            .await
            .map_err(|e| {
                LawWatchError::Persistence(format!(
                    "{}: mkdir failed: {e}",
                    root.display()
                ))
            })?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(MATCHED_DIR).join(LEDGER_FILE)
    }

    pub fn keywords_path(&self) -> PathBuf {
        self.root.join(KEYWORDS_FILE)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.root.join(PENDING_FILE)
    }

    // -----------------------------------------------------------------------
    // Feed snapshot
    // -----------------------------------------------------------------------

    /// Load the previous snapshot. `None` means this is the first run.
    pub async fn load_snapshot(&self) -> Result<Option<FeedSnapshot>> {
        let snapshot = read_json(&self.snapshot_path()).await?;
        if snapshot.is_none() {
            tracing::info!("no previous feed snapshot, treating as first run");
        }
        Ok(snapshot)
    }

    /// Replace the stored snapshot with `snapshot`.
    pub async fn save_snapshot(&self, snapshot: &FeedSnapshot) -> Result<()> {
        write_json(&self.snapshot_path(), snapshot).await
    }

    // -----------------------------------------------------------------------
    // Match ledger
    // -----------------------------------------------------------------------

    /// Load every recorded attachment-level match. Missing ledger is empty.
    pub async fn load_ledger(&self) -> Result<Vec<LedgerRecord>> {
        Ok(read_json(&self.ledger_path()).await?.unwrap_or_default())
    }

    /// Read the whole ledger, append `record`, and rewrite it.
    ///
    /// Not safe for concurrent callers on its own; the caller must hold the
    /// recorder lock. Returns the ledger length after the append.
    pub async fn append_ledger(&self, record: LedgerRecord) -> Result<usize> {
        let mut ledger = self.load_ledger().await?;
        ledger.push(record);
        write_json(&self.ledger_path(), &ledger).await?;
        Ok(ledger.len())
    }

    // -----------------------------------------------------------------------
    // Keywords
    // -----------------------------------------------------------------------

    /// Current keywords; falls back to `defaults` when the file is missing or empty.
    pub async fn load_keywords(&self, defaults: &KeywordSet) -> Result<KeywordSet> {
        let doc: Option<KeywordsDocument> = read_json(&self.keywords_path()).await?;
        match doc {
            Some(doc) if !doc.keywords.is_empty() => Ok(KeywordSet::new(&doc.keywords)),
            Some(_) => {
                tracing::info!("keywords.json is empty, using default keywords");
                Ok(defaults.clone())
            }
            None => {
                tracing::debug!("keywords.json not found, using default keywords");
                Ok(defaults.clone())
            }
        }
    }

    /// Replace the stored keyword list.
    pub async fn set_keywords(&self, keywords: &KeywordSet) -> Result<()> {
        let doc = KeywordsDocument {
            keywords: keywords.as_slice().to_vec(),
        };
        write_json(&self.keywords_path(), &doc).await?;
        tracing::info!(keywords = ?keywords.as_slice(), "keywords saved");
        Ok(())
    }

    /// Add one keyword. Returns `false` if it was already present.
    pub async fn add_keyword(&self, keyword: &str, defaults: &KeywordSet) -> Result<bool> {
        let current = self.load_keywords(defaults).await?;
        let cleaned = normalize_keyword(keyword);
        if cleaned.is_empty() || current.contains(&cleaned) {
            return Ok(false);
        }

        let mut next: Vec<String> = current.as_slice().to_vec();
        next.push(cleaned);
        self.set_keywords(&KeywordSet::new(next)).await?;
        Ok(true)
    }

    /// Remove one keyword. Returns `false` if it was not present.
    ///
    /// The last keyword cannot be removed: an empty file loads as `defaults`.
    pub async fn remove_keyword(&self, keyword: &str, defaults: &KeywordSet) -> Result<bool> {
        let current = self.load_keywords(defaults).await?;
        let cleaned = normalize_keyword(keyword);
        if !current.contains(&cleaned) {
            return Ok(false);
        }

        let next = KeywordSet::new(current.iter().filter(|k| **k != cleaned));
        if next.is_empty() {
            return Err(LawWatchError::config(format!(
                "refusing to remove the last keyword {cleaned:?}"
            )));
        }
        self.set_keywords(&next).await?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Pending attachments
    // -----------------------------------------------------------------------

    /// Attachment tasks that failed in earlier cycles.
    pub async fn load_pending(&self) -> Result<Vec<AttachmentTask>> {
        Ok(read_json(&self.pending_path()).await?.unwrap_or_default())
    }

    /// Replace the pending list.
    pub async fn save_pending(&self, tasks: &[AttachmentTask]) -> Result<()> {
        write_json(&self.pending_path(), tasks).await
    }
}

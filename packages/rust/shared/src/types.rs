//! Core domain types for the scan pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// The feed document as observed at one point in time.
///
/// Persisted wholesale and replaced each cycle; never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    /// Channel title.
    #[serde(default)]
    pub title: String,
    /// Channel link.
    #[serde(default)]
    pub link: String,
    /// Entries in feed order.
    #[serde(default)]
    pub items: Vec<FeedEntry>,
}

/// One item of the feed. Identity is the `link`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    /// Publication timestamp exactly as the feed renders it.
    #[serde(default)]
    pub pub_date: String,
}

impl FeedEntry {
    /// The metadata that travels with every task and match of this entry.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            title: self.title.clone(),
            description: self.description.clone(),
            pub_date: self.pub_date.clone(),
        }
    }
}

/// Title/description/publication date carried from a feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pub_date: String,
}

// ---------------------------------------------------------------------------
// AttachmentTask
// ---------------------------------------------------------------------------

/// One attachment to fetch, extract and match. Consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentTask {
    /// Attachment download URL.
    pub file_url: String,
    /// Landing page of the owning project (the feed entry link).
    pub project_url: String,
    /// Numeric project identifier extracted from `project_url`.
    pub project_id: String,
    #[serde(flatten)]
    pub meta: EntryMeta,
    /// Number of earlier cycles in which this attachment failed to download.
    #[serde(default)]
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// A confirmed keyword hit on a project page or one of its attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub project_url: String,
    /// The page or attachment the keywords were found in.
    pub file_url: String,
    /// Matched keywords, in keyword-set order. Never empty.
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub meta: EntryMeta,
}

impl Match {
    /// A hit on the landing page markup rather than an attachment.
    pub fn is_page_level(&self) -> bool {
        self.file_url == self.project_url
    }
}

/// A persisted attachment-level match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    #[serde(flatten)]
    pub matched: Match,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// KeywordSet
// ---------------------------------------------------------------------------

/// Ordered, de-duplicated, lower-cased, trimmed, non-empty keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    /// Normalise raw input into a keyword set, keeping first-seen order.
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for kw in raw {
            let cleaned = normalize_keyword(kw.as_ref());
            if !cleaned.is_empty() && !out.contains(&cleaned) {
                out.push(cleaned);
            }
        }
        Self(out)
    }

    /// Parse a comma-separated list (the `LAWWATCH_KEYWORDS` format).
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.0.iter().any(|k| k == keyword)
    }
}

impl From<Vec<String>> for KeywordSet {
    fn from(raw: Vec<String>) -> Self {
        Self::new(raw)
    }
}

impl From<KeywordSet> for Vec<String> {
    fn from(set: KeywordSet) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a KeywordSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Trim and lower-case a single keyword.
pub fn normalize_keyword(raw: &str) -> String {
    raw.trim().to_lowercase()
}

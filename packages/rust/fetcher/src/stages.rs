//! Project stage metadata → attachment identifiers.
//!
//! The stage endpoint's schema is undocumented and drifts, so rather than
//! reading fixed paths we walk the whole JSON tree and keep every string that
//! looks like a canonical UUID.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

use lawwatch_shared::{AttachmentTask, FeedEntry, Result};

use crate::client::HttpFetcher;

/// Numeric project id inside an entry link (`.../projects/12345...`).
static PROJECT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/projects/(\d+)").expect("project id regex"));

/// Canonical RFC 4122 UUID (versions 1-5), case-insensitive.
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
    )
    .expect("uuid regex")
});

/// Resolves feed entries to the attachments of their project.
#[derive(Debug, Clone)]
pub struct StageResolver {
    fetcher: HttpFetcher,
    stages_url: String,
    file_url: String,
}

impl StageResolver {
    /// `stages_url` and `file_url` are endpoint prefixes; ids are appended.
    pub fn new(
        fetcher: HttpFetcher,
        stages_url: impl Into<String>,
        file_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            stages_url: stages_url.into(),
            file_url: file_url.into(),
        }
    }

    /// Attachment ids belonging to the project behind `entry_link`.
    ///
    /// Links without a project id resolve to no attachments.
    #[instrument(skip(self))]
    pub async fn resolve(&self, entry_link: &str) -> Result<Vec<String>> {
        let Some(project_id) = project_id(entry_link) else {
            debug!("no project id in link, page match only");
            return Ok(Vec::new());
        };

        let url = join_id(&self.stages_url, &project_id);
        let metadata = self.fetcher.get_json(&url).await?;
        let ids = collect_uuids(&metadata);

        debug!(%project_id, attachments = ids.len(), "stage metadata resolved");
        Ok(ids)
    }

    /// One [`AttachmentTask`] per attachment of `entry`'s project.
    pub async fn tasks_for(&self, entry: &FeedEntry) -> Result<Vec<AttachmentTask>> {
        let ids = self.resolve(&entry.link).await?;
        let project_id = project_id(&entry.link).unwrap_or_default();

        Ok(ids
            .iter()
            .map(|id| AttachmentTask {
                file_url: self.attachment_url(id),
                project_url: entry.link.clone(),
                project_id: project_id.clone(),
                meta: entry.meta(),
                attempts: 0,
            })
            .collect())
    }

    /// Download URL for an attachment id.
    pub fn attachment_url(&self, id: &str) -> String {
        join_id(&self.file_url, id)
    }
}

/// Extract the numeric project id from an entry link.
pub fn project_id(link: &str) -> Option<String> {
    PROJECT_ID_RE
        .captures(link)
        .map(|caps| caps[1].to_string())
}

/// Every UUID-shaped string in `value`, deduplicated, in discovery order.
pub fn collect_uuids(value: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(value, &mut seen, &mut out);
    out
}

fn walk(value: &Value, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for child in map.values() {
                walk(child, seen, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk(child, seen, out);
            }
        }
        Value::String(s) => {
            if UUID_RE.is_match(s) && seen.insert(s.clone()) {
                out.push(s.clone());
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn join_id(base: &str, id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), id)
}

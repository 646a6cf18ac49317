//! Attachment task handler: fetch, extract, match, record.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use lawwatch_fetcher::{ACCEPT_ANY, HttpFetcher};
use lawwatch_shared::{AttachmentTask, KeywordSet, Match, Result};

use crate::pool::TaskHandler;
use crate::recorder::MatchRecorder;

pub struct AttachmentProcessor {
    fetcher: HttpFetcher,
    keywords: KeywordSet,
    recorder: Arc<MatchRecorder>,
}

impl AttachmentProcessor {
    pub fn new(fetcher: HttpFetcher, keywords: KeywordSet, recorder: Arc<MatchRecorder>) -> Self {
        Self {
            fetcher,
            keywords,
            recorder,
        }
    }
}

#[async_trait]
impl TaskHandler for AttachmentProcessor {
    #[instrument(skip_all, fields(project_id = %task.project_id, url = %task.file_url))]
    async fn handle(&self, task: &AttachmentTask) -> Result<bool> {
        let bytes = self.fetcher.get_bytes(&task.file_url, ACCEPT_ANY).await?;
        let text = lawwatch_extract::extract(&bytes);
        drop(bytes);

        let keywords = lawwatch_extract::match_keywords(&text, &self.keywords);
        if keywords.is_empty() {
            debug!(chars = text.len(), "no keywords in attachment");
            return Ok(false);
        }

        self.recorder
            .record_and_notify(Match {
                project_url: task.project_url.clone(),
                file_url: task.file_url.clone(),
                keywords,
                meta: task.meta.clone(),
            })
            .await;
        Ok(true)
    }
}

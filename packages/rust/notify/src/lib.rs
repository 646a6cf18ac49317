//! Match notification sinks.
//!
//! The scan pipeline hands every confirmed [`Match`] to a [`Notifier`]
//! exactly once and never retries. Two sinks ship with the crate:
//! - [`TelegramNotifier`]: Bot API `sendDocument` with the matched file, or
//!   `sendMessage` with a link to it
//! - [`LogNotifier`]: a `tracing` event, used when no bot is configured

mod message;
mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use lawwatch_shared::{Match, Result, TelegramConfig};

pub use message::{render_caption, render_html};
pub use telegram::TelegramNotifier;

/// Delivery sink for confirmed matches.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, matched: &Match) -> Result<()>;
}

/// Logs each match instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, matched: &Match) -> Result<()> {
        info!(
            url = %matched.file_url,
            project = %matched.project_url,
            keywords = ?matched.keywords,
            title = %matched.meta.title,
            "keyword match"
        );
        Ok(())
    }
}

/// Telegram when credentials are present in the environment, otherwise logs.
pub fn notifier_from_config(config: &TelegramConfig, client: reqwest::Client) -> Arc<dyn Notifier> {
    match TelegramNotifier::from_config(config, client) {
        Some(telegram) => Arc::new(telegram),
        None => {
            warn!(
                token_env = %config.token_env,
                chat_id_env = %config.chat_id_env,
                "telegram credentials not set, matches will only be logged"
            );
            Arc::new(LogNotifier)
        }
    }
}

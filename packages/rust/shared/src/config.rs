//! Application configuration for LawWatch.
//!
//! User config lives at `~/.lawwatch/lawwatch.toml`.
//! CLI flags override environment variables, which override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LawWatchError, Result};
use crate::types::KeywordSet;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lawwatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lawwatch";

/// Comma-separated keyword list overriding `keywords` from the config file.
pub const KEYWORDS_ENV: &str = "LAWWATCH_KEYWORDS";

/// Worker count override.
pub const WORKERS_ENV: &str = "LAWWATCH_WORKERS";

// ---------------------------------------------------------------------------
// Config structs (matching lawwatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default keyword list, used when the keyword store is empty.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Feed and API endpoints.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Worker pool and network policy.
    #[serde(default)]
    pub scan: ScanSettings,

    /// On-disk state locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Telegram delivery.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// `watch` loop timing.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// `[feed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// RSS feed listing newly published drafts.
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Stage metadata endpoint; the project id is appended.
    #[serde(default = "default_stages_url")]
    pub stages_url: String,

    /// Attachment download endpoint; the file id is appended.
    #[serde(default = "default_file_url")]
    pub file_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            stages_url: default_stages_url(),
            file_url: default_file_url(),
        }
    }
}

impl FeedConfig {
    /// Every endpoint must be an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        for (key, raw) in [
            ("feed.url", &self.url),
            ("feed.stages_url", &self.stages_url),
            ("feed.file_url", &self.file_url),
        ] {
            let parsed = url::Url::parse(raw)
                .map_err(|e| LawWatchError::config(format!("{key} = {raw:?}: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(LawWatchError::config(format!(
                    "{key} = {raw:?}: expected an http(s) URL"
                )));
            }
        }
        Ok(())
    }
}

fn default_feed_url() -> String {
    "https://regulation.gov.ru/api/public/Rss/".into()
}
fn default_stages_url() -> String {
    "https://regulation.gov.ru/api/public/PublicProjects/GetProjectStages/".into()
}
fn default_file_url() -> String {
    "https://regulation.gov.ru/api/public/Files/GetFile/".into()
}

/// `[scan]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Concurrent attachment workers. Kept small for constrained hosts.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the attachment task queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delay after each processed attachment, per worker.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Deadline for each HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts for transient fetch failures.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Initial backoff between retries (doubles each attempt).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Cycles a failed attachment is carried over before it is dropped.
    #[serde(default = "default_max_carry_over")]
    pub max_carry_over: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            pacing_ms: default_pacing_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_carry_over: default_max_carry_over(),
        }
    }
}

fn default_workers() -> usize {
    3
}
fn default_queue_capacity() -> usize {
    100
}
fn default_pacing_ms() -> u64 {
    100
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_retry_attempts() -> usize {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_max_carry_over() -> u32 {
    3
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `rss.json`, `keywords.json`, `pending.json` and `matched/`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.lawwatch/data".into()
}

impl StorageConfig {
    /// `data_dir` with a leading `~` expanded.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        expand_home(&self.data_dir)
    }
}

/// `[telegram]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Name of the env var holding the bot token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Name of the env var holding the target chat id.
    #[serde(default = "default_chat_id_env")]
    pub chat_id_env: String,

    /// Bot API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Longest description (in characters) included in a message.
    #[serde(default = "default_description_limit")]
    pub description_limit: usize,

    /// Attach the matched file to the message instead of linking to it.
    #[serde(default = "default_send_as_document")]
    pub send_as_document: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            chat_id_env: default_chat_id_env(),
            api_base: default_api_base(),
            description_limit: default_description_limit(),
            send_as_document: default_send_as_document(),
        }
    }
}

fn default_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".into()
}
fn default_chat_id_env() -> String {
    "TELEGRAM_CHAT_ID".into()
}
fn default_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_description_limit() -> usize {
    500
}
fn default_send_as_document() -> bool {
    true
}

impl TelegramConfig {
    /// Resolve `(token, chat_id)` from the environment, if both are set.
    pub fn credentials(&self) -> Option<(String, String)> {
        let token = std::env::var(&self.token_env).ok().filter(|v| !v.is_empty())?;
        let chat_id = std::env::var(&self.chat_id_env).ok().filter(|v| !v.is_empty())?;
        Some((token, chat_id))
    }
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between scan cycles in `watch` mode.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Run one cycle immediately when `watch` starts.
    #[serde(default)]
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_start: false,
        }
    }
}

fn default_interval_secs() -> u64 {
    24 * 60 * 60
}

// ---------------------------------------------------------------------------
// Scan config (runtime, merged from config + env + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scan configuration handed to the coordinator at construction.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub feed_url: String,
    pub stages_url: String,
    pub file_url: String,
    pub workers: usize,
    pub queue_capacity: usize,
    pub pacing: Duration,
    pub request_timeout: Duration,
    pub retry_attempts: usize,
    pub retry_backoff: Duration,
    pub max_carry_over: u32,
}

impl From<&AppConfig> for ScanConfig {
    fn from(config: &AppConfig) -> Self {
        let workers = std::env::var(WORKERS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(config.scan.workers);

        Self {
            feed_url: config.feed.url.clone(),
            stages_url: config.feed.stages_url.clone(),
            file_url: config.feed.file_url.clone(),
            workers: workers.max(1),
            queue_capacity: config.scan.queue_capacity.max(1),
            pacing: Duration::from_millis(config.scan.pacing_ms),
            request_timeout: Duration::from_secs(config.scan.request_timeout_secs),
            retry_attempts: config.scan.retry_attempts,
            retry_backoff: Duration::from_millis(config.scan.retry_backoff_ms),
            max_carry_over: config.scan.max_carry_over,
        }
    }
}

impl AppConfig {
    /// Default keywords: `LAWWATCH_KEYWORDS` if set, else the config file list.
    pub fn default_keywords(&self) -> KeywordSet {
        match std::env::var(KEYWORDS_ENV) {
            Ok(raw) if !raw.trim().is_empty() => KeywordSet::from_csv(&raw),
            _ => KeywordSet::new(&self.keywords),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lawwatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LawWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lawwatch/lawwatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LawWatchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| LawWatchError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.feed.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LawWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LawWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LawWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the home directory.
fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| LawWatchError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None if raw == "~" => {
            dirs::home_dir().ok_or_else(|| LawWatchError::config("could not determine home directory"))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("stages_url"));
        assert!(toml_str.contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.scan.workers, 3);
        assert_eq!(parsed.scan.queue_capacity, 100);
        assert_eq!(parsed.telegram.chat_id_env, "TELEGRAM_CHAT_ID");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
keywords = ["Транспорт", "связь"]

[scan]
workers = 5

[storage]
data_dir = "/var/lib/lawwatch"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.scan.workers, 5);
        assert_eq!(config.scan.pacing_ms, 100);
        assert_eq!(config.keywords.len(), 2);
        assert_eq!(
            config.storage.resolved_data_dir().expect("resolve"),
            PathBuf::from("/var/lib/lawwatch")
        );
        assert!(config.feed.url.ends_with("/Rss/"));
        assert!(config.telegram.send_as_document);
    }

    #[test]
    fn document_delivery_can_be_disabled() {
        let config: AppConfig = toml::from_str("[telegram]\nsend_as_document = false\n").expect("parse");
        assert!(!config.telegram.send_as_document);
        assert_eq!(config.telegram.description_limit, 500);
    }

    #[test]
    fn scan_config_from_app_config() {
        let mut app = AppConfig::default();
        app.scan.queue_capacity = 0;
        let scan = ScanConfig::from(&app);
        assert_eq!(scan.pacing, Duration::from_millis(100));
        assert_eq!(scan.request_timeout, Duration::from_secs(30));
        assert_eq!(scan.queue_capacity, 1);
        assert!(scan.workers >= 1);
    }

    #[test]
    fn feed_urls_are_validated() {
        assert!(FeedConfig::default().validate().is_ok());

        let relative = FeedConfig {
            stages_url: "/api/public/PublicProjects/GetProjectStages/".into(),
            ..FeedConfig::default()
        };
        let err = relative.validate().unwrap_err();
        assert!(err.to_string().contains("feed.stages_url"));

        let ftp = FeedConfig {
            url: "ftp://regulation.gov.ru/rss".into(),
            ..FeedConfig::default()
        };
        assert!(ftp.validate().is_err());
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_home("~/data").expect("expand");
        assert!(expanded.ends_with("data"));
        assert!(expanded.is_absolute());
    }
}

//! Shared types, error model, and configuration for LawWatch.
//!
//! This crate is the foundation depended on by all other LawWatch crates.
//! It provides:
//! - [`LawWatchError`]: the unified error type
//! - Domain types ([`FeedSnapshot`], [`AttachmentTask`], [`Match`], [`KeywordSet`])
//! - Configuration ([`AppConfig`], [`ScanConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FeedConfig, KEYWORDS_ENV, ScanConfig, ScanSettings, ScheduleConfig, StorageConfig,
    TelegramConfig, WORKERS_ENV, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{LawWatchError, Result};
pub use types::{
    AttachmentTask, EntryMeta, FeedEntry, FeedSnapshot, KeywordSet, LedgerRecord, Match,
    normalize_keyword,
};

//! One scan cycle: feed diff → page check → stage resolution → worker pool.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use lawwatch_extract::match_keywords;
use lawwatch_feed::FeedTracker;
use lawwatch_fetcher::{ACCEPT_ANY, FetchOptions, HttpFetcher, StageResolver};
use lawwatch_notify::{Notifier, notifier_from_config};
use lawwatch_shared::{
    AppConfig, AttachmentTask, FeedEntry, KeywordSet, Match, Result, ScanConfig,
};
use lawwatch_storage::Storage;

use crate::attachment::AttachmentProcessor;
use crate::pool::{PoolConfig, WorkerPool};
use crate::recorder::MatchRecorder;

// ---------------------------------------------------------------------------
// Context and report
// ---------------------------------------------------------------------------

/// Everything a cycle needs, built once and reused across cycles.
pub struct ScanContext {
    pub config: ScanConfig,
    pub storage: Storage,
    pub fetcher: HttpFetcher,
    pub notifier: Arc<dyn Notifier>,
    /// Used when the keyword store is missing or empty.
    pub default_keywords: KeywordSet,
}

impl ScanContext {
    pub fn new(
        config: ScanConfig,
        storage: Storage,
        notifier: Arc<dyn Notifier>,
        default_keywords: KeywordSet,
    ) -> Result<Self> {
        let fetcher = HttpFetcher::new(FetchOptions::from(&config))?;
        Ok(Self {
            config,
            storage,
            fetcher,
            notifier,
            default_keywords,
        })
    }

    /// Build from the loaded config file: opens the data directory and picks
    /// the Telegram sink when credentials are set.
    pub async fn from_app_config(app: &AppConfig) -> Result<Self> {
        let config = ScanConfig::from(app);
        let storage = Storage::open(&app.storage.resolved_data_dir()?).await?;
        let fetcher = HttpFetcher::new(FetchOptions::from(&config))?;
        let notifier = notifier_from_config(&app.telegram, fetcher.client().clone());

        Ok(Self {
            config,
            storage,
            fetcher,
            notifier,
            default_keywords: app.default_keywords(),
        })
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Feed entries not seen in the previous cycle.
    pub new_entries: usize,
    /// Attachments re-queued from earlier cycles.
    pub carried_in: usize,
    /// Attachment tasks handed to the pool, carried-in ones included.
    pub attachments_queued: usize,
    pub page_matches: usize,
    pub attachment_matches: usize,
    /// Attachments saved for the next cycle.
    pub carried_over: usize,
    /// Attachments given up on after too many failed cycles.
    pub dropped: usize,
    /// Every recorded match, page-level included.
    pub match_count: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting cycle status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each new entry is checked and resolved.
    fn entry_scanned(&self, link: &str, current: usize, total: usize);
    /// Called when the cycle completes.
    fn done(&self, report: &CycleReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn entry_scanned(&self, _link: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &CycleReport) {}
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// Run one scan cycle.
///
/// Only feed-level failures are returned as errors; per-entry and
/// per-attachment failures are logged and skipped. Cancelling `cancel` stops
/// enqueueing, lets workers finish the task in hand, and saves whatever is
/// left as pending.
#[instrument(skip_all, fields(feed = %ctx.config.feed_url))]
pub async fn run_cycle(
    ctx: &ScanContext,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<CycleReport> {
    let start = Instant::now();
    let mut report = CycleReport::default();

    progress.phase("Loading keywords");
    let keywords = match ctx.storage.load_keywords(&ctx.default_keywords).await {
        Ok(keywords) => keywords,
        Err(e) => {
            warn!(error = %e, "keyword store unreadable, using defaults");
            ctx.default_keywords.clone()
        }
    };
    if keywords.is_empty() {
        warn!("keyword list is empty, nothing can match");
    }

    progress.phase("Checking feed");
    let tracker = FeedTracker::new(
        ctx.fetcher.clone(),
        ctx.storage.clone(),
        &ctx.config.feed_url,
    );
    let entries = tracker.scan().await?;
    report.new_entries = entries.len();

    let pending = match ctx.storage.load_pending().await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(error = %e, "pending attachments unreadable, starting fresh");
            Vec::new()
        }
    };
    report.carried_in = pending.len();

    let recorder = Arc::new(MatchRecorder::new(
        ctx.storage.clone(),
        ctx.notifier.clone(),
    ));
    let processor = Arc::new(AttachmentProcessor::new(
        ctx.fetcher.clone(),
        keywords.clone(),
        recorder.clone(),
    ));
    let pool = WorkerPool::spawn(PoolConfig::from(&ctx.config), processor, cancel.clone());
    let mut unsent: Vec<AttachmentTask> = Vec::new();

    if !pending.is_empty() {
        progress.phase("Retrying pending attachments");
        for task in pending {
            match pool.submit(task).await {
                Ok(()) => report.attachments_queued += 1,
                Err(task) => unsent.push(task),
            }
        }
    }

    progress.phase("Scanning new entries");
    let resolver = StageResolver::new(
        ctx.fetcher.clone(),
        &ctx.config.stages_url,
        &ctx.config.file_url,
    );
    let total = entries.len();

    for (i, entry) in entries.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(skipped = total - i, "cycle cancelled, remaining entries not resolved");
            break;
        }
        progress.entry_scanned(&entry.link, i + 1, total);

        if check_page(&ctx.fetcher, entry, &keywords, &recorder).await {
            report.page_matches += 1;
        }

        let tasks = tokio::select! {
            _ = cancel.cancelled() => continue,
            resolved = resolver.tasks_for(entry) => match resolved {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!(link = %entry.link, error = %e, "stage resolution failed, entry skipped");
                    continue;
                }
            },
        };

        for task in tasks {
            match pool.submit(task).await {
                Ok(()) => report.attachments_queued += 1,
                Err(task) => unsent.push(task),
            }
        }
    }

    progress.phase("Waiting for workers");
    let pool_report = pool.finish().await;
    report.attachment_matches = pool_report.matched;
    report.cancelled = cancel.is_cancelled();

    let mut untouched = pool_report.unprocessed;
    untouched.extend(unsent);
    let (next, dropped) = next_pending(pool_report.failed, untouched, ctx.config.max_carry_over);
    report.carried_over = next.len();
    report.dropped = dropped;

    if let Err(e) = ctx.storage.save_pending(&next).await {
        error!(error = %e, "failed to save pending attachments");
    }

    report.match_count = recorder.count().await;
    report.elapsed = start.elapsed();

    info!(
        new_entries = report.new_entries,
        queued = report.attachments_queued,
        matches = report.match_count,
        carried_over = report.carried_over,
        cancelled = report.cancelled,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "scan cycle complete"
    );
    progress.done(&report);
    Ok(report)
}

/// Match keywords against the entry's landing page markup.
///
/// Returns whether a page-level match was recorded. Fetch failures only skip
/// the page check; attachments are still resolved.
async fn check_page(
    fetcher: &HttpFetcher,
    entry: &FeedEntry,
    keywords: &KeywordSet,
    recorder: &MatchRecorder,
) -> bool {
    let body = match fetcher.get_bytes(&entry.link, ACCEPT_ANY).await {
        Ok(body) => body,
        Err(e) => {
            warn!(link = %entry.link, error = %e, "project page unavailable, page check skipped");
            return false;
        }
    };

    let matched = match_keywords(&String::from_utf8_lossy(&body), keywords);
    if matched.is_empty() {
        return false;
    }

    recorder
        .record_and_notify(Match {
            project_url: entry.link.clone(),
            file_url: entry.link.clone(),
            keywords: matched,
            meta: entry.meta(),
        })
        .await;
    true
}

/// Pending list for the next cycle and the number of tasks dropped.
///
/// Failed tasks count one more attempt and are dropped once they reach
/// `max_carry_over`; untouched tasks keep their count. Duplicates by file URL
/// are collapsed.
fn next_pending(
    failed: Vec<AttachmentTask>,
    untouched: Vec<AttachmentTask>,
    max_carry_over: u32,
) -> (Vec<AttachmentTask>, usize) {
    let mut seen = HashSet::new();
    let mut next = Vec::new();
    let mut dropped = 0;

    for mut task in failed {
        task.attempts += 1;
        if task.attempts >= max_carry_over {
            warn!(
                url = %task.file_url,
                attempts = task.attempts,
                "attachment dropped after repeated failures"
            );
            dropped += 1;
            continue;
        }
        if seen.insert(task.file_url.clone()) {
            next.push(task);
        }
    }

    for task in untouched {
        if seen.insert(task.file_url.clone()) {
            next.push(task);
        }
    }

    (next, dropped)
}

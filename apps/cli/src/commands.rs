//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use lawwatch_core::{CycleReport, ProgressReporter, ScanContext, Schedule, run_cycle, watch};
use lawwatch_fetcher::{FetchOptions, HttpFetcher};
use lawwatch_notify::TelegramNotifier;
use lawwatch_shared::{AppConfig, KeywordSet, ScanConfig, init_config, load_config, load_config_from};
use lawwatch_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LawWatch: keyword alerts for draft regulations.
#[derive(Parser)]
#[command(
    name = "lawwatch",
    version,
    about = "Watch the draft regulation feed and report projects that mention your keywords.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.lawwatch/lawwatch.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one scan cycle and exit.
    Scan {
        /// Number of attachment workers (overrides config and LAWWATCH_WORKERS).
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Run scan cycles on a schedule until interrupted.
    Watch {
        /// Seconds between cycles (overrides config).
        #[arg(long)]
        interval: Option<u64>,

        /// Run the first cycle immediately.
        #[arg(long)]
        now: bool,

        /// Number of attachment workers (overrides config and LAWWATCH_WORKERS).
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Manage the keyword list.
    Keywords {
        #[command(subcommand)]
        action: KeywordsAction,
    },

    /// List recorded attachment matches.
    Ledger {
        /// Show only the most recent N records.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print raw JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Check notification delivery.
    Notify {
        #[command(subcommand)]
        action: NotifyAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Keyword subcommands.
#[derive(Subcommand)]
pub(crate) enum KeywordsAction {
    /// Print the active keywords.
    List,
    /// Add keywords.
    Add {
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Remove keywords.
    Remove {
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Replace the whole list.
    Set {
        #[arg(required = true)]
        keywords: Vec<String>,
    },
}

/// Notification subcommands.
#[derive(Subcommand)]
pub(crate) enum NotifyAction {
    /// Send a test message to the configured chat.
    Test,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lawwatch=info",
        1 => "lawwatch=debug",
        _ => "lawwatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Scan { workers } => cmd_scan(config_path, workers).await,
        Command::Watch {
            interval,
            now,
            workers,
        } => cmd_watch(config_path, interval, now, workers).await,
        Command::Keywords { action } => cmd_keywords(config_path, action).await,
        Command::Ledger { limit, json } => cmd_ledger(config_path, limit, json).await,
        Command::Notify { action } => match action {
            NotifyAction::Test => cmd_notify_test(config_path).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn load(config_path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let data_dir = config.storage.resolved_data_dir()?;
    Ok(Storage::open(&data_dir).await?)
}

async fn scan_context(config: &AppConfig, workers: Option<usize>) -> Result<ScanContext> {
    let mut ctx = ScanContext::from_app_config(config).await?;
    if let Some(workers) = workers {
        if workers == 0 {
            return Err(eyre!("--workers must be at least 1"));
        }
        ctx.config.workers = workers;
    }
    Ok(ctx)
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight attachments");
            token.cancel();
        }
    });
    cancel
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scan(config_path: Option<PathBuf>, workers: Option<usize>) -> Result<()> {
    let config = load(config_path)?;
    let ctx = scan_context(&config, workers).await?;

    info!(
        feed = %ctx.config.feed_url,
        workers = ctx.config.workers,
        data_dir = %ctx.storage.root().display(),
        "starting scan"
    );

    let cancel = cancel_on_ctrl_c();
    let reporter = CliProgress::new();
    let report = run_cycle(&ctx, &reporter, &cancel).await?;

    print_report(&report);
    Ok(())
}

async fn cmd_watch(
    config_path: Option<PathBuf>,
    interval: Option<u64>,
    now: bool,
    workers: Option<usize>,
) -> Result<()> {
    let config = load(config_path)?;
    let ctx = scan_context(&config, workers).await?;

    let mut schedule = Schedule::from(&config.schedule);
    if let Some(secs) = interval {
        schedule.interval = Duration::from_secs(secs.max(1));
    }
    schedule.run_on_start |= now;

    let cancel = cancel_on_ctrl_c();
    let cycles = watch(&ctx, &schedule, &LogProgress, &cancel).await;
    println!("Stopped after {cycles} cycle(s).");
    Ok(())
}

async fn cmd_keywords(config_path: Option<PathBuf>, action: KeywordsAction) -> Result<()> {
    let config = load(config_path)?;
    let storage = open_storage(&config).await?;
    let defaults = config.default_keywords();

    match action {
        KeywordsAction::List => {}
        KeywordsAction::Add { keywords } => {
            for keyword in &keywords {
                if !storage.add_keyword(keyword, &defaults).await? {
                    println!("Already present or empty: {keyword}");
                }
            }
        }
        KeywordsAction::Remove { keywords } => {
            for keyword in &keywords {
                if !storage.remove_keyword(keyword, &defaults).await? {
                    println!("Not in list: {keyword}");
                }
            }
        }
        KeywordsAction::Set { keywords } => {
            let next = KeywordSet::new(&keywords);
            if next.is_empty() {
                return Err(eyre!("refusing to save an empty keyword list"));
            }
            storage.set_keywords(&next).await?;
        }
    }

    let active = storage.load_keywords(&defaults).await?;
    if active.is_empty() {
        println!("No keywords configured.");
    } else {
        for keyword in &active {
            println!("{keyword}");
        }
    }
    Ok(())
}

async fn cmd_ledger(config_path: Option<PathBuf>, limit: Option<usize>, json: bool) -> Result<()> {
    let config = load(config_path)?;
    let storage = open_storage(&config).await?;

    let ledger = storage.load_ledger().await?;
    let skip = limit.map_or(0, |n| ledger.len().saturating_sub(n));
    let records = &ledger[skip..];

    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No matches recorded yet.");
        return Ok(());
    }

    for record in records {
        let m = &record.matched;
        println!(
            "{}  [{}]  {}",
            record.recorded_at.format("%Y-%m-%d %H:%M"),
            m.keywords.join(", "),
            m.meta.title
        );
        println!("    {}", m.file_url);
    }
    println!();
    println!("  {} record(s) in {}", records.len(), storage.ledger_path().display());
    Ok(())
}

const TEST_MESSAGE: &str =
    "<b>LawWatch</b>\n\nТестовое сообщение: доставка уведомлений настроена.";

async fn cmd_notify_test(config_path: Option<PathBuf>) -> Result<()> {
    let config = load(config_path)?;
    let fetcher = HttpFetcher::new(FetchOptions::from(&ScanConfig::from(&config)))?;

    let Some(telegram) = TelegramNotifier::from_config(&config.telegram, fetcher.client().clone())
    else {
        return Err(eyre!(
            "telegram credentials not set: export {} and {}",
            config.telegram.token_env,
            config.telegram.chat_id_env
        ));
    };

    println!("Sending test message to chat {}...", telegram.chat_id());
    telegram.send_message(TEST_MESSAGE).await?;
    println!("Delivered.");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!();
    if report.cancelled {
        println!("  Scan interrupted; unfinished attachments saved for the next run.");
    } else {
        println!("  Scan complete.");
    }
    println!("  New entries:   {}", report.new_entries);
    println!("  Attachments:   {} queued ({} carried in)", report.attachments_queued, report.carried_in);
    println!("  Page matches:  {}", report.page_matches);
    println!("  File matches:  {}", report.attachment_matches);
    println!("  Total matches: {}", report.match_count);
    if report.carried_over > 0 || report.dropped > 0 {
        println!("  Pending:       {} ({} dropped)", report.carried_over, report.dropped);
    }
    println!("  Time:          {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// Progress reporters
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn entry_scanned(&self, link: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Scanning [{current}/{total}] {link}"));
    }

    fn done(&self, _report: &CycleReport) {
        self.spinner.finish_and_clear();
    }
}

/// Reporter for long-running `watch`: phases go to the log, not a spinner.
struct LogProgress;

impl ProgressReporter for LogProgress {
    fn phase(&self, name: &str) {
        tracing::debug!(phase = name, "cycle phase");
    }

    fn entry_scanned(&self, link: &str, current: usize, total: usize) {
        tracing::debug!(%link, current, total, "scanning entry");
    }

    fn done(&self, report: &CycleReport) {
        info!(
            new_entries = report.new_entries,
            matches = report.match_count,
            pending = report.carried_over,
            "cycle summary"
        );
    }
}

//! Periodic scan loop for `lawwatch watch`.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use lawwatch_shared::ScheduleConfig;

use crate::pipeline::{ProgressReporter, ScanContext, run_cycle};

/// When to run cycles.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub interval: Duration,
    pub run_on_start: bool,
}

impl From<&ScheduleConfig> for Schedule {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            run_on_start: config.run_on_start,
        }
    }
}

/// Run a cycle every `schedule.interval` until `cancel` fires.
///
/// Failed cycles are logged; the loop keeps going. Returns the number of
/// cycles started.
pub async fn watch(
    ctx: &ScanContext,
    schedule: &Schedule,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> u64 {
    let mut ticker = tokio::time::interval(schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !schedule.run_on_start {
        ticker.reset();
    }

    info!(interval_secs = schedule.interval.as_secs(), "watching feed");
    let mut cycles = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        cycles += 1;
        match run_cycle(ctx, progress, cancel).await {
            Ok(report) => info!(cycle = cycles, matches = report.match_count, "cycle finished"),
            Err(e) => error!(cycle = cycles, error = %e, "cycle failed"),
        }
    }

    info!(cycles, "watch stopped");
    cycles
}

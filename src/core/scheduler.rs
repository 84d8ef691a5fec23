//! Scheduling loop for automated monitoring
//!
//! A single long-lived task owns the cadence: it wakes on a coarse
//! timer, runs a price-check cycle when the configured frequency has
//! elapsed, sends the daily summary once per day at the configured
//! time, and runs history cleanup on its own interval. Cycles never
//! overlap: one cycle (retries included) completes before the next is
//! considered. An immediate check can be requested over the command
//! channel; shutdown is signalled through a `CancellationToken` and
//! observed between tasks, never mid-write.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::traits::{Notifier, PriceFetcher, PriceStore};
use crate::core::clock::Clock;
use crate::core::orchestrator::Orchestrator;
use crate::core::state::MonitoringState;

/// Commands accepted by the scheduler while running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run a price-check cycle on the next wakeup regardless of cadence
    CheckNow,
}

/// Cadence settings for the scheduling loop
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    /// Time between price-check cycles
    pub check_frequency: ChronoDuration,
    /// Local time-of-day (UTC) for the daily summary email
    pub daily_summary_time: NaiveTime,
    /// Days between history cleanup runs
    pub cleanup_interval_days: i64,
    /// Retention window passed to the store on cleanup
    pub max_history_days: u32,
    /// Wakeup granularity of the loop
    pub tick: std::time::Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            check_frequency: ChronoDuration::hours(2),
            daily_summary_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            cleanup_interval_days: 7,
            max_history_days: 90,
            tick: std::time::Duration::from_secs(60),
        }
    }
}

/// Whether a price-check cycle is due.
pub fn check_due(
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    frequency: ChronoDuration,
) -> bool {
    match last_run {
        None => true,
        Some(last) => now - last >= frequency,
    }
}

/// Whether the daily summary is due: not yet sent today and past the
/// configured time-of-day. A summary slot missed while the process was
/// down is sent on the next wakeup that day.
pub fn summary_due(
    last_summary_date: Option<NaiveDate>,
    now: DateTime<Utc>,
    at: NaiveTime,
) -> bool {
    last_summary_date != Some(now.date_naive()) && now.time() >= at
}

/// Whether history cleanup is due.
pub fn cleanup_due(
    last_cleanup_date: Option<NaiveDate>,
    now: DateTime<Utc>,
    interval_days: i64,
) -> bool {
    match last_cleanup_date {
        None => true,
        Some(last) => (now.date_naive() - last).num_days() >= interval_days,
    }
}

/// Run the monitoring loop until cancelled. Returns the final state so
/// callers can inspect or persist it on shutdown.
pub async fn scheduler_task<F, S, N, C>(
    orchestrator: Orchestrator<F, S, N, C>,
    mut state: MonitoringState,
    settings: ScheduleSettings,
    mut commands: mpsc::Receiver<SchedulerCommand>,
    cancel: CancellationToken,
) -> MonitoringState
where
    F: PriceFetcher,
    S: PriceStore,
    N: Notifier,
    C: Clock,
{
    let mut tick = interval(settings.tick);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut commands_open = true;

    info!(
        check_frequency_hours = settings.check_frequency.num_hours(),
        daily_summary_time = %settings.daily_summary_time,
        cleanup_interval_days = settings.cleanup_interval_days,
        "Scheduler started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Scheduler shutting down");
                break;
            }
            cmd = commands.recv(), if commands_open => {
                match cmd {
                    Some(SchedulerCommand::CheckNow) => {
                        info!("Immediate price check requested");
                        let stats = orchestrator.run_cycle(&mut state, &cancel).await;
                        if !stats.is_healthy() && stats.events_failed > 0 {
                            warn!("Requested check completed with all events failed");
                        }
                    }
                    None => {
                        // Command sender dropped; timer keeps the loop alive.
                        commands_open = false;
                    }
                }
            }
            _ = tick.tick() => {
                let now = orchestrator.clock().now();

                if check_due(state.last_run, now, settings.check_frequency) {
                    orchestrator.run_cycle(&mut state, &cancel).await;
                }
                if cancel.is_cancelled() {
                    info!("Scheduler shutting down");
                    break;
                }

                if summary_due(state.last_summary_date, now, settings.daily_summary_time) {
                    orchestrator.run_daily_summary(&mut state).await;
                }

                if cleanup_due(state.last_cleanup_date, now, settings.cleanup_interval_days) {
                    orchestrator.run_cleanup(settings.max_history_days).await;
                    state.last_cleanup_date = Some(now.date_naive());
                }
            }
        }
    }

    state
}

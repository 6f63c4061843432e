//! Periodic trigger for evaluation cycles.
//!
//! Every tick spawns its own cycle task, so a slow cycle never delays the
//! next tick. Overlap is resolved by the runner's single-flight guard: a tick
//! that lands mid-cycle is dropped there.

use sla_engine::{CycleOutcome, CycleRunner, NotificationDispatcher, TicketSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Counters for a finished periodic run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub ticks: u64,
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl ScheduleStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Completed(_) => self.completed += 1,
            CycleOutcome::Skipped => self.skipped += 1,
            CycleOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Run one cycle immediately
pub async fn run_once(
    runner: &CycleRunner,
    source: &dyn TicketSource,
    dispatcher: &dyn NotificationDispatcher,
) -> CycleOutcome {
    runner.run_cycle(source, dispatcher).await
}

/// Trigger a cycle every `interval` until `shutdown` turns true.
///
/// The first tick fires immediately. In-flight cycles are awaited before
/// returning.
pub async fn run_periodic(
    runner: Arc<CycleRunner>,
    source: Arc<dyn TicketSource>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> ScheduleStats {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut stats = ScheduleStats::default();
    let mut in_flight: JoinSet<CycleOutcome> = JoinSet::new();

    info!(interval_secs = interval.as_secs_f64(), "Periodic SLA evaluation started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                stats.ticks += 1;
                let runner = Arc::clone(&runner);
                let source = Arc::clone(&source);
                let dispatcher = Arc::clone(&dispatcher);
                in_flight.spawn(async move {
                    runner.run_cycle(source.as_ref(), dispatcher.as_ref()).await
                });
            }
            Some(joined) = in_flight.join_next() => {
                record_joined(&mut stats, joined);
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    debug!("Shutdown channel closed");
                    break;
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        record_joined(&mut stats, joined);
    }

    info!(
        ticks = stats.ticks,
        completed = stats.completed,
        skipped = stats.skipped,
        failed = stats.failed,
        "Periodic SLA evaluation stopped"
    );
    stats
}

fn record_joined(stats: &mut ScheduleStats, joined: Result<CycleOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => stats.record(&outcome),
        Err(e) => {
            warn!("Cycle task ended abnormally: {}", e);
            stats.failed += 1;
        }
    }
}

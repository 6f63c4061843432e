//! Cycle Runner — one fetch → evaluate → classify → aggregate → dispatch pass
//!
//! # State machine
//!
//! ```text
//!          trigger (CAS Idle → Running)
//!   Idle ───────────────────────────────▶ Running
//!    ▲                                       │
//!    └──────── completion / failure ─────────┘
//!
//!   trigger while Running → dropped (CycleOutcome::Skipped)
//! ```
//!
//! The flag is the only mutable state shared across cycles. It is released by
//! a drop guard, so a cycle that errors, returns early or unwinds still
//! leaves the runner `Idle`.

use crate::aggregator::{CycleAggregator, CycleBatch, EscalationEntry, SkippedTicket};
use crate::classifier::EscalationTier;
use crate::clock::Clock;
use crate::error::SlaError;
use crate::evaluator::SlaEvaluator;
use crate::policy::SlaPolicy;
use crate::ticket::Ticket;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Supplies the active, normalized tickets for a cycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn fetch_tickets(&self) -> anyhow::Result<Vec<Ticket>>;
}

/// Delivers one tier's batch. Called at most once per non-empty tier per cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, tier: EscalationTier, batch: &[EscalationEntry]) -> anyhow::Result<()>;
}

/// Runner state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Idle,
    Running,
}

impl RunnerState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
        }
    }

    fn from_u8(raw: u8) -> Self {
        if raw == Self::Running.as_u8() {
            Self::Running
        } else {
            Self::Idle
        }
    }
}

/// Summary of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub tickets_fetched: usize,
    pub violations: usize,
    pub criticals: usize,
    pub warnings: usize,
    pub within_sla: usize,
    pub skipped: Vec<SkippedTicket>,
    /// Tiers handed to the dispatcher successfully, in dispatch order
    pub dispatched: Vec<EscalationTier>,
    pub dispatch_failures: Vec<SlaError>,
}

impl CycleReport {
    fn new(cycle_id: Uuid, evaluated_at: DateTime<Utc>, fetched: usize, batch: &CycleBatch) -> Self {
        Self {
            cycle_id,
            evaluated_at,
            tickets_fetched: fetched,
            violations: batch.violations.len(),
            criticals: batch.criticals.len(),
            warnings: batch.warnings.len(),
            within_sla: batch.within_sla,
            skipped: batch.skipped.clone(),
            dispatched: Vec::new(),
            dispatch_failures: Vec::new(),
        }
    }

    /// Whether every non-empty tier reached the dispatcher
    pub fn fully_dispatched(&self) -> bool {
        self.dispatch_failures.is_empty()
    }
}

/// Result of one trigger
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Another cycle was running; the trigger was dropped
    Skipped,
    /// The cycle ran to the end (individual dispatches may still have failed)
    Completed(CycleReport),
    /// The cycle was abandoned before dispatch
    Failed(SlaError),
}

impl CycleOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Single-flight orchestrator for evaluation cycles
#[derive(Debug)]
pub struct CycleRunner {
    policy: Arc<SlaPolicy>,
    clock: Arc<dyn Clock>,
    aggregator: CycleAggregator,
    state: AtomicU8,
}

/// Returns the runner to `Idle` when dropped
struct RunningGuard<'a> {
    state: &'a AtomicU8,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.state.store(RunnerState::Idle.as_u8(), Ordering::Release);
    }
}

impl CycleRunner {
    pub fn new(policy: Arc<SlaPolicy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            aggregator: CycleAggregator::default(),
            state: AtomicU8::new(RunnerState::Idle.as_u8()),
        }
    }

    /// Replace the default lenient evaluator
    pub fn with_evaluator(mut self, evaluator: SlaEvaluator) -> Self {
        self.aggregator = CycleAggregator::new(evaluator);
        self
    }

    pub fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn policy(&self) -> &SlaPolicy {
        &self.policy
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.state
            .compare_exchange(
                RunnerState::Idle.as_u8(),
                RunnerState::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| RunningGuard { state: &self.state })
    }

    /// Run one cycle, or drop the trigger if a cycle is already running
    pub async fn run_cycle(
        &self,
        source: &dyn TicketSource,
        dispatcher: &dyn NotificationDispatcher,
    ) -> CycleOutcome {
        let Some(_guard) = self.try_begin() else {
            debug!("Cycle already running, trigger dropped");
            return CycleOutcome::Skipped;
        };

        let cycle_id = Uuid::new_v4();
        let now = self.clock.now();
        debug!(%cycle_id, %now, "Cycle started");

        let tickets = match source.fetch_tickets().await {
            Ok(tickets) => tickets,
            Err(e) => {
                let err = SlaError::SourceFailure(format!("{e:#}"));
                error!(%cycle_id, code = err.code(), "Cycle aborted: {}", err);
                return CycleOutcome::Failed(err);
            }
        };

        let batch = self.aggregator.aggregate(&tickets, &self.policy, now);
        let mut report = CycleReport::new(cycle_id, now, tickets.len(), &batch);

        for tier in batch.non_empty_tiers() {
            let entries = batch.tier(tier);
            match dispatcher.dispatch(tier, entries).await {
                Ok(()) => {
                    debug!(%cycle_id, %tier, count = entries.len(), "Batch dispatched");
                    report.dispatched.push(tier);
                }
                Err(e) => {
                    let err = SlaError::DispatchFailure {
                        tier,
                        message: format!("{e:#}"),
                    };
                    warn!(%cycle_id, %tier, code = err.code(), "{}", err);
                    report.dispatch_failures.push(err);
                }
            }
        }

        info!(
            %cycle_id,
            fetched = report.tickets_fetched,
            violations = report.violations,
            criticals = report.criticals,
            warnings = report.warnings,
            within_sla = report.within_sla,
            skipped = report.skipped.len(),
            dispatch_failures = report.dispatch_failures.len(),
            "Cycle complete"
        );

        CycleOutcome::Completed(report)
    }
}

//! SLA Evaluator — pure mapping of (ticket, policy, now) to an [`SlaStatus`]
//!
//! The evaluator never reads the wall clock; `now` is always passed in.
//! All figures are kept at full precision. Rounding happens only in
//! [`SlaStatus::summary`], which is for presentation and never feeds
//! classification.

use crate::error::{SlaError, SlaResult};
use crate::policy::SlaPolicy;
use crate::ticket::Ticket;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const NANOS_PER_HOUR: f64 = 3_600_000_000_000.0;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Derived SLA position of a ticket at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaStatus {
    /// Allotment resolved from the ticket's priority
    pub sla_hours: f64,
    /// Parsed creation instant
    pub created_at: DateTime<Utc>,
    /// `created_at + sla_hours`
    pub deadline: DateTime<Utc>,
    /// Instant the status was computed for
    pub evaluated_at: DateTime<Utc>,
    /// Time since creation; zero for future-dated tickets
    pub hours_elapsed: f64,
    /// Time until the deadline; negative once past it
    pub hours_remaining: f64,
    /// Elapsed over allotted time as one ratio of whole durations,
    /// unbounded above 1.0
    pub percentage_used: f64,
    /// `evaluated_at > deadline`, strictly
    pub is_violated: bool,
    /// Time past the deadline; zero unless violated
    pub hours_overdue: f64,
}

/// Presentation view of an [`SlaStatus`] with figures rounded to 2 decimals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub sla_hours: f64,
    pub deadline: DateTime<Utc>,
    pub hours_elapsed: f64,
    pub hours_remaining: f64,
    /// Percent of the allotment used (0-100+, not a fraction)
    pub percent_used: f64,
    pub hours_overdue: f64,
    pub is_violated: bool,
}

impl SlaStatus {
    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            sla_hours: round2(self.sla_hours),
            deadline: self.deadline,
            hours_elapsed: round2(self.hours_elapsed),
            hours_remaining: round2(self.hours_remaining),
            percent_used: round2(self.percentage_used * 100.0),
            hours_overdue: round2(self.hours_overdue),
            is_violated: self.is_violated,
        }
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Evaluates tickets against a policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlaEvaluator {
    /// How far in the future a creation time may lie before the ticket is
    /// rejected. `None` accepts any future-dated ticket with zero elapsed time.
    pub max_future_skew: Option<Duration>,
}

impl SlaEvaluator {
    /// Lenient evaluator: future-dated tickets are never rejected
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject tickets created more than `skew` after `now`
    pub fn with_max_future_skew(skew: Duration) -> Self {
        Self {
            max_future_skew: Some(skew),
        }
    }

    /// Compute the SLA status of `ticket` at `now`
    pub fn evaluate(
        &self,
        ticket: &Ticket,
        policy: &SlaPolicy,
        now: DateTime<Utc>,
    ) -> SlaResult<SlaStatus> {
        let invalid = |reason: String| SlaError::InvalidTimestamp {
            ticket_id: ticket.id.clone(),
            value: ticket.created_at.clone(),
            reason,
        };

        let created_at = ticket.created_at_utc().map_err(invalid)?;

        if created_at > now {
            if let Some(skew) = self.max_future_skew {
                if created_at - now > skew {
                    return Err(invalid(format!(
                        "{:.2}h in the future",
                        hours_between(now, created_at)
                    )));
                }
            }
        }

        let sla_hours = policy.hours_for(ticket.priority.as_deref());
        let deadline = created_at
            .checked_add_signed(duration_from_hours(sla_hours))
            .ok_or_else(|| invalid("deadline out of range".to_string()))?;

        let hours_elapsed = hours_between(created_at, now).max(0.0);
        let hours_remaining = hours_between(now, deadline);
        let is_violated = now > deadline;
        let hours_overdue = if is_violated {
            hours_between(deadline, now)
        } else {
            0.0
        };

        Ok(SlaStatus {
            sla_hours,
            created_at,
            deadline,
            evaluated_at: now,
            hours_elapsed,
            hours_remaining,
            percentage_used: fraction_used(created_at, deadline, now),
            is_violated,
            hours_overdue,
        })
    }
}

/// Evaluate with the lenient default evaluator
pub fn evaluate(ticket: &Ticket, policy: &SlaPolicy, now: DateTime<Utc>) -> SlaResult<SlaStatus> {
    SlaEvaluator::default().evaluate(ticket, policy, now)
}

/// Signed fractional hours from `from` to `to`
fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / NANOS_PER_HOUR,
        None => delta.num_milliseconds() as f64 / MILLIS_PER_HOUR,
    }
}

/// Share of `created_at..deadline` consumed at `now`.
///
/// Divides the two spans directly so an instant exactly at a threshold
/// yields that threshold's float, whatever the allotment.
fn fraction_used(created_at: DateTime<Utc>, deadline: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed = now - created_at;
    if elapsed <= Duration::zero() {
        return 0.0;
    }
    let allotted = deadline - created_at;
    match (elapsed.num_nanoseconds(), allotted.num_nanoseconds()) {
        (Some(e), Some(a)) => e as f64 / a as f64,
        _ => elapsed.num_milliseconds() as f64 / allotted.num_milliseconds() as f64,
    }
}

fn duration_from_hours(hours: f64) -> Duration {
    let nanos = hours * NANOS_PER_HOUR;
    if nanos < i64::MAX as f64 {
        Duration::nanoseconds(nanos.round() as i64)
    } else {
        Duration::milliseconds((hours * MILLIS_PER_HOUR).round() as i64)
    }
}

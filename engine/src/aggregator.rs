//! Cycle Aggregator — stable partition of tickets into per-tier batches
//!
//! Tickets are evaluated in input order. Each valid ticket lands in exactly
//! one tier; tickets that fail evaluation are skipped and reported, never
//! fatal to the cycle.

use crate::classifier::{EscalationClassifier, EscalationTier};
use crate::evaluator::{SlaEvaluator, SlaStatus};
use crate::policy::SlaPolicy;
use crate::ticket::Ticket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A ticket paired with the status that placed it in its tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationEntry {
    pub ticket: Ticket,
    pub status: SlaStatus,
}

/// A ticket left out of the cycle because it could not be evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTicket {
    pub ticket_id: String,
    pub reason: String,
}

/// Per-cycle partition of tickets by tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleBatch {
    pub violations: Vec<EscalationEntry>,
    pub criticals: Vec<EscalationEntry>,
    pub warnings: Vec<EscalationEntry>,
    /// Valid tickets classified as [`EscalationTier::None`]
    pub within_sla: usize,
    pub skipped: Vec<SkippedTicket>,
}

impl CycleBatch {
    /// Entries for one tier. `None` has no entries.
    pub fn tier(&self, tier: EscalationTier) -> &[EscalationEntry] {
        match tier {
            EscalationTier::Violation => &self.violations,
            EscalationTier::Critical => &self.criticals,
            EscalationTier::Warning => &self.warnings,
            EscalationTier::None => &[],
        }
    }

    /// Tiers with at least one entry, in dispatch order
    pub fn non_empty_tiers(&self) -> impl Iterator<Item = EscalationTier> + '_ {
        EscalationTier::DISPATCH_ORDER
            .into_iter()
            .filter(|tier| !self.tier(*tier).is_empty())
    }

    /// Number of valid tickets, escalated or not
    pub fn classified_count(&self) -> usize {
        self.escalated_count() + self.within_sla
    }

    /// Number of tickets in a notifying tier
    pub fn escalated_count(&self) -> usize {
        self.violations.len() + self.criticals.len() + self.warnings.len()
    }

    pub fn is_quiet(&self) -> bool {
        self.escalated_count() == 0
    }

    fn push(&mut self, tier: EscalationTier, entry: EscalationEntry) {
        match tier {
            EscalationTier::Violation => self.violations.push(entry),
            EscalationTier::Critical => self.criticals.push(entry),
            EscalationTier::Warning => self.warnings.push(entry),
            EscalationTier::None => self.within_sla += 1,
        }
    }
}

/// Builds a [`CycleBatch`] from a ticket list
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleAggregator {
    evaluator: SlaEvaluator,
}

impl CycleAggregator {
    pub fn new(evaluator: SlaEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn aggregate(&self, tickets: &[Ticket], policy: &SlaPolicy, now: DateTime<Utc>) -> CycleBatch {
        let classifier = EscalationClassifier::from_policy(policy);
        let mut batch = CycleBatch::default();

        for ticket in tickets {
            let status = match self.evaluator.evaluate(ticket, policy, now) {
                Ok(status) => status,
                Err(e) => {
                    warn!(ticket_id = %ticket.id, code = e.code(), "Skipping ticket: {}", e);
                    batch.skipped.push(SkippedTicket {
                        ticket_id: ticket.id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let tier = classifier.classify(&status);
            batch.push(
                tier,
                EscalationEntry {
                    ticket: ticket.clone(),
                    status,
                },
            );
        }

        batch
    }
}

/// Aggregate with the lenient default evaluator
pub fn aggregate(tickets: &[Ticket], policy: &SlaPolicy, now: DateTime<Utc>) -> CycleBatch {
    CycleAggregator::default().aggregate(tickets, policy, now)
}

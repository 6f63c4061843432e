//! SLA Escalation Engine
//!
//! Deterministic evaluation of support tickets against priority-based
//! deadlines, with tiered escalation and single-flight evaluation cycles.
//!
//! # Pipeline
//!
//! ```text
//! TicketSource ──▶ CycleRunner ──▶ SlaEvaluator ──▶ EscalationClassifier
//!                      │               (per ticket)       (per ticket)
//!                      ▼
//!               CycleAggregator ──▶ NotificationDispatcher (once per tier)
//! ```
//!
//! Everything except [`CycleRunner::run_cycle`] is pure and synchronous.
//! Time enters only through the [`Clock`] trait, so a cycle is fully
//! reproducible under a [`ManualClock`].
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use sla_engine::{classify, evaluate, EscalationTier, SlaPolicy, Ticket};
//!
//! let created = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
//! let ticket = Ticket::created("T-100", created).with_priority("high");
//! let policy = SlaPolicy::default();
//!
//! let status = evaluate(&ticket, &policy, created + Duration::hours(7)).unwrap();
//! assert_eq!(classify(&status, &policy), EscalationTier::Warning);
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod aggregator;
pub mod classifier;
pub mod clock;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod runner;
pub mod ticket;

pub use aggregator::{aggregate, CycleAggregator, CycleBatch, EscalationEntry, SkippedTicket};
pub use classifier::{classify, EscalationClassifier, EscalationTier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SlaError, SlaResult};
pub use evaluator::{evaluate, round2, SlaEvaluator, SlaStatus, StatusSummary};
pub use policy::{Priority, SlaPolicy, SlaPolicyConfig};
pub use runner::{
    CycleOutcome, CycleReport, CycleRunner, NotificationDispatcher, RunnerState, TicketSource,
};
pub use ticket::{parse_timestamp, Ticket};

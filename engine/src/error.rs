//! Engine error types
//!
//! Only [`SlaError::InvalidPolicy`] is fatal. Every other variant is scoped to
//! a single ticket, tier or cycle and hands control back to the caller so the
//! next trigger can fire.

use crate::classifier::EscalationTier;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for engine operations
pub type SlaResult<T> = Result<T, SlaError>;

/// Errors raised by the SLA engine
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaError {
    /// Policy configuration violates its invariants (startup error)
    #[error("invalid SLA policy: {field} {reason}")]
    InvalidPolicy { field: String, reason: String },

    /// A ticket's creation timestamp cannot be evaluated
    #[error("ticket {ticket_id}: invalid timestamp {value:?} ({reason})")]
    InvalidTimestamp {
        ticket_id: String,
        value: String,
        reason: String,
    },

    /// The ticket source failed; the whole cycle is abandoned
    #[error("ticket source failed: {0}")]
    SourceFailure(String),

    /// The dispatcher rejected one tier's batch
    #[error("dispatch of {tier} batch failed: {message}")]
    DispatchFailure {
        tier: EscalationTier,
        message: String,
    },
}

impl SlaError {
    pub(crate) fn invalid_policy(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the hosting process can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidPolicy { .. })
    }

    /// Stable machine-readable code, used as a structured log field
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPolicy { .. } => "INVALID_POLICY",
            Self::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            Self::SourceFailure(_) => "SOURCE_FAILURE",
            Self::DispatchFailure { .. } => "DISPATCH_FAILURE",
        }
    }
}

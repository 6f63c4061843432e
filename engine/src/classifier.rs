//! Escalation Classifier — maps an [`SlaStatus`] to a single tier
//!
//! Precedence is fixed, highest severity first:
//!
//! ```text
//! is_violated (now > deadline, strict)      → Violation
//! percentage_used >= critical_fraction      → Critical
//! percentage_used >= warning_fraction       → Warning
//! otherwise                                 → None
//! ```
//!
//! A violated ticket is never also counted as critical or warning.

use crate::evaluator::SlaStatus;
use crate::policy::SlaPolicy;
use serde::{Deserialize, Serialize};

/// Escalation severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTier {
    /// Comfortably within SLA
    None,
    /// Past the warning threshold
    Warning,
    /// Past the critical threshold, deadline not yet passed
    Critical,
    /// Deadline passed
    Violation,
}

impl EscalationTier {
    /// Tiers that produce notifications, in dispatch order
    pub const DISPATCH_ORDER: [EscalationTier; 3] = [Self::Violation, Self::Critical, Self::Warning];

    /// Whether this tier produces a notification
    pub fn is_escalated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for EscalationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Violation => write!(f, "violation"),
        }
    }
}

/// Threshold classifier built from a policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationClassifier {
    warning_fraction: f64,
    critical_fraction: f64,
}

impl EscalationClassifier {
    pub fn from_policy(policy: &SlaPolicy) -> Self {
        Self {
            warning_fraction: policy.warning_fraction(),
            critical_fraction: policy.critical_fraction(),
        }
    }

    /// Classify a status. Uses full-precision figures only.
    pub fn classify(&self, status: &SlaStatus) -> EscalationTier {
        if status.is_violated {
            EscalationTier::Violation
        } else if status.percentage_used >= self.critical_fraction {
            EscalationTier::Critical
        } else if status.percentage_used >= self.warning_fraction {
            EscalationTier::Warning
        } else {
            EscalationTier::None
        }
    }
}

/// Classify `status` against `policy`'s thresholds
pub fn classify(status: &SlaStatus, policy: &SlaPolicy) -> EscalationTier {
    EscalationClassifier::from_policy(policy).classify(status)
}

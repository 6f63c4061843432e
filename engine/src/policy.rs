//! SLA Policy — priority to allotted hours, plus escalation thresholds
//!
//! A policy is validated once, at construction, and never mutated afterwards.
//! Lookups are total: any priority the policy does not recognise resolves to
//! the default allotment.

use crate::error::{SlaError, SlaResult};
use serde::{Deserialize, Serialize};

/// Ticket priorities the policy knows by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All known priorities, most urgent first
    pub const ALL: [Priority; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// Case-insensitive match against the four known priorities
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw policy options, as read from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaPolicyConfig {
    /// Hours allowed for critical tickets
    pub critical: f64,
    /// Hours allowed for high-priority tickets
    pub high: f64,
    /// Hours allowed for medium-priority tickets
    pub medium: f64,
    /// Hours allowed for low-priority tickets
    pub low: f64,
    /// Hours allowed when the priority is missing or unrecognised
    pub default: f64,
    /// Share of the allotment after which a ticket is a warning
    pub warning_fraction: f64,
    /// Share of the allotment after which a ticket is critical
    pub critical_fraction: f64,
}

impl Default for SlaPolicyConfig {
    fn default() -> Self {
        Self {
            critical: 4.0,
            high: 8.0,
            medium: 24.0,
            low: 72.0,
            default: 24.0,
            warning_fraction: 0.80,
            critical_fraction: 0.95,
        }
    }
}

/// Validated, immutable SLA policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaPolicy {
    critical_hours: f64,
    high_hours: f64,
    medium_hours: f64,
    low_hours: f64,
    default_hours: f64,
    warning_fraction: f64,
    critical_fraction: f64,
}

impl SlaPolicy {
    /// Validate `config` and build a policy from it
    pub fn new(config: SlaPolicyConfig) -> SlaResult<Self> {
        for (field, hours) in [
            ("critical", config.critical),
            ("high", config.high),
            ("medium", config.medium),
            ("low", config.low),
            ("default", config.default),
        ] {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(SlaError::invalid_policy(
                    field,
                    format!("must be a positive number of hours, got {hours}"),
                ));
            }
        }

        let warning = config.warning_fraction;
        let critical = config.critical_fraction;
        if !(warning > 0.0 && warning < 1.0) {
            return Err(SlaError::invalid_policy(
                "warning_fraction",
                format!("must lie strictly between 0 and 1, got {warning}"),
            ));
        }
        if !(critical > 0.0 && critical < 1.0) {
            return Err(SlaError::invalid_policy(
                "critical_fraction",
                format!("must lie strictly between 0 and 1, got {critical}"),
            ));
        }
        if warning >= critical {
            return Err(SlaError::invalid_policy(
                "warning_fraction",
                format!("must be below critical_fraction ({warning} >= {critical})"),
            ));
        }

        Ok(Self {
            critical_hours: config.critical,
            high_hours: config.high,
            medium_hours: config.medium,
            low_hours: config.low,
            default_hours: config.default,
            warning_fraction: warning,
            critical_fraction: critical,
        })
    }

    /// Hours allotted to a known priority
    pub fn hours_for_priority(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Critical => self.critical_hours,
            Priority::High => self.high_hours,
            Priority::Medium => self.medium_hours,
            Priority::Low => self.low_hours,
        }
    }

    /// Hours allotted to a ticket's raw priority value.
    ///
    /// Missing and unrecognised priorities both fall back to the default.
    pub fn hours_for(&self, priority: Option<&str>) -> f64 {
        priority
            .and_then(Priority::parse)
            .map(|p| self.hours_for_priority(p))
            .unwrap_or(self.default_hours)
    }

    pub fn default_hours(&self) -> f64 {
        self.default_hours
    }

    pub fn warning_fraction(&self) -> f64 {
        self.warning_fraction
    }

    pub fn critical_fraction(&self) -> f64 {
        self.critical_fraction
    }

    /// The options this policy was built from
    pub fn to_config(&self) -> SlaPolicyConfig {
        SlaPolicyConfig {
            critical: self.critical_hours,
            high: self.high_hours,
            medium: self.medium_hours,
            low: self.low_hours,
            default: self.default_hours,
            warning_fraction: self.warning_fraction,
            critical_fraction: self.critical_fraction,
        }
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        let config = SlaPolicyConfig::default();
        Self {
            critical_hours: config.critical,
            high_hours: config.high,
            medium_hours: config.medium,
            low_hours: config.low,
            default_hours: config.default,
            warning_fraction: config.warning_fraction,
            critical_fraction: config.critical_fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: SlaError) -> String {
        match err {
            SlaError::InvalidPolicy { field, .. } => field,
            other => panic!("Expected InvalidPolicy, got: {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let policy = SlaPolicy::new(SlaPolicyConfig::default()).unwrap();
        assert_eq!(policy, SlaPolicy::default());
        assert_eq!(policy.hours_for(Some("high")), 8.0);
        assert_eq!(policy.warning_fraction(), 0.80);
        assert_eq!(policy.critical_fraction(), 0.95);
    }

    #[test]
    fn test_priority_lookup_is_case_insensitive() {
        let policy = SlaPolicy::default();
        assert_eq!(policy.hours_for(Some("CRITICAL")), 4.0);
        assert_eq!(policy.hours_for(Some(" High ")), 8.0);
        assert_eq!(policy.hours_for(Some("Low")), 72.0);
    }

    #[test]
    fn test_unknown_priority_uses_default_hours() {
        let policy = SlaPolicy::new(SlaPolicyConfig {
            default: 24.0,
            medium: 12.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(policy.hours_for(Some("urgent")), 24.0);
        assert_eq!(policy.hours_for(Some("")), 24.0);
        assert_eq!(policy.hours_for(None), 24.0);
        assert_eq!(policy.hours_for(Some("urgent")), policy.hours_for(None));
    }

    #[test]
    fn test_non_positive_hours_rejected() {
        let err = SlaPolicy::new(SlaPolicyConfig {
            low: 0.0,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field_of(err), "low");

        let err = SlaPolicy::new(SlaPolicyConfig {
            default: -1.0,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field_of(err), "default");

        let err = SlaPolicy::new(SlaPolicyConfig {
            critical: f64::NAN,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field_of(err), "critical");
    }

    #[test]
    fn test_fraction_ordering_enforced() {
        let err = SlaPolicy::new(SlaPolicyConfig {
            warning_fraction: 0.95,
            critical_fraction: 0.95,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field_of(err), "warning_fraction");

        let err = SlaPolicy::new(SlaPolicyConfig {
            critical_fraction: 1.0,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field_of(err), "critical_fraction");

        let err = SlaPolicy::new(SlaPolicyConfig {
            warning_fraction: 0.0,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field_of(err), "warning_fraction");
    }

    #[test]
    fn test_config_deserializes_with_partial_fields() {
        let config: SlaPolicyConfig =
            serde_json::from_str(r#"{"high": 6, "warning_fraction": 0.7}"#).unwrap();
        assert_eq!(config.high, 6.0);
        assert_eq!(config.warning_fraction, 0.7);
        assert_eq!(config.critical_fraction, 0.95);

        let policy = SlaPolicy::new(config.clone()).unwrap();
        assert_eq!(policy.to_config(), config);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("medium"), Some(Priority::Medium));
        assert_eq!(Priority::parse("urgent"), None);
        for p in Priority::ALL {
            assert_eq!(Priority::parse(&p.to_string()), Some(p));
        }
    }
}

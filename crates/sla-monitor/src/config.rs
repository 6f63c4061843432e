//! Monitor configuration.
//!
//! Layers, later wins: built-in defaults, an optional TOML file, `SLA_*`
//! environment variables, then CLI flags (applied by `main`).

use serde::{Deserialize, Serialize};
use sla_engine::{SlaError, SlaEvaluator, SlaPolicy, SlaPolicyConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("invalid configuration: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Policy(#[from] SlaError),
}

/// On-disk ticket file layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketFormat {
    Json,
    Csv,
}

impl TicketFormat {
    /// Guess from the file extension; anything but `.csv` is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

/// Where tickets come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub tickets_path: PathBuf,
    /// Forced format; detected from the extension when absent
    pub format: Option<TicketFormat>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            tickets_path: PathBuf::from("tickets.json"),
            format: None,
        }
    }
}

impl SourceConfig {
    pub fn resolved_format(&self) -> TicketFormat {
        self.format
            .unwrap_or_else(|| TicketFormat::from_path(&self.tickets_path))
    }
}

/// Where notifications go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Chat webhook; notifications go to the log when unset
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_secs: 10,
        }
    }
}

/// Trigger cadence and evaluation leniency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
    /// Reject tickets created further than this in the future
    pub max_future_skew_minutes: Option<i64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_future_skew_minutes: None,
        }
    }
}

/// Top-level monitor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub policy: SlaPolicyConfig,
    pub source: SourceConfig,
    pub notify: NotifyConfig,
    pub schedule: ScheduleConfig,
}

impl MonitorConfig {
    /// Defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `SLA_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Apply `SLA_*` overrides from an arbitrary lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SLA_TICKETS_PATH") {
            self.source.tickets_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("SLA_WEBHOOK_URL") {
            self.notify.webhook_url = if url.trim().is_empty() {
                None
            } else {
                Some(url)
            };
        }
        if let Some(v) = parse_env(&lookup, "SLA_WEBHOOK_TIMEOUT_SECS")? {
            self.notify.webhook_timeout_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "SLA_INTERVAL_SECS")? {
            self.schedule.interval_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "SLA_MAX_FUTURE_SKEW_MINUTES")? {
            self.schedule.max_future_skew_minutes = Some(v);
        }

        let policy = &mut self.policy;
        for (var, slot) in [
            ("SLA_HOURS_CRITICAL", &mut policy.critical),
            ("SLA_HOURS_HIGH", &mut policy.high),
            ("SLA_HOURS_MEDIUM", &mut policy.medium),
            ("SLA_HOURS_LOW", &mut policy.low),
            ("SLA_HOURS_DEFAULT", &mut policy.default),
            ("SLA_WARNING_FRACTION", &mut policy.warning_fraction),
            ("SLA_CRITICAL_FRACTION", &mut policy.critical_fraction),
        ] {
            if let Some(v) = parse_env(&lookup, var)? {
                *slot = v;
            }
        }

        Ok(())
    }

    /// Reject values no cycle could run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "schedule.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.notify.webhook_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "notify.webhook_timeout_secs must be at least 1".to_string(),
            ));
        }
        if matches!(self.schedule.max_future_skew_minutes, Some(m) if m < 0) {
            return Err(ConfigError::InvalidValue(
                "schedule.max_future_skew_minutes must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the validated policy; fails on any policy invariant violation
    pub fn build_policy(&self) -> Result<SlaPolicy, ConfigError> {
        Ok(SlaPolicy::new(self.policy.clone())?)
    }

    pub fn evaluator(&self) -> SlaEvaluator {
        match self.schedule.max_future_skew_minutes {
            Some(minutes) => SlaEvaluator::with_max_future_skew(chrono::Duration::minutes(minutes)),
            None => SlaEvaluator::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.notify.webhook_timeout_secs)
    }
}

fn parse_env<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value: raw,
            }),
    }
}

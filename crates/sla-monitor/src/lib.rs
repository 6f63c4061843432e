//! SLA Monitor
//!
//! The collaborators around `sla_engine`:
//! - `config`: layered configuration (defaults, TOML file, `SLA_*` env vars)
//! - `ingest`: JSON/CSV ticket exports normalized into engine tickets
//! - `notify`: message formatting plus log and webhook dispatchers
//! - `scheduler`: periodic trigger that feeds the single-flight runner
//!
//! # Usage
//!
//! ```bash
//! # One evaluation pass, notifications to the log
//! sla-monitor --tickets tickets.csv --once
//!
//! # Every 5 minutes, notifications to a chat webhook
//! SLA_WEBHOOK_URL=https://chat.example.com/hooks/sla sla-monitor --config monitor.toml
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod ingest;
pub mod notify;
pub mod scheduler;

pub use config::{ConfigError, MonitorConfig, TicketFormat};
pub use ingest::{is_active_status, parse_tickets, FileTicketSource};
pub use notify::{build_dispatcher, format_batch, LogDispatcher, WebhookDispatcher};
pub use scheduler::{run_once, run_periodic, ScheduleStats};

//! Ticket ingestion from JSON or CSV exports.
//!
//! Field names vary between helpdesk exports, so keys are matched loosely
//! (case and punctuation ignored) against a small alias table. Only active
//! tickets with an id and a creation time reach the engine.

use crate::config::TicketFormat;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use sla_engine::{Ticket, TicketSource};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ID_KEYS: &[&str] = &["id", "ticketid", "ticket", "key"];
const CREATED_KEYS: &[&str] = &["createdat", "created", "openedat", "createddate", "opened"];
const PRIORITY_KEYS: &[&str] = &["priority", "severity"];
const TITLE_KEYS: &[&str] = &["title", "subject", "summary"];
const CUSTOMER_KEYS: &[&str] = &["customer", "client", "requester"];
const ASSIGNEE_KEYS: &[&str] = &["assignee", "assignedto", "owner"];
const CATEGORY_KEYS: &[&str] = &["category", "type"];
const STATUS_KEYS: &[&str] = &["status", "state"];

/// Epoch values at or above this are taken as milliseconds
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Whether a ticket status still needs SLA tracking.
///
/// A missing status counts as active, and so does any value not listed as
/// closed, so an unfamiliar workflow state never hides a ticket.
pub fn is_active_status(status: Option<&str>) -> bool {
    let Some(status) = status else {
        return true;
    };
    let normalized: String = status
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();

    !matches!(
        normalized.as_str(),
        "resolved" | "closed" | "done" | "cancelled" | "canceled" | "complete" | "completed"
    )
}

/// Reads tickets from a file on every fetch
#[derive(Debug, Clone)]
pub struct FileTicketSource {
    path: PathBuf,
    format: TicketFormat,
}

impl FileTicketSource {
    pub fn new(path: impl Into<PathBuf>, format: TicketFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Source with the format guessed from the extension
    pub fn detect(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = TicketFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> TicketFormat {
        self.format
    }
}

#[async_trait]
impl TicketSource for FileTicketSource {
    async fn fetch_tickets(&self) -> Result<Vec<Ticket>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read tickets from {}", self.path.display()))?;
        let tickets = parse_tickets(&raw, self.format)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        debug!(path = %self.path.display(), count = tickets.len(), "Tickets loaded");
        Ok(tickets)
    }
}

/// Parse, normalize and filter a ticket export
pub fn parse_tickets(raw: &str, format: TicketFormat) -> Result<Vec<Ticket>> {
    let records = match format {
        TicketFormat::Json => json_records(raw)?,
        TicketFormat::Csv => csv_records(raw)?,
    };

    let total = records.len();
    let mut tickets = Vec::with_capacity(total);
    let mut inactive = 0usize;

    for (index, record) in records.iter().enumerate() {
        let Some(ticket) = normalize_record(record) else {
            warn!(record = index, "Dropping ticket record without id or creation time");
            continue;
        };
        if !is_active_status(ticket.status.as_deref()) {
            inactive += 1;
            continue;
        }
        tickets.push(ticket);
    }

    debug!(total, active = tickets.len(), inactive, "Ticket export normalized");
    Ok(tickets)
}

type Record = HashMap<String, String>;

/// Lowercase and strip everything but letters and digits
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn json_records(raw: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(raw).context("Ticket export is not valid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("tickets") {
            Some(Value::Array(items)) => items,
            _ => anyhow::bail!("Expected a JSON array or an object with a \"tickets\" array"),
        },
        _ => anyhow::bail!("Expected a JSON array or an object with a \"tickets\" array"),
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(fields) = item else {
            warn!(record = index, "Dropping ticket record that is not a JSON object");
            continue;
        };
        records.push(
            fields
                .into_iter()
                .filter_map(|(k, v)| json_scalar(&k, v).map(|v| (normalize_key(&k), v)))
                .collect(),
        );
    }
    Ok(records)
}

fn json_scalar(key: &str, value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) if CREATED_KEYS.contains(&normalize_key(key).as_str()) => {
            let epoch = n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64));
            let converted = epoch.and_then(epoch_to_rfc3339);
            if converted.is_none() {
                warn!(field = key, value = %n, "Creation time is not a usable epoch");
            }
            converted
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn epoch_to_rfc3339(epoch: i64) -> Option<String> {
    let dt = if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)?
    } else {
        DateTime::from_timestamp(epoch, 0)?
    };
    Some(dt.to_rfc3339())
}

fn csv_records(raw: &str) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(raw.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .context("Ticket CSV has no header row")?
        .iter()
        .map(normalize_key)
        .collect();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Malformed CSV row {}", line + 2))?;
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.clone(), v.to_string()))
                .collect(),
        );
    }
    Ok(records)
}

fn field(record: &Record, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| record.get(*alias))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn normalize_record(record: &Record) -> Option<Ticket> {
    let id = field(record, ID_KEYS)?;
    let created_at = field(record, CREATED_KEYS)?;

    Some(Ticket {
        id,
        priority: field(record, PRIORITY_KEYS).map(|p| p.to_ascii_lowercase()),
        created_at,
        title: field(record, TITLE_KEYS),
        customer: field(record, CUSTOMER_KEYS),
        assignee: field(record, ASSIGNEE_KEYS),
        category: field(record, CATEGORY_KEYS),
        status: field(record, STATUS_KEYS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_status_predicate() {
        assert!(is_active_status(None));
        assert!(is_active_status(Some("Open")));
        assert!(is_active_status(Some("in-progress")));
        assert!(is_active_status(Some("Waiting on customer")));
        assert!(!is_active_status(Some("Resolved")));
        assert!(!is_active_status(Some(" CLOSED ")));
        assert!(!is_active_status(Some("cancelled")));
    }

    #[test]
    fn test_json_aliases_and_filtering() {
        let raw = r#"[
            {"ticketId": "T-1", "createdAt": "2024-06-01T08:00:00Z", "Priority": "HIGH", "subject": "VPN down", "status": "open"},
            {"id": "T-2", "created_at": "2024-06-01 09:00:00", "status": "closed"},
            {"id": "T-3", "title": "no timestamp"},
            {"id": "", "created": "2024-06-01T10:00:00Z"},
            {"id": 44, "opened_at": 1717228800, "assigned_to": "sam", "priority": null}
        ]"#;
        let tickets = parse_tickets(raw, TicketFormat::Json).unwrap();
        assert_eq!(tickets.len(), 2);

        assert_eq!(tickets[0].id, "T-1");
        assert_eq!(tickets[0].priority.as_deref(), Some("high"));
        assert_eq!(tickets[0].title.as_deref(), Some("VPN down"));

        assert_eq!(tickets[1].id, "44");
        assert_eq!(tickets[1].created_at, "2024-06-01T08:00:00+00:00");
        assert_eq!(tickets[1].assignee.as_deref(), Some("sam"));
        assert!(tickets[1].priority.is_none());
    }

    #[test]
    fn test_json_wrapped_in_object() {
        let raw = r#"{"tickets": [{"id": "A", "created_at": "2024-06-01T08:00:00Z"}]}"#;
        let tickets = parse_tickets(raw, TicketFormat::Json).unwrap();
        assert_eq!(tickets.len(), 1);

        assert!(parse_tickets(r#"{"items": []}"#, TicketFormat::Json).is_err());
        assert!(parse_tickets("not json", TicketFormat::Json).is_err());
    }

    #[test]
    fn test_csv_with_loose_headers() {
        let raw = "Ticket ID,Created At,Priority,Customer,Status\n\
                   T-9, 2024-06-01 07:30:00 ,Critical,Acme,In Progress\n\
                   T-10,2024-06-01 07:45:00,low,Globex,Done\n\
                   T-11,,medium,Initech,Open\n";
        let tickets = parse_tickets(raw, TicketFormat::Csv).unwrap();
        assert_eq!(tickets.len(), 1);
        let t = &tickets[0];
        assert_eq!(t.id, "T-9");
        assert_eq!(t.created_at, "2024-06-01 07:30:00");
        assert_eq!(t.priority.as_deref(), Some("critical"));
        assert_eq!(t.customer.as_deref(), Some("Acme"));
        assert_eq!(t.status.as_deref(), Some("In Progress"));
    }

    #[test]
    fn test_fractional_epoch_is_truncated() {
        let raw = r#"[{"id": "F-1", "created_at": 1717228800.5}]"#;
        let tickets = parse_tickets(raw, TicketFormat::Json).unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].created_at, "2024-06-01T08:00:00+00:00");
    }

    #[test]
    fn test_non_object_items_are_dropped() {
        let raw = r#"["T-1", 7, null, {"id": "T-2", "created_at": "2024-06-01T08:00:00Z"}]"#;
        let tickets = parse_tickets(raw, TicketFormat::Json).unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].id, "T-2");
    }

    #[test]
    fn test_epoch_millis_detected() {
        assert_eq!(
            epoch_to_rfc3339(1_717_228_800_000).as_deref(),
            Some("2024-06-01T08:00:00+00:00")
        );
    }

    #[tokio::test]
    async fn test_file_source_reads_on_each_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        std::fs::write(&path, r#"[{"id": "A", "created_at": "2024-06-01T08:00:00Z"}]"#).unwrap();

        let source = FileTicketSource::detect(&path);
        assert_eq!(source.path(), path.as_path());
        assert_eq!(source.format(), TicketFormat::Json);
        assert_eq!(source.fetch_tickets().await.unwrap().len(), 1);

        std::fs::write(
            &path,
            r#"[{"id": "A", "created_at": "2024-06-01T08:00:00Z"},
                {"id": "B", "created_at": "2024-06-01T09:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(source.fetch_tickets().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let source = FileTicketSource::detect("/nonexistent/sla/tickets.csv");
        assert_eq!(source.format(), TicketFormat::Csv);
        let err = source.fetch_tickets().await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read tickets"));
    }
}

//! Notification formatting and delivery.
//!
//! One message per tier per cycle. Delivery is best effort: a failed webhook
//! call is returned to the runner, which logs it and moves on.

use crate::config::MonitorConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sla_engine::{EscalationEntry, EscalationTier, NotificationDispatcher, StatusSummary};
use std::time::Duration;
use tracing::{info, warn};

/// Heading used for a tier's message
fn tier_heading(tier: EscalationTier) -> &'static str {
    match tier {
        EscalationTier::Violation => "SLA VIOLATED",
        EscalationTier::Critical => "SLA CRITICAL",
        EscalationTier::Warning => "SLA WARNING",
        EscalationTier::None => "SLA OK",
    }
}

/// Render a tier's batch as a plain-text message, preserving batch order
pub fn format_batch(tier: EscalationTier, entries: &[EscalationEntry]) -> String {
    let noun = if entries.len() == 1 { "ticket" } else { "tickets" };
    let mut out = format!("[{}] {} {}\n", tier_heading(tier), entries.len(), noun);

    for entry in entries {
        let ticket = &entry.ticket;
        let summary = entry.status.summary();

        let mut head = format!("- {}", ticket.id);
        if let Some(title) = &ticket.title {
            head.push_str(&format!(" \"{}\"", title));
        }

        let mut parts = vec![
            head,
            format!("priority: {}", ticket.priority.as_deref().unwrap_or("unset")),
        ];
        if let Some(customer) = &ticket.customer {
            parts.push(format!("customer: {}", customer));
        }
        parts.push(format!(
            "assignee: {}",
            ticket.assignee.as_deref().unwrap_or("unassigned")
        ));
        parts.push(timing(tier, &summary));

        out.push_str(&parts.join(" | "));
        out.push('\n');
    }

    out
}

fn timing(tier: EscalationTier, summary: &StatusSummary) -> String {
    if tier == EscalationTier::Violation {
        format!(
            "{:.2}h overdue (SLA {}h)",
            summary.hours_overdue, summary.sla_hours
        )
    } else {
        format!(
            "{:.2}h remaining, {:.2}% used (SLA {}h)",
            summary.hours_remaining, summary.percent_used, summary.sla_hours
        )
    }
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, tier: EscalationTier, batch: &[EscalationEntry]) -> Result<()> {
        let message = format_batch(tier, batch);
        match tier {
            EscalationTier::Violation | EscalationTier::Critical => {
                warn!(%tier, count = batch.len(), "{}", message.trim_end())
            }
            _ => info!(%tier, count = batch.len(), "{}", message.trim_end()),
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookTicket<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee: Option<&'a str>,
    status: StatusSummary,
}

/// JSON body posted to the webhook
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: String,
    tier: EscalationTier,
    tickets: Vec<WebhookTicket<'a>>,
}

impl<'a> WebhookPayload<'a> {
    fn new(tier: EscalationTier, entries: &'a [EscalationEntry]) -> Self {
        Self {
            text: format_batch(tier, entries),
            tier,
            tickets: entries
                .iter()
                .map(|e| WebhookTicket {
                    id: &e.ticket.id,
                    title: e.ticket.title.as_deref(),
                    priority: e.ticket.priority.as_deref(),
                    customer: e.ticket.customer.as_deref(),
                    assignee: e.ticket.assignee.as_deref(),
                    status: e.status.summary(),
                })
                .collect(),
        }
    }
}

/// Posts each batch to a chat webhook
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn dispatch(&self, tier: EscalationTier, batch: &[EscalationEntry]) -> Result<()> {
        let payload = WebhookPayload::new(tier, batch);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Webhook request for {} batch failed", tier))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webhook returned {}: {}", status, body);
        }

        info!(%tier, count = batch.len(), "Webhook notified");
        Ok(())
    }
}

/// Webhook when configured, log otherwise
pub fn build_dispatcher(config: &MonitorConfig) -> Result<Box<dyn NotificationDispatcher>> {
    match &config.notify.webhook_url {
        Some(url) => Ok(Box::new(WebhookDispatcher::new(
            url.clone(),
            config.webhook_timeout(),
        )?)),
        None => Ok(Box::new(LogDispatcher)),
    }
}

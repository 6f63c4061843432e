//! End-to-end monitor tests: ticket export on disk through to dispatched messages.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sla_engine::{
    CycleOutcome, CycleRunner, EscalationEntry, EscalationTier, ManualClock,
    NotificationDispatcher, SlaError,
};
use sla_monitor::{format_batch, run_once, FileTicketSource, MonitorConfig, TicketFormat};
use std::sync::{Arc, Mutex};

// ── Helpers ─────────────────────────────────────────────────────────

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 18, 0, 0).unwrap()
}

#[derive(Default)]
struct CapturingDispatcher {
    messages: Mutex<Vec<(EscalationTier, String)>>,
}

#[async_trait]
impl NotificationDispatcher for CapturingDispatcher {
    async fn dispatch(&self, tier: EscalationTier, batch: &[EscalationEntry]) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((tier, format_batch(tier, batch)));
        Ok(())
    }
}

fn runner_from(config: &MonitorConfig) -> CycleRunner {
    CycleRunner::new(
        Arc::new(config.build_policy().unwrap()),
        Arc::new(ManualClock::new(now())),
    )
    .with_evaluator(config.evaluator())
}

const CSV_EXPORT: &str = "\
Ticket ID,Subject,Priority,Created At,Status,Assigned To
INC-1,Payments down,critical,2024-06-03 13:00:00,Open,ana
INC-2,Slow search,high,2024-06-03 10:15:00,In Progress,ben
INC-3,Typo on site,low,2024-06-01 09:00:00,Resolved,
INC-4,Login loop,high,2024-06-03 10:30:00,Open,
INC-5,Broken export,urgent,2024-06-02 20:00:00,Pending,cy
INC-6,Bad date,medium,03/06/2024,Open,
INC-7,New request,medium,2024-06-03 17:00:00,New,
";

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn csv_export_produces_one_message_per_tier() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tickets.csv");
    std::fs::write(&path, CSV_EXPORT).unwrap();

    let config = MonitorConfig::default();
    let runner = runner_from(&config);
    let source = FileTicketSource::detect(&path);
    assert_eq!(source.format(), TicketFormat::Csv);
    let dispatcher = CapturingDispatcher::default();

    let outcome = run_once(&runner, &source, &dispatcher).await;
    let report = outcome.report().expect("cycle should complete");

    // INC-3 is resolved and never reaches the engine.
    assert_eq!(report.tickets_fetched, 6);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].ticket_id, "INC-6");

    let messages = dispatcher.messages.lock().unwrap().clone();
    let tiers: Vec<_> = messages.iter().map(|(t, _)| *t).collect();
    assert_eq!(
        tiers,
        vec![
            EscalationTier::Violation,
            EscalationTier::Critical,
            EscalationTier::Warning
        ]
    );

    // critical 4h: created 5h ago → violated by 1h
    let violation = &messages[0].1;
    assert!(violation.contains("INC-1"), "{violation}");
    assert!(violation.contains("1.00h overdue"), "{violation}");

    // high 8h: 7.75h elapsed → 96.9% is critical
    let critical = &messages[1].1;
    assert!(critical.starts_with("[SLA CRITICAL] 1 ticket"), "{critical}");
    assert!(critical.contains("INC-2"), "{critical}");

    // high 8h at 7.5h and urgent (default 24h) at 22h are both warnings
    let warning = &messages[2].1;
    assert!(warning.starts_with("[SLA WARNING] 2 tickets"), "{warning}");
    let pos_4 = warning.find("INC-4").unwrap();
    let pos_5 = warning.find("INC-5").unwrap();
    assert!(pos_4 < pos_5, "warnings keep export order");

    assert_eq!(report.within_sla, 1);
}

#[tokio::test]
async fn policy_from_toml_changes_classification() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("monitor.toml");
    let tickets_path = dir.path().join("tickets.json");
    std::fs::write(
        &tickets_path,
        r#"[{"id": "J-1", "priority": "high", "created_at": "2024-06-03T12:30:00Z"}]"#,
    )
    .unwrap();
    std::fs::write(
        &config_path,
        format!(
            "[policy]\nhigh = 5\n\n[source]\ntickets_path = {:?}\n",
            tickets_path.display().to_string()
        ),
    )
    .unwrap();

    let config = MonitorConfig::from_file(&config_path).unwrap();
    let runner = runner_from(&config);
    let source = FileTicketSource::new(
        config.source.tickets_path.clone(),
        config.source.resolved_format(),
    );
    let dispatcher = CapturingDispatcher::default();

    let outcome = run_once(&runner, &source, &dispatcher).await;
    let report = outcome.report().expect("cycle should complete");
    // 5.5h elapsed on a 5h allotment
    assert_eq!(report.violations, 1);
}

#[tokio::test]
async fn unreadable_source_fails_the_cycle_only() {
    let config = MonitorConfig::default();
    let runner = runner_from(&config);
    let source = FileTicketSource::new("/nonexistent/tickets.json", TicketFormat::Json);
    let dispatcher = CapturingDispatcher::default();

    let outcome = run_once(&runner, &source, &dispatcher).await;
    assert!(matches!(
        outcome,
        CycleOutcome::Failed(SlaError::SourceFailure(_))
    ));
    assert!(dispatcher.messages.lock().unwrap().is_empty());

    // The next trigger runs normally.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tickets.json");
    std::fs::write(&path, "[]").unwrap();
    let source = FileTicketSource::detect(&path);
    let outcome = run_once(&runner, &source, &dispatcher).await;
    assert!(matches!(outcome, CycleOutcome::Completed(_)));
}

use anyhow::{Context, Result};
use clap::Parser;
use sla_engine::{CycleOutcome, CycleRunner, NotificationDispatcher, SystemClock, TicketSource};
use sla_monitor::config::MonitorConfig;
use sla_monitor::ingest::FileTicketSource;
use sla_monitor::notify::build_dispatcher;
use sla_monitor::scheduler::{run_once, run_periodic};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticket export to watch (overrides SLA_TICKETS_PATH)
    #[arg(long)]
    tickets: Option<PathBuf>,

    /// Seconds between evaluation cycles (overrides SLA_INTERVAL_SECS)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Chat webhook for notifications (overrides SLA_WEBHOOK_URL)
    #[arg(long)]
    webhook_url: Option<String>,

    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(args: &Args) -> Result<MonitorConfig> {
    let mut config = MonitorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(path) = &args.tickets {
        config.source.tickets_path = path.clone();
    }
    if let Some(secs) = args.interval_secs {
        config.schedule.interval_secs = secs;
    }
    if let Some(url) = &args.webhook_url {
        config.notify.webhook_url = Some(url.clone());
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = load_config(&args)?;
    let policy = config
        .build_policy()
        .context("Refusing to start with an invalid SLA policy")?;

    let runner = Arc::new(
        CycleRunner::new(Arc::new(policy), Arc::new(SystemClock)).with_evaluator(config.evaluator()),
    );
    let file_source = FileTicketSource::new(
        config.source.tickets_path.clone(),
        config.source.resolved_format(),
    );
    info!(
        tickets = %file_source.path().display(),
        format = ?file_source.format(),
        interval_secs = config.schedule.interval_secs,
        webhook = config.notify.webhook_url.is_some(),
        "SLA monitor starting"
    );
    let source: Arc<dyn TicketSource> = Arc::new(file_source);
    let dispatcher: Arc<dyn NotificationDispatcher> = Arc::from(build_dispatcher(&config)?);

    if args.once {
        return match run_once(&runner, source.as_ref(), dispatcher.as_ref()).await {
            CycleOutcome::Failed(e) => Err(e).context("Evaluation cycle failed"),
            _ => Ok(()),
        };
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl-C, running until killed: {}", e);
                // Dropping the sender would stop the scheduler.
                std::future::pending::<()>().await;
            }
        }
    });

    run_periodic(runner, source, dispatcher, config.interval(), shutdown_rx).await;
    Ok(())
}

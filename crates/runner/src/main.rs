mod wiring;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_core::heartbeat::{spawn_heartbeat, write_heartbeat, HEARTBEAT_ENV, HEARTBEAT_INTERVAL};
use tally_core::scheduler::WORKER_ARG;
use tally_core::{
    load_accounts, load_config, validate_config, InProcessLauncher, JsonReportStore,
    ProcessLauncher, SanitizedConfig, Scheduler, SummaryAggregator, WorkerLauncher,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    // stdout belongs to the IPC protocol in worker mode; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let worker_mode = std::env::args().nth(1).as_deref() == Some(WORKER_ARG);
    let result = if worker_mode {
        worker::run().await
    } else {
        run().await
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("tally {} starting", VERSION);

    let config_path = wiring::config_path();
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    info!(
        "Configuration loaded: {} cluster(s), {} mode, webhook {}",
        sanitized.scheduler.clusters,
        if sanitized.runner.parallel { "parallel" } else { "sequential" },
        if sanitized.webhook_configured { "configured" } else { "not configured" }
    );
    if !sanitized.phase_command_configured {
        warn!("No phase command configured, every phase will fail");
    }

    let config_hash = wiring::config_hash(&config);

    let heartbeat = std::env::var_os(HEARTBEAT_ENV).map(|path| {
        let path = PathBuf::from(path);
        info!("Writing heartbeat to {:?}", path);
        (spawn_heartbeat(path.clone(), HEARTBEAT_INTERVAL), path)
    });

    let accounts = load_accounts(&config.accounts_path).with_context(|| {
        format!("Failed to load accounts from {:?}", config.accounts_path)
    })?;
    info!("Loaded {} account(s)", accounts.len());

    let verbose = wiring::verbose_from_env();
    let config = Arc::new(config);
    let collaborators = wiring::collaborators(&config)?;

    let launcher: Arc<dyn WorkerLauncher> = if config.scheduler.clusters <= 1 {
        Arc::new(
            InProcessLauncher::new(Arc::clone(&config), collaborators.clone())
                .with_verbose(verbose),
        )
    } else {
        Arc::new(
            ProcessLauncher::current_exe(&config_path)
                .context("Failed to locate the tally executable")?
                .with_verbose(verbose),
        )
    };
    info!("Using {} workers", launcher.name());

    let aggregator = SummaryAggregator::new(
        config.report.clone(),
        config_hash,
        Arc::clone(&collaborators.notifier),
        Arc::new(JsonReportStore::new(&config.report.dir)),
    );
    info!("Run id {}", aggregator.run_id());

    let scheduler = Scheduler::new(Arc::clone(&config), launcher, aggregator);
    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping workers");
            shutdown.trigger();
        }
    });

    let report = scheduler.run(accounts).await;
    info!(
        "Run {} complete: {} account(s), {} collected, {} need manual review",
        report.run_id,
        report.totals.accounts,
        report.totals.total_collected,
        report.manual_review.len()
    );

    if let Some((handle, path)) = heartbeat {
        handle.abort();
        if let Err(e) = write_heartbeat(&path).await {
            warn!("Failed to write final heartbeat: {}", e);
        }
    }
    Ok(())
}

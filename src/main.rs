// ABOUTME: Entry point for the daybook binary.
// ABOUTME: Parses CLI arguments, initializes tracing, connects the backend link, and serves HTTP until signalled.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use daybook_server::{AppState, DaybookConfig, LogFormat, create_router};
use daybook_store::BackendLink;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "daybook", version, about = "Journal service over a key-value backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// Override DAYBOOK_BIND.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Rebuild journal indexes from stored entries and print the reports.
    Reconcile {
        /// Only this owner; all owners when omitted.
        #[arg(long)]
        owner: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let mut config = DaybookConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            serve(config).await
        }
        Command::Reconcile { owner } => reconcile(config, owner).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("daybook=info,daybook_server=info,daybook_store=info,tower_http=info")
    });
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn serve(config: DaybookConfig) -> anyhow::Result<()> {
    tracing::info!(environment = %config.environment, "daybook starting up");

    let link = BackendLink::new(config.connector()?, config.link);
    match link.connect().await {
        Ok(()) => tracing::info!(backend = %link.describe(), "backend connection established"),
        Err(e) => tracing::error!(
            backend = %link.describe(),
            error = %e,
            "failed to connect to backend - starting in degraded mode"
        ),
    }

    let state = Arc::new(AppState::new(link.clone(), config.is_development()));
    let reconciler = config
        .reconcile_interval
        .map(|every| tokio::spawn(reconcile_every(Arc::clone(&state), every)));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(bind = %config.bind, "daybook started successfully");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = reconciler {
        task.abort();
    }
    link.close().await;
    tracing::info!("graceful shutdown completed");
    Ok(())
}

async fn reconcile(config: DaybookConfig, owner: Option<String>) -> anyhow::Result<()> {
    let link = BackendLink::new(config.connector()?, config.link);
    link.connect()
        .await
        .with_context(|| format!("cannot reach backend {}", link.describe()))?;
    let state = AppState::new(link.clone(), config.is_development());

    let reports = match owner {
        Some(owner) => vec![state.store.rebuild_index(&owner).await?],
        None => state.store.reconcile_all().await?,
    };
    println!("{}", serde_json::to_string_pretty(&reports)?);

    link.close().await;
    Ok(())
}

/// Periodically rebuild every owner's index. Passes are skipped while the
/// link is down.
async fn reconcile_every(state: Arc<AppState>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if !state.link().is_ready() {
            tracing::debug!(link = %state.link().state(), "skipping scheduled reconciliation");
            continue;
        }
        if let Err(e) = state.store.reconcile_all().await {
            tracing::error!(error = %e, "scheduled reconciliation failed");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "received shutdown signal"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "received shutdown signal"),
    }
}

//! # Argus Server
//!
//! Real-time alert distribution and camera lifecycle coordination.
//!
//! Clients hold an authenticated WebSocket open on `/ws` and receive every
//! detection alert and camera status change. Camera start/stop requests are
//! forwarded to the detection worker, with the streaming flag rolled back
//! when the worker does not confirm a start.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use argus_core::{
    HttpDetectionWorker,
    database::{PostgresAlertRepository, PostgresCameraRepository, PostgresDatabase},
};
use argus_server::{
    AppState, Stores,
    infra::config::{Config, ConfigLoad, ConfigLoader},
    routes::create_app,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "argus-server")]
#[command(about = "Real-time alert distribution and camera lifecycle server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to an argus.toml configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to an env file loaded before reading the environment (default: .env)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli.serve)?;

    match cli.command {
        Some(Command::Db(DbCommand::Migrate)) => run_db_migrate(&config).await,
        None => run_server(config).await,
    }
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    info!(
        worker.base_url = %config.worker.base_url,
        worker.timeout = %humantime::format_duration(config.worker.timeout),
        realtime.heartbeat_interval = %humantime::format_duration(config.realtime.heartbeat_interval),
        realtime.outbound_buffer = config.realtime.outbound_buffer,
        "runtime configuration in effect"
    );

    Ok(Arc::new(config))
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    let database_url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL or database.url must be set to run migrations")?;
    let pg = PostgresDatabase::connect(database_url)
        .await
        .context("failed to connect to PostgreSQL for migration")?;
    pg.initialize_schema()
        .await
        .context("database migration failed")?;
    info!("Database migrations applied successfully");
    Ok(())
}

async fn wire_stores(config: &Config) -> anyhow::Result<Stores> {
    let Some(database_url) = config.database.url.as_deref() else {
        warn!("running with in-memory stores; state is lost on restart");
        return Ok(Stores::in_memory());
    };

    let pg = PostgresDatabase::connect(database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    info!("Successfully connected to PostgreSQL");
    pg.initialize_schema()
        .await
        .context("database migration failed")?;

    let pool = pg.pool().clone();
    Ok(Stores::new(
        Arc::new(PostgresCameraRepository::new(pool.clone())),
        Arc::new(PostgresAlertRepository::new(pool)),
    ))
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    let stores = wire_stores(&config).await?;
    let worker = HttpDetectionWorker::new(&config.worker.base_url, config.worker.timeout)
        .context("failed to build detection worker client")?;
    let state = AppState::new(Arc::clone(&config), stores, Arc::new(worker));

    let shutdown = CancellationToken::new();
    let heartbeat = state.heartbeat_monitor().spawn(shutdown.clone());

    let app = create_app(state.clone());
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Argus server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            let registry = state.registry.clone();
            async move {
                shutdown_signal().await;
                info!("shutdown requested; closing client connections");
                shutdown.cancel();
                registry.shutdown();
            }
        })
        .await
        .context("server error")?;

    heartbeat.await.context("heartbeat task failed")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

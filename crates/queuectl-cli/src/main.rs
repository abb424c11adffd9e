//! # queuectl
//!
//! Command-line surface for the queuectl job queue: submit jobs, inspect
//! the queue, requeue dead letters, run the worker pool, and serve the
//! read-only dashboard.

use anyhow::Context;
use clap::{Parser, Subcommand};
use queuectl_config::{AppConfig, ConfigLoader, DEFAULT_CONFIG_PATH};
use queuectl_jobs::{
    register_metrics, FileStore, JobId, JobQueue, JobState, RetryPolicy, WorkerPool,
    WorkerPoolConfig,
};
use queuectl_rest::{create_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "queuectl", version, about = "Durable shell-command job queue")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a shell command as a new job.
    Submit {
        /// The command to execute.
        command: String,

        /// Per-job retry ceiling (defaults to the configured value).
        #[arg(long)]
        max_retries: Option<u32>,

        /// Explicit job id (random if omitted).
        #[arg(long)]
        id: Option<String>,
    },

    /// List jobs, optionally filtered by state.
    List {
        /// pending | processing | completed | dead
        #[arg(long)]
        state: Option<String>,
    },

    /// Show queue status counts.
    Status,

    /// Requeue a dead-lettered job by id.
    Requeue {
        /// Id of the dead-lettered job.
        id: String,
    },

    /// Run the worker pool in the foreground until Ctrl-C/SIGTERM.
    Worker {
        /// Number of workers (overrides the configured count).
        #[arg(long)]
        count: Option<usize>,
    },

    /// Serve the read-only HTTP dashboard.
    Dashboard {
        /// Bind port (overrides the configured port).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Read or update the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration, or a single dot-notation key.
    Get {
        /// Dot-notation key, e.g. `retry.max_retries`.
        key: Option<String>,
    },

    /// Set a dot-notation key and persist the file.
    Set {
        /// Dot-notation key, e.g. `worker.poll_interval_ms`.
        key: String,

        /// New value.
        value: String,
    },
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut loader = ConfigLoader::new(&cli.config)?;

    match cli.command {
        Command::Submit {
            command,
            max_retries,
            id,
        } => {
            let queue = open_queue(loader.config())?;
            let max_retries = max_retries.or(Some(loader.config().retry.max_retries));
            let id = queue
                .submit(command, max_retries, id.map(JobId::from))
                .await?;
            println!("Submitted job {id}");
        }

        Command::List { state } => {
            let queue = open_queue(loader.config())?;
            let state = state.map(|s| s.parse::<JobState>()).transpose()?;
            let jobs = queue.list(state).await?;

            println!(
                "{:<36}  {:<10}  {:>8}  {}",
                "ID", "STATE", "ATTEMPTS", "COMMAND"
            );
            for job in jobs {
                println!(
                    "{:<36}  {:<10}  {:>8}  {}",
                    job.id, job.state, job.attempts, job.command
                );
            }
        }

        Command::Status => {
            let queue = open_queue(loader.config())?;
            let status = queue.status().await?;

            println!("=== Queue Status ===");
            println!("{:<12} : {}", "pending", status.pending);
            println!("{:<12} : {}", "processing", status.processing);
            println!("{:<12} : {}", "completed", status.completed);
            println!("{:<12} : {}", "dead", status.dead);
            println!("{:<12} : {}", "total", status.total);
        }

        Command::Requeue { id } => {
            let queue = open_queue(loader.config())?;
            let job = queue.requeue(&JobId::from(id)).await?;
            println!("Requeued job {} as pending", job.id);
        }

        Command::Worker { count } => {
            register_metrics();
            let config = loader.config();
            let store = Arc::new(FileStore::open(&config.data.dir)?);
            let pool = WorkerPool::new(
                store,
                RetryPolicy::new(config.retry.base),
                WorkerPoolConfig {
                    worker_count: count.unwrap_or(config.worker.count),
                    poll_interval: config.worker.poll_interval(),
                },
            );

            pool.start()?;
            shutdown_signal().await;
            pool.stop().await;
        }

        Command::Dashboard { port } => {
            let config = loader.config();
            let queue = open_queue(config)?;

            let mut dashboard = config.dashboard.clone();
            if let Some(port) = port {
                dashboard.port = port;
            }
            let addr = dashboard.addr();

            let router = create_router(AppState::new(queue));
            info!("Starting dashboard on http://{addr}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("dashboard server error")?;
        }

        Command::Config { action } => match action {
            ConfigAction::Get { key: Some(key) } => match loader.get_value(&key) {
                Some(value) => println!("{value}"),
                None => anyhow::bail!("unknown configuration key: {key}"),
            },
            ConfigAction::Get { key: None } => {
                print!("{}", toml::to_string_pretty(loader.config())?);
            }
            ConfigAction::Set { key, value } => {
                loader.set_value(&key, &value)?;
                println!("Config updated: {key} = {value}");
            }
        },
    }

    Ok(())
}

fn open_queue(config: &AppConfig) -> anyhow::Result<JobQueue> {
    let store = FileStore::open(&config.data.dir)
        .with_context(|| format!("failed to open data dir {}", config.data.dir.display()))?;
    Ok(JobQueue::new(Arc::new(store)))
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}

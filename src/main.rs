use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swarmcrawl::cluster::Cluster;
use swarmcrawl::config::Config;
use swarmcrawl::crawler::HttpFetcher;
use swarmcrawl::models::WorkerId;
use swarmcrawl::monitor::{self, AppState, Monitor};
use swarmcrawl::storage::create_sqlite_page_store;
use swarmcrawl::store::create_redis_store;
use swarmcrawl::worker::{Worker, WorkerSettings};

#[derive(Parser)]
#[command(
    name = "swarmcrawl",
    version,
    about = "Distributed web crawler coordinated through a shared Redis frontier",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a crawl worker until interrupted
    Worker {
        /// Worker id (default: <hostname>-<pid>)
        #[arg(long)]
        id: Option<String>,

        /// Run a single iteration and exit
        #[arg(long, default_value = "false")]
        once: bool,
    },

    /// Push seed URLs into the frontier
    Seed {
        /// URLs to seed (default: crawler.seed_urls from the config)
        urls: Vec<String>,
    },

    /// Print the crawl status periodically
    Monitor {
        /// Seconds between two reports
        #[arg(short, long, default_value = "5")]
        interval: u64,

        /// Print one report and exit
        #[arg(long, default_value = "false")]
        once: bool,
    },

    /// Serve /health, /status and /metrics over HTTP
    Serve {
        /// Address to bind
        #[arg(short, long, default_value = "0.0.0.0:9090")]
        bind: SocketAddr,
    },

    /// List failed URLs
    Failures {
        /// Move every failed URL back into the frontier
        #[arg(long, default_value = "false")]
        requeue: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    // Initialize tracing/logging
    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose)?;

    if let Err(e) = swarmcrawl::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    let store = create_redis_store(&config.store)
        .await
        .with_context(|| format!("Failed to connect to coordination store at {}", config.store.url))?;
    let cluster = Cluster::from_config(store, &config)?;

    match cli.command {
        Commands::Worker { id, once } => {
            let id = id.as_deref().map_or_else(WorkerId::from_process, WorkerId::parse);
            tracing::info!(worker = %id, once = %once, "Starting worker command");
            run_worker(&config, cluster, id, once).await?;
        }

        Commands::Seed { urls } => {
            let urls = if urls.is_empty() {
                config.crawler.seed_urls.clone()
            } else {
                urls
            };
            tracing::info!(count = urls.len(), "Starting seed command");
            let pushed = cluster.frontier.submit_all(&urls).await?;
            println!("Seeded {pushed} of {} URLs", urls.len());
        }

        Commands::Monitor { interval, once } => {
            tracing::info!(interval = %interval, once = %once, "Starting monitor command");
            let monitor = build_monitor(&config, cluster);
            run_monitor(monitor, Duration::from_secs(interval.max(1)), once).await?;
        }

        Commands::Serve { bind } => {
            tracing::info!(bind = %bind, "Starting serve command");
            let state = AppState::new(build_monitor(&config, cluster));
            monitor::serve(bind, state, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        }

        Commands::Failures { requeue } => {
            tracing::info!(requeue = %requeue, "Starting failures command");
            let failures = cluster.failures.list_failures().await?;
            for url in &failures {
                println!("{url}");
            }
            println!("{} failed URLs", failures.len());

            if requeue {
                let report = cluster.failures.requeue_all(&cluster.frontier).await?;
                println!(
                    "Requeued {} URLs ({} already visited or queued)",
                    report.requeued, report.skipped
                );
            }
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => tracing_subscriber::EnvFilter::new("swarmcrawl=debug,info"),
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!("swarmcrawl={level},warn"))
            .context("Invalid logging.level")?,
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn run_worker(config: &Config, cluster: Cluster, id: WorkerId, once: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.crawler).context("Failed to create HTTP fetcher")?;
    let pages = create_sqlite_page_store(&config.page_store.sqlite_path)?;

    let worker = Worker::new(
        id,
        cluster,
        std::sync::Arc::new(fetcher),
        pages,
        WorkerSettings::from_config(config),
    );

    if once {
        let outcome = worker.run_once().await?;
        println!("{}", serde_json::to_string(&outcome)?);
        return Ok(());
    }

    let stop = worker.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current task");
            let _ = stop.send(true);
        }
    });

    worker.run().await;
    Ok(())
}

fn build_monitor(config: &Config, cluster: Cluster) -> Monitor {
    let monitor = Monitor::new(cluster, config.stale_after());
    match create_sqlite_page_store(&config.page_store.sqlite_path) {
        Ok(pages) => monitor.with_page_store(pages),
        Err(e) => {
            tracing::warn!(error = %e, "Page store unavailable, reporting without page count");
            monitor
        }
    }
}

async fn run_monitor(monitor: Monitor, interval: Duration, once: bool) -> Result<()> {
    loop {
        match monitor.snapshot().await {
            Ok(snapshot) => println!("{snapshot}"),
            Err(e) if once => return Err(e.into()),
            Err(e) => tracing::error!(error = %e, "Snapshot failed"),
        }

        if once {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod state;
pub mod text;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
pub use config::Config;
use services::MaintenanceScheduler;
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Init) = cli.command {
        return cmd_init();
    }

    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    init_tracing(&config)?;

    match cli.command {
        Some(Commands::Serve) => run_daemon(config, prometheus_handle).await,

        Some(Commands::Search { query, max_results }) => {
            cli::cmd_search(config, &query.join(" "), max_results).await
        }

        Some(Commands::History { limit }) => cli::cmd_history(&config, limit).await,

        Some(Commands::Export {
            search_id,
            format,
            output,
        }) => cli::cmd_export(&config, search_id, &format, output.as_deref()).await,

        Some(Commands::Optimize) => cli::cmd_optimize(&config).await,

        Some(Commands::Stats) => cli::cmd_stats(&config).await,

        Some(Commands::Init) => cmd_init(),

        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let (layer, task) = tracing_loki::builder()
            .label("app", "topicscout")?
            .extra_field("env", "production")?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    Ok(())
}

fn cmd_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("✓ Config file created. Edit config.toml and run again.");
    } else {
        println!("config.toml already exists, leaving it untouched.");
    }
    Ok(())
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "TopicScout v{} starting in server mode...",
        env!("CARGO_PKG_VERSION")
    );

    let port = config.server.port;
    let maintenance_hours = config.store.maintenance_interval_hours;

    let shared = Arc::new(SharedState::new(config).await?);

    let scheduler = MaintenanceScheduler::new(shared.maintenance.clone(), maintenance_hours);
    if let Err(e) = scheduler.start().await {
        error!("Scheduler error: {}", e);
    }

    let api_state = api::create_app_state(shared, prometheus_handle);
    let app = api::router(api_state).await;
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let server_handle = tokio::spawn(async move {
        info!("🌐 Web Server running at http://0.0.0.0:{}", port);
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    info!("Server running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    if let Err(e) = scheduler.stop().await {
        error!("Failed to stop scheduler: {}", e);
    }
    server_handle.abort();
    info!("Server stopped");

    Ok(())
}

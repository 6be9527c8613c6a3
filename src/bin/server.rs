//! CodeRelay HTTP server
//!
//! Serves the compiler, web engine and preview routes.

use clap::Parser;
use coderelay::config::{
    apply_env_overrides, load_config, load_config_from_path, validate_config, LogFormat,
};
use coderelay::server::{build_router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coderelay-server", about = "CodeRelay code execution server", version)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short, env = "CODERELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Port (overrides config)
    #[arg(long, short)]
    port: Option<u16>,
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load config
    let mut config = match args.config {
        Some(ref path) => {
            let mut config = load_config_from_path(path)?;
            dotenvy::dotenv().ok();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            config
        }
        None => load_config()?,
    };
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.log.level, config.log.format);

    let validation = validate_config(&config);
    for issue in &validation.warnings {
        warn!("Config warning at {}: {}", issue.path, issue.message);
    }
    if !validation.valid {
        for issue in &validation.errors {
            error!("Config error at {}: {}", issue.path, issue.message);
        }
        anyhow::bail!("Invalid configuration ({} errors)", validation.errors.len());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let environment = config.server.environment;

    let state = AppState::from_config(config)?;
    info!(
        providers = ?state.dispatcher.registry().names(),
        languages = state.dispatcher.supported_languages().len(),
        "Dispatcher ready"
    );

    let app = build_router(state);

    info!(%environment, "CodeRelay listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

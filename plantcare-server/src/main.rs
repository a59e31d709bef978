// plantcare-server/src/main.rs
mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use time::macros::format_description;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use plantcare_core::PlantCareConfig;
use plantcare_server::{build_router, AppState};

use crate::cli::Cli;

const CONFIG_FILENAME: &str = "PlantCare.toml";
const LOG_FILE_NAME: &str = "plantcare-server.log";

fn find_config_file() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    let mut current = current_dir.as_path();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.is_file() {
            return Ok(config_path);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(anyhow!(
                    "Could not find '{}' in current directory or any parent directory.",
                    CONFIG_FILENAME
                ));
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<PlantCareConfig> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => find_config_file()?,
    };
    info!("Found configuration file at: {:?}", config_path);
    let mut config = PlantCareConfig::from_file(&config_path)?;

    // Precedence: --port, then PORT, then the file.
    if let Ok(port) = env::var("PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("Invalid PORT environment variable: '{}'", port))?;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    Ok(config)
}

fn log_dir() -> Option<PathBuf> {
    dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .or_else(|| Some(env::temp_dir()))
        .map(|d| d.join("plantcare"))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining connections."),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

async fn run(config: PlantCareConfig) -> Result<()> {
    let state = AppState::from_config(&config).context("Failed to initialize application state")?;
    let app = build_router(state, &config.server)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, origins = ?config.server.allowed_origins, "PlantCare server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped.");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Logging Setup ---
    let default_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = match log_dir() {
        Some(dir) => dir,
        None => {
            eprintln!("Error: Could not determine a suitable directory for log files.");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Error: Failed to create log directory {}: {}", log_dir.display(), e);
        return ExitCode::FAILURE;
    }
    let log_path = log_dir.join(LOG_FILE_NAME);

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let local_timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(local_timer.clone());

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(local_timer)
        .with_target(false)
        .with_level(true);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Error: Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "Logging initialized. Level determined by RUST_LOG or -v flags (default: {}). Logging to stderr and {}",
        default_level,
        log_path.display()
    );
    // --- End Logging Setup ---

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            eprintln!(
                "Error: Could not find or load '{}'. Run from a directory containing it or pass --config.",
                CONFIG_FILENAME
            );
            return ExitCode::FAILURE;
        }
    };
    debug!(model = %config.model.model_name, store = ?config.store.kind, "Configuration loaded");
    if config.server.allowed_origins.is_empty() {
        warn!("No CORS origins configured; browsers will not be able to call the API.");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

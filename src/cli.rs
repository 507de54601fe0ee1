//! Process wiring: command-line configuration, logging setup, and the
//! startup/shutdown sequence tying the engine thread to process lifetime.

use crate::book::OrderBook;
use crate::engine::{Engine, EngineHandle};
use crate::server;
use clap::Parser;
use std::net::IpAddr;
use std::thread::JoinHandle;
use tokio::net::TcpListener;

/// Order book server configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "aggbook")]
#[command(version)]
#[command(about = "Aggregated level-2 order book server", long_about = None)]
pub struct CliConfig {
    /// Listen address
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Listen port
    #[arg(short, long, default_value_t = 54000)]
    pub port: u16,

    /// Maximum accepted request line length in bytes
    #[arg(long, default_value_t = server::DEFAULT_MAX_LINE_LEN)]
    pub max_line_len: usize,

    /// Log level
    #[arg(short = 'l', long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// Print the configuration and exit without starting the server
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

/// Main entry point: parse arguments, start the engine thread, serve
/// connections until ctrl-c, then drain the engine and exit.
pub async fn run() -> std::io::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);
    tracing::info!(?config, "starting");

    if config.dry_run {
        println!("{config:#?}");
        return Ok(());
    }

    let (handle, engine) = Engine::new(OrderBook::new());
    let engine_thread = engine.spawn()?;

    let listener = TcpListener::bind((config.host, config.port)).await?;
    let server_handle = handle.clone();

    tokio::select! {
        result = server::run(listener, server_handle, config.max_line_len) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
        }
    }

    match drain_engine(&handle, engine_thread).await {
        Some(processed) => tracing::info!(processed, "engine drained"),
        None => tracing::error!("engine thread panicked"),
    }
    Ok(())
}

/// Requests shutdown and waits for the engine to drain its queue. The
/// std-thread join runs on the blocking pool so no runtime worker stalls
/// while the engine finishes. Returns the processed-order count.
async fn drain_engine(handle: &EngineHandle, engine_thread: JoinHandle<u64>) -> Option<u64> {
    handle.request_shutdown();
    match tokio::task::spawn_blocking(move || engine_thread.join()).await {
        Ok(Ok(processed)) => Some(processed),
        _ => None,
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

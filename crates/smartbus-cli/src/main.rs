//! SMARTBUS - a terminal shell for the SMARTBUS transit demo.
//!
//! Riders log in, top up their balance and browse routes and live buses;
//! the admin account reviews the fault board. The offline cache can be
//! warmed and exercised from the command line.

mod app;
mod input;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smartbus_core::config::Config;
use smartbus_core::offline::{FetchOutcome, Network, Request};

use app::App;

/// Prefix of the daily log files in the data directory
const LOG_FILE_PREFIX: &str = "smartbus.log";

/// Initialize the tracing subscriber for logging.
///
/// Returns the guard that flushes the file writer; keep it alive until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_dir = config
        .data_dir()
        .ok()
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let _log_guard = init_tracing(log_dir.as_deref());
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "SMARTBUS starting");

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--warm-cache") => return warm_cache(&config).await,
        Some("--fetch") => {
            let url = args
                .get(2)
                .context("Usage: smartbus --fetch <url>")?;
            return fetch(&config, url).await;
        }
        Some("--write-config") => {
            config.save()?;
            println!("Wrote {}", Config::config_path()?.display());
            return Ok(());
        }
        Some(other) if other.starts_with("--") => {
            anyhow::bail!("Unknown option {}. Options: --warm-cache, --fetch <url>, --write-config", other);
        }
        _ => {}
    }

    let mut app = App::new(config).await?;
    let result = app.run().await;

    info!("SMARTBUS shutting down");
    result
}

/// Install the offline cache from the network and report the partitions.
async fn warm_cache(config: &Config) -> Result<()> {
    let controller = app::build_controller(config)?;
    eprintln!(
        "Caching {} assets for {}...",
        controller.manifest().len(),
        config.origin
    );

    controller
        .start()
        .await
        .context("Failed to warm the offline cache")?;

    eprintln!("Offline cache {} ready", controller.version().version_name());
    for partition in controller.storage().partition_info().await? {
        eprintln!(
            "  {:<28} {:>3} entries, {:>9} bytes",
            partition.name, partition.entries, partition.bytes
        );
    }
    Ok(())
}

/// Fetch one URL through the offline controller, falling back to the cache
/// when the network is down. The body goes to stdout.
async fn fetch(config: &Config, url: &str) -> Result<()> {
    let controller = app::build_controller(config)?;
    let url = controller.manifest().resolve(url)?;

    let resumed = match controller.resume().await {
        Ok(resumed) => resumed,
        Err(e) => {
            warn!(error = %e, "Could not reuse the offline cache");
            false
        }
    };
    if !resumed {
        if let Err(e) = controller.start().await {
            warn!(error = %e, "Offline cache unavailable, fetching directly");
        }
    }

    let request = Request::get(url.clone());
    let outcome = controller.handle_fetch(&request).await;
    let (response, source) = match outcome {
        FetchOutcome::Served { response, source } => (response, format!("{:?}", source)),
        FetchOutcome::Passthrough => {
            let response = controller
                .network()
                .fetch(&request)
                .await
                .with_context(|| format!("Failed to fetch {}", url))?;
            (response, "Network (not intercepted)".to_string())
        }
        FetchOutcome::Unavailable => anyhow::bail!("{} is not available offline", url),
    };

    eprintln!(
        "{} {} from {}, {} bytes{}",
        response.status,
        url,
        source,
        response.body.len(),
        response
            .content_type()
            .map(|ct| format!(", {}", ct))
            .unwrap_or_default()
    );

    let is_text = response
        .content_type()
        .map(|ct| ct.starts_with("text/") || ct.contains("json") || ct.contains("svg"))
        .unwrap_or(false);
    if is_text {
        println!("{}", response.text());
    }
    Ok(())
}

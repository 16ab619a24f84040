//! ATEM DSK Controller
//!
//! Downstream keyer tie supervisor for ATEM switchers, with a web or desktop front end.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atem_dsk::api::{self, ApiState};
use atem_dsk::config::AppConfig;
use atem_dsk::controller::{ConnectionMonitor, TieController};
use atem_dsk::desktop;
use atem_dsk::log_buffer::LogBuffer;
use atem_dsk::switcher::SimulatedSwitcher;

/// ATEM DSK Controller - tie and auto-key supervision for the downstream keyer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run the desktop window
    #[arg(long, visible_alias = "tk", conflicts_with = "web")]
    desktop: bool,

    /// Run the web server
    #[arg(long, visible_alias = "flask")]
    web: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting ATEM DSK Controller v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load(&args.config).await?;

    let log = Arc::new(LogBuffer::new());
    warn!("No hardware client linked, using simulated switcher");
    let switcher = Arc::new(SimulatedSwitcher::new());
    let controller = TieController::new(switcher, log.clone(), config.timings);

    let monitor = ConnectionMonitor::new(controller.clone(), config.switcher_ip.clone()).spawn();

    if args.desktop {
        desktop::run(controller, &config.switcher_ip)?;
    } else if args.web {
        let state = Arc::new(ApiState { controller });
        api::start_server(state, &config.web_addr(), shutdown_signal()).await?;
    } else {
        log.warn(" [!][main] Specify either --desktop or --web");
    }

    monitor.abort();
    info!("ATEM DSK Controller shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

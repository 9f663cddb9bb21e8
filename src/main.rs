use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use station_seat::config::StationConfig;
use station_seat::sim::{run_demo, DemoOptions, DemoReport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Station simulator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = StationConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: head_x_offset={}, transition_speed={}, default_offset={:?}",
        config.desktop_head_x_offset, config.transition_speed, config.default_offset
    );

    let mut options = DemoOptions::default();
    if let Ok(value) = std::env::var("STATION_DEMO_SEED") {
        match value.parse() {
            Ok(seed) => options.seed = seed,
            Err(_) => warn!("Invalid STATION_DEMO_SEED '{}', using {}", value, options.seed),
        }
    }
    if let Ok(value) = std::env::var("STATION_DEMO_TICK_MS") {
        match value.parse() {
            Ok(ms) => options.tick = Duration::from_millis(ms),
            Err(_) => warn!("Invalid STATION_DEMO_TICK_MS '{}'", value),
        }
    }

    // Shutdown signal handler
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = run_demo(config, options) => {
            let report = result?;
            log_report(&report);
        }
        _ = shutdown => {
            info!("Demo interrupted");
        }
    }

    Ok(())
}

fn log_report(report: &DemoReport) {
    for (phase, snapshot) in [
        ("claim", &report.after_claim),
        ("adjust", &report.after_adjust),
        ("exit", &report.after_exit),
    ] {
        if !DemoReport::occupants_agree(snapshot) {
            warn!("Clients disagree on the occupant after {}", phase);
        }
        for client in snapshot {
            info!(
                "[{}] {} {}: occupant={:?} owner={:?} offset={:?}",
                phase, client.name, client.id, client.occupant, client.believed_owner, client.rendered_offset
            );
        }
    }
    info!("Final owner {:?}, {} messages handled", report.final_owner, report.messages);
}

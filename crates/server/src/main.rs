mod bootstrap;
mod crm;
mod health;
mod notify;

use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinSet;

use parkbot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use parkbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let mut pollers = JoinSet::new();
    for poller in app.pollers {
        pollers.spawn(async move { poller.start().await });
    }

    tracing::info!(
        event_name = "server_started",
        vk_enabled = app.config.vk.enabled,
        park = %app.config.business.park,
        "parkbot-server started"
    );

    wait_for_shutdown().await?;
    tracing::info!(event_name = "server_stopping", "parkbot-server stopping");

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let drain = async {
        while pollers.join_next().await.is_some() {}
    };
    if tokio::time::timeout(grace, drain).await.is_err() {
        pollers.abort_all();
    }

    app.db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

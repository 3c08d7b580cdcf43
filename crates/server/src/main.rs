mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use homecord_core::config::{AppConfig, LoadOptions};
use homecord_core::{spawn_expiry_sweeper, ShowcaseJanitor};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

fn init_logging(config: &AppConfig) {
    use homecord_core::config::LogFormat::*;
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

/// Removes expired showcase rows so they stop counting against capacity.
fn spawn_showcase_purge(janitor: Arc<ShowcaseJanitor>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(error) = janitor.purge_expired().await {
                warn!(
                    event_name = "system.showcase.purge_failed",
                    error = %error,
                    "expired showcase purge failed"
                );
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(app.db_pool.clone(), Arc::clone(&app.caches)),
    )
    .await?;

    let sweeper = spawn_expiry_sweeper(Arc::clone(&app.caches), app.config.engine.sweep_interval());
    let purge =
        spawn_showcase_purge(Arc::clone(&app.janitor), app.config.engine.showcase_purge_interval());

    let runner = app.runner;
    let gateway = tokio::spawn(async move {
        if let Err(error) = runner.start().await {
            warn!(event_name = "system.server.gateway_stopped", error = %error, "gateway runner stopped");
        }
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "homecord-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "homecord-server stopping"
    );

    drop(app.gateway_ingress);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, gateway).await.is_err() {
        warn!(
            event_name = "system.server.shutdown_timeout",
            grace_secs = grace.as_secs(),
            "gateway runner did not drain before the shutdown deadline"
        );
    }
    sweeper.abort();
    purge.abort();
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

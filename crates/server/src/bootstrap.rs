use std::sync::Arc;

use homecord_core::config::{AppConfig, ConfigError};
use homecord_core::ports::{
    BlocklistRepository, GuildConfigRepository, PlatformError, PlatformLookup, ShowcaseStore,
    UserConfigRepository,
};
use homecord_core::{
    ActivityCaches, Clock, EligibilityFilter, ManualFeatureFlow, PromotionEngine,
    ShowcaseJanitor, SystemClock,
};
use homecord_db::{
    connect_with_settings, migrations, DbPool, SqlBlocklistRepository, SqlGuildConfigRepository,
    SqlShowcaseStore, SqlUserConfigRepository,
};
use homecord_gateway::events::default_dispatcher;
use homecord_gateway::rest::RestPlatformLookup;
use homecord_gateway::socket::{ChannelTransport, GatewayRunner, IngressFrame, ReconnectPolicy};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Envelopes buffered between the gateway client and the runner.
const INGRESS_CAPACITY: usize = 1_024;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub caches: Arc<ActivityCaches>,
    pub janitor: Arc<ShowcaseJanitor>,
    pub runner: GatewayRunner,
    /// Decoded gateway events are pushed here, along with session losses that should trigger a
    /// reconnect. The runner stops once every sender is dropped.
    pub gateway_ingress: mpsc::Sender<IngressFrame>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("platform client setup failed: {0}")]
    Platform(#[from] PlatformError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limits = config.showcase.limits();
    let guild_configs: Arc<dyn GuildConfigRepository> =
        Arc::new(SqlGuildConfigRepository::new(db_pool.clone()));
    let users: Arc<dyn UserConfigRepository> =
        Arc::new(SqlUserConfigRepository::new(db_pool.clone()));
    let blocklist: Arc<dyn BlocklistRepository> =
        Arc::new(SqlBlocklistRepository::new(db_pool.clone()));
    let showcase: Arc<dyn ShowcaseStore> =
        Arc::new(SqlShowcaseStore::new(db_pool.clone(), limits, Arc::clone(&clock)));
    let platform: Arc<dyn PlatformLookup> = Arc::new(RestPlatformLookup::new(&config.discord)?);

    let caches = Arc::new(ActivityCaches::new(config.engine.cache_ttls(), Arc::clone(&clock)));
    let filter = Arc::new(EligibilityFilter::new(
        Arc::clone(&blocklist),
        users,
        Arc::clone(&showcase),
        limits,
        config.engine.max_content_age(),
        Arc::clone(&clock),
    ));
    let engine = Arc::new(PromotionEngine::new(
        Arc::clone(&guild_configs),
        Arc::clone(&platform),
        Arc::clone(&showcase),
        Arc::clone(&filter),
        Arc::clone(&caches),
        Arc::clone(&clock),
    ));
    let flow = Arc::new(ManualFeatureFlow::new(
        Arc::clone(&guild_configs),
        platform,
        Arc::clone(&showcase),
        filter,
        Arc::clone(&clock),
    ));
    let janitor = Arc::new(ShowcaseJanitor::new(guild_configs, blocklist, showcase, clock));

    let (gateway_ingress, transport) = ChannelTransport::new(INGRESS_CAPACITY);
    let runner = GatewayRunner::new(
        Arc::new(transport),
        default_dispatcher(engine, flow, Arc::clone(&janitor)),
        ReconnectPolicy::default(),
    );
    info!(
        event_name = "system.bootstrap.engine_ready",
        correlation_id = "bootstrap",
        max_messages = limits.messages,
        max_announcements = limits.announcements,
        max_threads = limits.threads,
        max_events = limits.events,
        "promotion engine wired"
    );

    Ok(Application { config, db_pool, caches, janitor, runner, gateway_ingress })
}

use anyhow::Context;
use messaging_service::{
    config::{Config, RealtimeBackend},
    db, logging,
    realtime::{start_pubsub_listener, ChannelRegistry, LocalBus, RealtimeBus, RedisBus},
    services::spawn_presence_sweeper,
    state::AppState,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env().context("load configuration")?);

    let db = db::init_pool(&cfg.database_url, cfg.database_max_connections)
        .await
        .context("connect to database")?;

    // Treat migration failures as fatal - the schema must be in sync
    db::run_migrations(&db)
        .await
        .context("database migrations failed")?;

    let registry = ChannelRegistry::new();
    let mut background: Vec<JoinHandle<()>> = Vec::new();

    let bus: Arc<dyn RealtimeBus> = match cfg.realtime_backend {
        RealtimeBackend::Redis => {
            let client = redis::Client::open(cfg.redis_url.as_str()).context("parse REDIS_URL")?;
            let bus = RedisBus::connect(&cfg.redis_url)
                .await
                .context("connect to redis")?;

            let listener_registry = registry.clone();
            background.push(tokio::spawn(async move {
                if let Err(e) = start_pubsub_listener(client, listener_registry).await {
                    tracing::error!(error = %e, "realtime pub/sub listener stopped");
                }
            }));
            tracing::info!("realtime backend: redis");
            Arc::new(bus)
        }
        RealtimeBackend::Local => {
            tracing::info!("realtime backend: local");
            Arc::new(LocalBus::new(registry.clone()))
        }
    };

    let state = AppState::build(cfg.clone(), db, bus, registry).context("build services")?;

    background.push(spawn_presence_sweeper(
        state.presence.clone(),
        cfg.presence_sweep_interval(),
    ));

    tracing::info!(
        max_message_chars = cfg.max_message_chars,
        max_page_size = cfg.max_page_size,
        "messaging-service started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    for handle in background {
        handle.abort();
    }
    state.db.close().await;
    Ok(())
}

pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};

async fn bootstrap() -> anyhow::Result<(AppState, RedisHandle)> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; section heartbeat windows are disabled");
    } else {
        tracing::info!("Redis connected successfully");
    }

    Ok((AppState::new(settings, db_pool, redis.clone()), redis))
}

pub async fn run() -> anyhow::Result<()> {
    let (state, redis) = bootstrap().await?;

    match state.auto_submit().rearm_pending(&state).await {
        Ok(count) => tracing::info!(count, "Re-armed auto-submit timers"),
        Err(err) => tracing::error!(error = %err, "Failed to re-arm auto-submit timers"),
    }

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Exam engine API listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::shutdown_signal("api"))
        .await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    let (state, redis) = bootstrap().await?;

    tracing::info!(
        interval_seconds = state.settings().exam().auto_submit_sweep_interval_seconds,
        batch = state.settings().exam().auto_submit_sweep_batch,
        "Exam engine worker started"
    );

    let result = tasks::scheduler::run(state).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

use std::{process, sync::Arc};

use scorta::{
    application::{inventory::InventoryService, pricing::PriceService},
    cache::{CacheHandle, RedisCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{ApiState, build_router},
        telemetry,
    },
    realtime::ConnectionManager,
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let (_cli, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(err.to_string()))?;

    telemetry::init(&settings.logging)?;

    let pool = PostgresRepositories::connect(
        &settings.database.url,
        settings.database.max_connections.get(),
    )
    .await
    .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    let repositories = Arc::new(PostgresRepositories::new(pool));
    info!("database connection established");

    let redis = RedisCache::connect(&settings.redis.url)
        .await
        .map_err(|err| InfraError::cache(err.to_string()))?;
    let cache = CacheHandle::new(Arc::new(redis));

    let manager = Arc::new(ConnectionManager::new(cache.clone()));
    manager.start();

    let inventory = InventoryService::new(
        repositories.clone(),
        cache.clone(),
        manager.clone(),
        settings.alerts.low_stock_threshold,
    );
    let prices = PriceService::new(
        repositories.clone(),
        repositories.clone(),
        cache,
        manager.clone(),
        settings.alerts.price_change_threshold,
    );

    let router = build_router(ApiState {
        inventory,
        prices,
        manager: manager.clone(),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr).await?;
    info!(addr = %settings.server.addr, "scorta listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.shutdown();
    info!("scorta stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown signal handler");
    }
}

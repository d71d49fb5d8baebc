use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "relief_fund={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let pool_config = settings.fund.pool_config()?;

    if let Some(server) = settings.server {
        tasks.spawn(async move {
            tracing::info!("Found server settings...");
            let db = match parse_database(&server.database).await {
                Ok(db) => db,
                Err(err) => {
                    tracing::error!("failed to initialize database: {err}");
                    return;
                }
            };
            let requests_db = match &server.requests_database {
                Some(config) => match parse_database(config).await {
                    Ok(db) => db,
                    Err(err) => {
                        tracing::error!("failed to initialize requests database: {err}");
                        return;
                    }
                },
                None => db.clone(),
            };

            let engine = match engine::Engine::builder()
                .database(db.clone())
                .build()
                .await
            {
                Ok(engine) => Arc::new(engine),
                Err(err) => {
                    tracing::error!("failed to build engine from database: {err}");
                    return;
                }
            };

            match engine.is_initialized().await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(err) = engine.init_pool(pool_config.clone()).await {
                        tracing::error!("failed to initialize pool: {err}");
                        return;
                    }
                }
                Err(err) => {
                    tracing::error!("failed to read pool: {err}");
                    return;
                }
            }

            let bridge = match engine::RequestBridge::builder()
                .engine(engine.clone())
                .database(requests_db)
                .build()
                .await
            {
                Ok(bridge) => Arc::new(bridge),
                Err(err) => {
                    tracing::error!("failed to build request bridge: {err}");
                    return;
                }
            };

            // Settle requests left half-decided by a previous run.
            match engine.pool().await {
                Ok(pool) => match bridge.reconcile(&pool.admin).await {
                    Ok(report) => tracing::info!(
                        checked = report.checked,
                        approved = report.approved.len(),
                        regranted = report.regranted.len(),
                        "startup reconcile done"
                    ),
                    Err(err) => tracing::error!("startup reconcile failed: {err}"),
                },
                Err(err) => tracing::error!("failed to read pool: {err}"),
            }

            let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
            let addr = format!("{}:{}", bind, server.port);
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind server listener: {err}");
                    return;
                }
            };
            let state = server::ServerState { engine, bridge, db };
            if let Err(err) = server::run_with_listener(state, listener).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use feed_ranking_service::config::StoreBackend;
use feed_ranking_service::handlers::{self, FeedHandlerState};
use feed_ranking_service::session::{MemorySessionStore, RedisSessionStore, SessionKeys};
use feed_ranking_service::store::{MemoryStore, PgContentStore};
use feed_ranking_service::{Config, FeedDependencies, FeedService};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true),
        )
        .init();

    let config = Config::from_env().context("Failed to load config")?;

    info!(
        service = %config.service.service_name,
        port = config.service.http_port,
        backend = ?config.service.store_backend,
        "Starting feed ranking service"
    );

    let deps = match config.service.store_backend {
        StoreBackend::Postgres => {
            let store = PgContentStore::connect(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            if config.database.run_migrations {
                store.migrate().await.context("Failed to run migrations")?;
            }
            let store = Arc::new(store);

            let sessions = RedisSessionStore::connect(&config.redis.url)
                .await
                .context("Failed to connect to Redis")?;
            if let Err(e) = sessions.ping().await {
                warn!(error = %e, "Redis ping failed, session dedup will degrade until it recovers");
            }

            FeedDependencies {
                content: store.clone(),
                viewers: store.clone(),
                interactions: store,
                sessions: Arc::new(sessions),
            }
        }
        StoreBackend::Memory => {
            warn!("Using in-memory stores, data is not persisted");
            let store = Arc::new(MemoryStore::new());
            FeedDependencies {
                content: store.clone(),
                viewers: store.clone(),
                interactions: store,
                sessions: Arc::new(MemorySessionStore::new()),
            }
        }
    };

    let service = Arc::new(FeedService::new(
        deps,
        config.ranking.clone(),
        SessionKeys::new(config.redis.key_prefix.clone()),
    ));
    let state = web::Data::new(FeedHandlerState { service });

    let bind_address = format!("0.0.0.0:{}", config.service.http_port);
    info!("HTTP server listening on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(handlers::health))
            .route("/metrics", web::get().to(handlers::metrics))
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await
    .context("HTTP server error")?;

    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use atelier_api::{
    app,
    state::{AppState, AuthConfig, Backends, RateLimitConfig},
};
use atelier_catalog::InMemoryCatalog;
use atelier_core::NotificationDispatcher;
use atelier_store::{
    app_config::Config, DbClient, EventProducer, PgCancellationRepository, PgCatalogRepository,
    PgOrderRepository, PgPolicyRepository, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "atelier_api=debug,atelier_order=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Atelier API on port {}", config.server.port);

    // Storage
    let backends = match config.database.url.as_deref() {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.migrate().await.context("Failed to run migrations")?;
            let orders = Arc::new(PgOrderRepository::new(db.pool.clone()));
            Backends {
                orders: orders.clone(),
                carts: orders,
                cancellations: Arc::new(PgCancellationRepository::new(db.pool.clone())),
                catalog: Arc::new(PgCatalogRepository::new(db.pool.clone())),
                policies: Arc::new(PgPolicyRepository::new(db.pool)),
            }
        }
        None => {
            tracing::warn!("No database.url configured, running on in-memory stores with a sample catalog");
            let catalog = Arc::new(InMemoryCatalog::with_samples());
            for product in catalog.products() {
                tracing::info!(product_id = %product.id, stock = product.stock, "Sample product: {}", product.name);
            }
            for bundle in catalog.bundles() {
                tracing::info!(bundle_id = %bundle.id, "Sample bundle: {}", bundle.name);
            }
            Backends::in_memory(catalog)
        }
    };

    // Buyer notifications
    let notifier = match config.kafka.as_ref() {
        Some(kafka) => {
            let producer = EventProducer::new(&kafka.brokers, &kafka.notification_topic)
                .context("Failed to create Kafka producer")?;
            NotificationDispatcher::new(Arc::new(producer))
        }
        None => NotificationDispatcher::logging(),
    };

    // Redis rate limiting
    let rate_limit = match config.redis.as_ref() {
        Some(redis) => {
            let client = RedisClient::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?;
            Some(RateLimitConfig {
                redis: Arc::new(client),
                requests_per_window: config.rate_limit.requests_per_window,
                window_seconds: config.rate_limit.window_seconds,
            })
        }
        None => None,
    };

    let app_state = AppState::new(
        backends,
        notifier,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        rate_limit,
    )?;

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

use anyhow::Context;
use ratings_core::ingest::{HttpRatingsSource, Ingestor};
use ratings_core::query::StockQueryService;
use ratings_core::storage::lock::AdvisoryLocked;
use ratings_core::storage::{PgStockStore, StockStore};
use ratings_api::{AppState, IngestTrigger};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ratings_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if let Err(e) = settings.require_all() {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "missing required configuration");
        return Err(e);
    }

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(settings.require_database_url()?)
        .await
        .context("connect DATABASE_URL failed")?;

    ratings_core::storage::migrate(&pool).await?;

    let store: Arc<dyn StockStore> = Arc::new(PgStockStore::new(pool.clone()));
    let source = HttpRatingsSource::from_settings(&settings)?;
    let ingestor = Ingestor::new(source, Arc::clone(&store), settings.ingest_max_pages);
    let runner = AdvisoryLocked::new(pool, ingestor);

    let state = AppState {
        queries: StockQueryService::new(store),
        weights: Arc::new(settings.brokerage_weights.clone()),
        ingest: IngestTrigger::new(Arc::new(runner)),
    };

    if settings.ingest_on_startup {
        tracing::info!("INGEST_ON_STARTUP set; starting background ingestion");
        state.ingest.trigger();
    }

    let app = ratings_api::build_router(state)
        .layer(ratings_api::cors_layer(&settings.cors_allowed_origins));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));

    tracing::info!(
        %addr,
        brokerage_weights = settings.brokerage_weights.len(),
        ingest_max_pages = settings.ingest_max_pages,
        "api listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &ratings_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

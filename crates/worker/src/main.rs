use anyhow::Context;
use clap::Parser;
use ratings_core::ingest::{HttpRatingsSource, IngestOutcome, IngestRunner, Ingestor};
use ratings_core::storage::lock::AdvisoryLocked;
use ratings_core::storage::{MemoryStockStore, PgStockStore, StockStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ratings_worker")]
struct Args {
    /// Upper bound on pages fetched this run. Defaults to INGEST_MAX_PAGES.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,

    /// Fetch and decode every page but write nothing to the database.
    #[arg(long)]
    dry_run: bool,
}

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

    let args = Args::parse();
    let max_pages = args.max_pages.unwrap_or(settings.ingest_max_pages);
    let source = HttpRatingsSource::from_settings(&settings)?;

    if args.dry_run {
        let store = Arc::new(MemoryStockStore::new());
        let ingestor = Ingestor::new(source, store.clone(), max_pages);
        let outcome = ingestor.run_once().await;
        let outcome = report(outcome)?;
        tracing::info!(
            dry_run = true,
            distinct_records = store.len().await,
            completed = matches!(outcome, IngestOutcome::Completed(_)),
            "dry run finished; nothing persisted"
        );
        return Ok(());
    }

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(settings.require_database_url()?)
        .await
        .context("connect DATABASE_URL failed")?;

    ratings_core::storage::migrate(&pool).await?;

    let store: Arc<dyn StockStore> = Arc::new(PgStockStore::new(pool.clone()));
    let ingestor = Ingestor::new(source, store, max_pages);
    let runner = AdvisoryLocked::new(pool, ingestor);

    report(runner.run_once().await)?;
    Ok(())
}

fn report(outcome: anyhow::Result<IngestOutcome>) -> anyhow::Result<IngestOutcome> {
    match &outcome {
        Ok(IngestOutcome::Completed(r)) => tracing::info!(
            run_id = %r.run_id,
            pages = r.pages,
            records_written = r.records_written,
            hit_page_cap = r.hit_page_cap,
            "ingestion run completed"
        ),
        Ok(IngestOutcome::Skipped) => tracing::info!("ingestion run skipped"),
        Err(err) => {
            sentry_anyhow::capture_anyhow(err);
            tracing::error!(error = %format!("{err:#}"), "ingestion run failed");
        }
    }
    outcome
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

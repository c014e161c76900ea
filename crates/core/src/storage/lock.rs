use crate::ingest::{IngestOutcome, IngestRunner};
use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks are scoped to the Postgres session, so the lock is taken and released on one
// dedicated connection that is held for the whole run.
const INGEST_LOCK_KEY: i64 = 0x5354_4F43_4B52; // "STOCKR"

pub async fn try_acquire_ingest_lock(
    pool: &sqlx::PgPool,
) -> anyhow::Result<Option<PoolConnection<Postgres>>> {
    let mut conn = pool
        .acquire()
        .await
        .context("failed to acquire connection for ingest lock")?;
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(INGEST_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={INGEST_LOCK_KEY})"))?;
    Ok(acquired.0.then_some(conn))
}

pub async fn release_ingest_lock(mut conn: PoolConnection<Postgres>) -> anyhow::Result<()> {
    let res = sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(INGEST_LOCK_KEY)
        .execute(&mut *conn)
        .await;
    if res.is_err() {
        // Closing the session drops the lock instead of parking it in the pool.
        drop(conn.detach());
    }
    res.with_context(|| format!("failed to release advisory lock (key={INGEST_LOCK_KEY})"))?;
    Ok(())
}

/// Runs the wrapped ingestion only while holding the cluster-wide ingest lock, so the API and
/// the worker never ingest at the same time.
pub struct AdvisoryLocked<R> {
    pool: sqlx::PgPool,
    inner: R,
}

impl<R> AdvisoryLocked<R> {
    pub fn new(pool: sqlx::PgPool, inner: R) -> Self {
        Self { pool, inner }
    }
}

#[async_trait::async_trait]
impl<R: IngestRunner> IngestRunner for AdvisoryLocked<R> {
    async fn run_once(&self) -> anyhow::Result<IngestOutcome> {
        let Some(conn) = try_acquire_ingest_lock(&self.pool).await? else {
            tracing::warn!("ingest lock not acquired; another run in progress");
            return Ok(IngestOutcome::Skipped);
        };

        let res = self.inner.run_once().await;

        if let Err(err) = release_ingest_lock(conn).await {
            tracing::warn!(error = %err, "failed to release ingest lock");
        }
        res
    }
}

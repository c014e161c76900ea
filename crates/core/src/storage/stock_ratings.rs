use crate::domain::rating::{NewStockRating, StockRating};
use crate::query::StockFilter;
use crate::storage::{dedupe_by_key, StockStore};
use anyhow::Context;

// 9 bind parameters per row keeps a chunk far below the Postgres limit of 65535.
const UPSERT_CHUNK_SIZE: usize = 500;

const LATEST_RATINGS_SQL: &str = "SELECT id, ticker, company, target_from, target_to, action, brokerage, rating_from, rating_to, \"time\" \
     FROM ( \
         SELECT DISTINCT ON (ticker) id, ticker, company, target_from, target_to, action, brokerage, rating_from, rating_to, \"time\" \
         FROM stock_ratings \
         ORDER BY ticker, \"time\" COLLATE \"C\" DESC, id DESC \
     ) latest \
     WHERE ($1::TEXT IS NULL OR ticker = $1) \
       AND ($2::TEXT IS NULL OR company ILIKE '%' || $2 || '%') \
       AND ($3::TEXT IS NULL OR brokerage ILIKE '%' || $3 || '%') \
     ORDER BY \"time\" COLLATE \"C\" DESC, id DESC";

#[derive(Debug, Clone)]
pub struct PgStockStore {
    pool: sqlx::PgPool,
}

impl PgStockStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl StockStore for PgStockStore {
    async fn upsert_ratings(&self, records: &[NewStockRating]) -> anyhow::Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let unique = dedupe_by_key(records);
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        let mut affected: u64 = 0;
        for (batch_idx, chunk) in unique.chunks(UPSERT_CHUNK_SIZE).enumerate() {
            let t0 = std::time::Instant::now();
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO stock_ratings (ticker, company, target_from, target_to, action, brokerage, rating_from, rating_to, \"time\") ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(&r.ticker)
                    .push_bind(&r.company)
                    .push_bind(r.target_from)
                    .push_bind(r.target_to)
                    .push_bind(&r.action)
                    .push_bind(&r.brokerage)
                    .push_bind(&r.rating_from)
                    .push_bind(&r.rating_to)
                    .push_bind(&r.time);
            });
            qb.push(
                " ON CONFLICT (ticker, \"time\") DO UPDATE \
                   SET company = EXCLUDED.company, target_from = EXCLUDED.target_from, \
                       target_to = EXCLUDED.target_to, action = EXCLUDED.action, \
                       brokerage = EXCLUDED.brokerage, rating_from = EXCLUDED.rating_from, \
                       rating_to = EXCLUDED.rating_to",
            );

            let res = qb
                .build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("batch upsert stock_ratings failed")?;
            affected += res.rows_affected();

            tracing::debug!(
                batch_idx,
                batch_size = chunk.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "stock_ratings batch upsert"
            );
        }

        tx.commit().await.context("commit transaction failed")?;
        Ok(affected)
    }

    async fn latest_ratings(&self, filter: &StockFilter) -> anyhow::Result<Vec<StockRating>> {
        let company = filter.company.as_deref().map(escape_like);
        let brokerage = filter.brokerage.as_deref().map(escape_like);

        sqlx::query_as::<_, StockRating>(LATEST_RATINGS_SQL)
            .bind(filter.ticker.as_deref())
            .bind(company)
            .bind(brokerage)
            .fetch_all(&self.pool)
            .await
            .context("select latest stock_ratings failed")
    }
}

/// Escapes LIKE metacharacters (Postgres' default escape is backslash) so user input only ever
/// matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

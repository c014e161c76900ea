use crate::domain::rating::{NewStockRating, StockRating};
use crate::query::{select_latest, StockFilter};
use crate::storage::{dedupe_by_key, StockStore};

/// Process-local store with the same upsert and latest-per-ticker semantics as Postgres.
/// Backs dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStockStore {
    inner: tokio::sync::Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    rows: Vec<StockRating>,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row in id order, without any latest-per-ticker reduction.
    pub async fn all_rows(&self) -> Vec<StockRating> {
        self.inner.lock().await.rows.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl StockStore for MemoryStockStore {
    async fn upsert_ratings(&self, records: &[NewStockRating]) -> anyhow::Result<u64> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let mut written: u64 = 0;
        for record in dedupe_by_key(records) {
            match inner.rows.iter_mut().find(|row| record.same_key(row)) {
                Some(row) => {
                    let id = row.id;
                    *row = record.clone().into_stored(id);
                }
                None => {
                    inner.next_id += 1;
                    let id = inner.next_id;
                    inner.rows.push(record.clone().into_stored(id));
                }
            }
            written += 1;
        }
        Ok(written)
    }

    async fn latest_ratings(&self, filter: &StockFilter) -> anyhow::Result<Vec<StockRating>> {
        let rows = self.inner.lock().await.rows.clone();
        Ok(select_latest(rows, filter))
    }
}

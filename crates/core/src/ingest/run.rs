use crate::ingest::error::IngestError;
use crate::ingest::normalize::decode_items;
use crate::ingest::provider::RatingsSource;
use crate::ingest::{IngestOutcome, IngestRunner};
use crate::storage::StockStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Pause between consecutive page requests. Not configurable.
pub const PAGE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub source: &'static str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages: u32,
    pub records_written: u64,
    /// The run stopped at `max_pages` while the upstream still had more pages.
    pub hit_page_cap: bool,
}

/// Pages through a [`RatingsSource`] and upserts every decoded record into the store.
pub struct Ingestor<S> {
    source: S,
    store: Arc<dyn StockStore>,
    max_pages: u32,
    page_delay: Duration,
}

impl<S: RatingsSource> Ingestor<S> {
    pub fn new(source: S, store: Arc<dyn StockStore>, max_pages: u32) -> Self {
        Self {
            source,
            store,
            max_pages: max_pages.max(1),
            page_delay: PAGE_DELAY,
        }
    }

    /// Overrides the pause between pages. Tests use `Duration::ZERO`.
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Stops on an empty continuation token or at `max_pages`, whichever comes first. Any page
    /// failure aborts the run; pages already written stay committed.
    pub async fn fetch_and_store(&self) -> Result<IngestReport, IngestError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let source = self.source.source_name();

        let mut cursor: Option<String> = None;
        let mut pages: u32 = 0;
        let mut records_written: u64 = 0;
        let mut hit_page_cap = false;

        tracing::info!(%run_id, source, max_pages = self.max_pages, "ingestion started");

        loop {
            if pages >= self.max_pages {
                hit_page_cap = true;
                tracing::warn!(
                    %run_id,
                    max_pages = self.max_pages,
                    records_written,
                    "ingestion page cap reached; upstream still has pages"
                );
                break;
            }
            if pages > 0 {
                tokio::time::sleep(self.page_delay).await;
            }

            let page_no = pages + 1;
            let page = self
                .source
                .fetch_page(cursor.as_deref())
                .await
                .map_err(|e| IngestError::from_source(page_no, e))?;

            let records = decode_items(&page.items).map_err(|e| IngestError::validate(page_no, e))?;

            let written = if records.is_empty() {
                0
            } else {
                self.store
                    .upsert_ratings(&records)
                    .await
                    .map_err(|e| IngestError::store(page_no, &e))?
            };
            records_written += written;
            pages = page_no;

            tracing::info!(
                %run_id,
                page = page_no,
                items = page.items.len(),
                written,
                "ingested ratings page"
            );

            match page.continuation() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        let finished_at = Utc::now();
        tracing::info!(
            %run_id,
            pages,
            records_written,
            hit_page_cap,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "ingestion finished"
        );

        Ok(IngestReport {
            run_id,
            source,
            started_at,
            finished_at,
            pages,
            records_written,
            hit_page_cap,
        })
    }
}

#[async_trait::async_trait]
impl<S: RatingsSource> IngestRunner for Ingestor<S> {
    async fn run_once(&self) -> anyhow::Result<IngestOutcome> {
        Ok(IngestOutcome::Completed(self.fetch_and_store().await?))
    }
}

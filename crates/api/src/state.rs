use ratings_core::ingest::{IngestOutcome, IngestRunner};
use ratings_core::query::StockQueryService;
use ratings_core::scoring::BrokerageWeights;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub queries: StockQueryService,
    pub weights: Arc<dyn BrokerageWeights>,
    pub ingest: IngestTrigger,
}

/// Fire-and-forget ingestion with at most one run in flight per process.
#[derive(Clone)]
pub struct IngestTrigger {
    runner: Arc<dyn IngestRunner>,
    in_flight: Arc<AtomicBool>,
}

impl IngestTrigger {
    pub fn new(runner: Arc<dyn IngestRunner>) -> Self {
        Self {
            runner,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Starts a background run and returns immediately. Returns `false` when a run started by
    /// this process is still going, in which case nothing new is started.
    pub fn trigger(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!("ingestion already running; trigger ignored");
            return false;
        }

        let runner = Arc::clone(&self.runner);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            // The run gets its own task so a panic inside it cannot skip clearing the flag.
            let run = tokio::spawn(async move { runner.run_once().await });
            match run.await {
                Ok(Ok(IngestOutcome::Completed(report))) => tracing::info!(
                    run_id = %report.run_id,
                    pages = report.pages,
                    records_written = report.records_written,
                    hit_page_cap = report.hit_page_cap,
                    "background ingestion completed"
                ),
                Ok(Ok(IngestOutcome::Skipped)) => {
                    tracing::info!("background ingestion skipped; another process holds the lock")
                }
                Ok(Err(err)) => {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(error = %format!("{err:#}"), "background ingestion failed");
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "background ingestion aborted");
                }
            }
            in_flight.store(false, Ordering::Release);
        });
        true
    }
}

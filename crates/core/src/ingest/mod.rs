pub mod error;
pub mod normalize;
pub mod provider;
pub mod run;
pub mod types;

pub use error::{IngestError, IngestStage, SourceError};
pub use provider::{HttpRatingsSource, RatingsSource};
pub use run::{IngestReport, Ingestor};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Completed(IngestReport),
    /// Another run held the ingest lock.
    Skipped,
}

/// One complete ingestion run, however it is guarded.
#[async_trait::async_trait]
pub trait IngestRunner: Send + Sync {
    async fn run_once(&self) -> anyhow::Result<IngestOutcome>;
}

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Request,
    Status,
    Decode,
    Validate,
    Store,
}

impl IngestStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Status => "status",
            Self::Decode => "decode",
            Self::Validate => "validate",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure fetching a single page from the upstream source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    Request(String),
    Status { status: u16, body: String },
    Decode(String),
}

impl SourceError {
    pub fn stage(&self) -> IngestStage {
        match self {
            Self::Request(_) => IngestStage::Request,
            Self::Status { .. } => IngestStage::Status,
            Self::Decode(_) => IngestStage::Decode,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(detail) => write!(f, "upstream request failed: {detail}"),
            Self::Status { status, body } => write!(f, "upstream HTTP {status}: {body}"),
            Self::Decode(detail) => write!(f, "upstream response is not a ratings page: {detail}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Aborted ingestion run. Pages before `page` stay committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestError {
    pub page: u32,
    pub stage: IngestStage,
    pub detail: String,
}

impl IngestError {
    pub fn from_source(page: u32, err: SourceError) -> Self {
        Self {
            page,
            stage: err.stage(),
            detail: err.to_string(),
        }
    }

    pub fn validate(page: u32, detail: impl fmt::Display) -> Self {
        Self {
            page,
            stage: IngestStage::Validate,
            detail: detail.to_string(),
        }
    }

    pub fn store(page: u32, err: &anyhow::Error) -> Self {
        Self {
            page,
            stage: IngestStage::Store,
            detail: format!("{err:#}"),
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ingestion failed on page {} (stage={}): {}",
            self.page, self.stage, self.detail
        )
    }
}

impl std::error::Error for IngestError {}

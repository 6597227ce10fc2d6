//! Error types for the ingestion pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal errors. Any of these aborts the ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive entry not found: {0}")]
    MissingEntry(String),

    #[error("TSV decode error: {0}")]
    Decode(#[from] csv::Error),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed field `{field}` in row {row}: {message}")]
    MalformedField {
        field: &'static str,
        row: u64,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download of {url} failed with status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("graph store error: {0}")]
    Store(String),

    #[error("ingestion unit failed: {0}")]
    Unit(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<neo4rs::Error> for IngestError {
    fn from(err: neo4rs::Error) -> Self {
        IngestError::Store(err.to_string())
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Unit(err.to_string())
    }
}

/// Reasons an article's content could not be resolved.
///
/// These never abort the pipeline; the article is ingested with empty content.
#[derive(Debug, Error)]
pub enum EnrichmentFailure {
    #[error("no content id in url {0}")]
    NoContentId(String),

    #[error("content id {0} missing from type map")]
    UnknownContentId(String),

    #[error("unsupported content type tag `{0}`")]
    UnknownContentType(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("fetch returned status {0}")]
    Status(u16),

    #[error("cache I/O failed: {0}")]
    Cache(#[from] std::io::Error),

    #[error("publication date element missing")]
    MissingDate,

    #[error("unparseable publication date `{0}`")]
    InvalidDate(String),
}

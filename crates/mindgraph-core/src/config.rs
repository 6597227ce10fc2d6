//! Ingestion configuration
//!
//! Everything the reader, enricher and pipeline need is carried in one
//! [`IngestConfig`] value and passed to their constructors.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{IngestError, Result};

pub const DEFAULT_BASE_URL: &str = "https://mind201910small.blob.core.windows.net/release/";
pub const DEFAULT_TYPE_MAP_URL: &str =
    "https://raw.githubusercontent.com/msnews/MIND/master/crawler/doc_type.json";

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_COMMIT_EVERY: u64 = 10_000;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Which MIND release to ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetSize {
    Small,
    Large,
}

impl DatasetSize {
    /// Archive holding `news.tsv` and `behaviors.tsv` for training.
    pub fn training_archive(self) -> &'static str {
        match self {
            DatasetSize::Small => "MINDsmall_train.zip",
            DatasetSize::Large => "MINDlarge_train.zip",
        }
    }
}

impl FromStr for DatasetSize {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "small" => Ok(DatasetSize::Small),
            "large" => Ok(DatasetSize::Large),
            other => Err(IngestError::Config(format!(
                "invalid type: {other}, supported values are 'small' and 'large'"
            ))),
        }
    }
}

impl fmt::Display for DatasetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSize::Small => f.write_str("small"),
            DatasetSize::Large => f.write_str("large"),
        }
    }
}

/// How a negative (`-0`) impression label is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeImpressionPolicy {
    /// Link the user to the article with `Ignored`/`IgnoredBy`.
    #[default]
    RecordIgnored,
    /// Link every impression with `Viewed`/`ViewedBy`, whatever its label.
    FoldIntoViewed,
}

impl FromStr for NegativeImpressionPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ignored" => Ok(NegativeImpressionPolicy::RecordIgnored),
            "viewed" => Ok(NegativeImpressionPolicy::FoldIntoViewed),
            other => Err(IngestError::Config(format!(
                "invalid negative impression policy: {other}, supported values are 'ignored' and 'viewed'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub dataset: DatasetSize,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub base_url: String,
    pub type_map_url: String,
    /// Maximum enrichment units in flight.
    pub concurrency: usize,
    /// Impression rows between forced commits.
    pub commit_every: u64,
    pub fetch_timeout: Duration,
    pub negative_impressions: NegativeImpressionPolicy,
    pub track_categories: bool,
}

impl IngestConfig {
    pub fn new(dataset: DatasetSize) -> Self {
        Self {
            dataset,
            data_dir: PathBuf::from(".data"),
            cache_dir: PathBuf::from(".cache"),
            base_url: DEFAULT_BASE_URL.to_string(),
            type_map_url: DEFAULT_TYPE_MAP_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            commit_every: DEFAULT_COMMIT_EVERY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            negative_impressions: NegativeImpressionPolicy::default(),
            track_categories: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(IngestError::Config("concurrency must be at least 1".into()));
        }
        if self.commit_every == 0 {
            return Err(IngestError::Config("commit interval must be at least 1".into()));
        }
        Ok(())
    }

    pub fn training_archive_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.dataset.training_archive()
        )
    }

    pub fn training_archive_path(&self) -> PathBuf {
        self.data_dir.join(self.dataset.training_archive())
    }
}

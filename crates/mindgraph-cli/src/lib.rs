//! Command-line surface of the `mindgraph` binary
//!
//! Kept in a library target so argument handling can be tested without
//! building the binary.

use std::path::PathBuf;

use clap::Parser;
use mindgraph_core::config::{DEFAULT_COMMIT_EVERY, DEFAULT_CONCURRENCY};
use mindgraph_core::{DatasetSize, IngestConfig, Neo4jSettings, NegativeImpressionPolicy};

#[derive(Debug, Parser)]
#[command(
    name = "mindgraph",
    version,
    about = "Ingest the MIND news dataset into a graph store"
)]
pub struct Cli {
    /// Dataset size: `small` or `large`
    pub dataset: DatasetSize,

    /// Graph store address, e.g. bolt://localhost:7687
    pub server: String,

    /// Access token for the graph store
    pub token: String,

    /// Graph store user the token belongs to
    #[arg(long, env = "MINDGRAPH_USER", default_value = "neo4j")]
    pub user: String,

    /// Database to write to instead of the server default
    #[arg(long, env = "MINDGRAPH_DATABASE")]
    pub database: Option<String>,

    /// Maximum articles enriched at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Impression rows between commits
    #[arg(long, default_value_t = DEFAULT_COMMIT_EVERY)]
    pub commit_every: u64,

    /// How `-0` impressions are stored: `ignored` or `viewed`
    #[arg(long, default_value = "ignored")]
    pub negative_impressions: NegativeImpressionPolicy,

    /// Skip category and subcategory nodes
    #[arg(long)]
    pub no_categories: bool,

    /// Where downloaded archives are kept
    #[arg(long, env = "MINDGRAPH_DATA_DIR", default_value = ".data")]
    pub data_dir: PathBuf,

    /// Where fetched article pages are kept
    #[arg(long, env = "MINDGRAPH_CACHE_DIR", default_value = ".cache")]
    pub cache_dir: PathBuf,

    /// Ingest into an in-memory graph and only print the summary
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn ingest_config(&self) -> IngestConfig {
        let mut config = IngestConfig::new(self.dataset);
        config.data_dir = self.data_dir.clone();
        config.cache_dir = self.cache_dir.clone();
        config.concurrency = self.concurrency;
        config.commit_every = self.commit_every;
        config.negative_impressions = self.negative_impressions;
        config.track_categories = !self.no_categories;
        config
    }

    pub fn store_settings(&self) -> Neo4jSettings {
        Neo4jSettings {
            uri: self.server.clone(),
            user: self.user.clone(),
            password: self.token.clone(),
            database: self.database.clone(),
        }
    }
}

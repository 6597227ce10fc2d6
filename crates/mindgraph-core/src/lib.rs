//! # mindgraph-core
//!
//! Core library for turning the MIND news dataset into a typed knowledge graph.
//!
//! This library provides:
//! - Streaming TSV record readers over the dataset zip archive
//! - Page enrichment with an on-disk HTML cache and per-layout text extraction
//! - A graph-store abstraction with in-memory and Neo4j implementations
//! - A two-phase pipeline with bounded concurrency and periodic commits
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mindgraph_core::{DatasetSize, IngestConfig, MemoryStore, Pipeline, RecordReader, dataset};
//!
//! # async fn example() -> mindgraph_core::Result<()> {
//! let config = IngestConfig::new(DatasetSize::Small);
//! let prepared = dataset::prepare(&config).await?;
//!
//! let store = Arc::new(MemoryStore::new());
//! let pipeline = Pipeline::from_config(config, store.clone(), prepared.type_map)?;
//! let mut reader = RecordReader::open(&prepared.archive)?;
//! let summary = pipeline.run(&mut reader).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod batcher;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod enricher;
pub mod error;
pub mod graph;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod reader;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod url_utils;

// Re-export commonly used types
pub use config::{DatasetSize, IngestConfig, NegativeImpressionPolicy};
pub use enricher::{ContentEnricher, TypeMap};
pub use error::{EnrichmentFailure, IngestError, Result};
pub use graph::{BuildStats, GraphBuilder};
pub use model::{EdgeKind, EdgePair, NodeKind, NodeRef};
pub use pipeline::{IngestSummary, Pipeline};
pub use reader::RecordReader;
pub use store::{GraphStore, MemoryStore, Neo4jSettings, Neo4jStore};
pub use types::{ArticleRecord, EnrichmentOutcome, ImpressionRecord};

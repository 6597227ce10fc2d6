//! Two-phase ingestion run
//!
//! Phase one enriches and builds every article through the bounded scheduler,
//! committing every `commit_every` articles, and ends with a commit so every
//! article upsert is durable before any impression edge is written. Phase two
//! links users to articles by key. Both phases commit through a
//! [`CommitBatcher`].

use std::fmt;
use std::io::{Read, Seek};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::batcher::CommitBatcher;
use crate::config::IngestConfig;
use crate::enricher::{ContentEnricher, TypeMap};
use crate::error::Result;
use crate::graph::GraphBuilder;
use crate::reader::RecordReader;
use crate::scheduler::BoundedScheduler;
use crate::store::GraphStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub articles: u64,
    pub enriched: u64,
    pub degraded: u64,
    pub impressions: u64,
    /// Commits issued during the impression phase, final one included.
    pub flushes: u64,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} articles ({} enriched, {} without content), {} impressions, {} commits",
            self.articles, self.enriched, self.degraded, self.impressions, self.flushes
        )
    }
}

pub struct Pipeline {
    config: IngestConfig,
    enricher: Arc<ContentEnricher>,
    builder: Arc<GraphBuilder>,
}

impl Pipeline {
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn GraphStore>,
        enricher: ContentEnricher,
    ) -> Result<Self> {
        config.validate()?;
        let builder = GraphBuilder::new(store, config.negative_impressions, config.track_categories);
        Ok(Self {
            config,
            enricher: Arc::new(enricher),
            builder: Arc::new(builder),
        })
    }

    /// Pipeline with an HTTP enricher built from `config`.
    pub fn from_config(
        config: IngestConfig,
        store: Arc<dyn GraphStore>,
        type_map: Arc<TypeMap>,
    ) -> Result<Self> {
        let enricher = ContentEnricher::new(&config, type_map)?;
        Self::new(config, store, enricher)
    }

    /// Ingest both record streams of `reader`. The returned future borrows the
    /// archive and must be awaited on the calling task.
    pub async fn run<R: Read + Seek>(&self, reader: &mut RecordReader<R>) -> Result<IngestSummary> {
        self.builder.register_schema().await?;

        let articles = self.ingest_articles(reader).await?;
        let (impressions, flushes) = self.ingest_impressions(reader).await?;

        let stats = self.builder.stats();
        let summary = IngestSummary {
            articles,
            enriched: stats.enriched,
            degraded: stats.degraded,
            impressions,
            flushes,
        };
        info!(%summary, "Ingestion finished");
        Ok(summary)
    }

    async fn ingest_articles<R: Read + Seek>(&self, reader: &mut RecordReader<R>) -> Result<u64> {
        info!(concurrency = self.config.concurrency, "Ingesting articles");
        let mut scheduler = BoundedScheduler::new(self.config.concurrency)?;
        let batcher = Arc::new(CommitBatcher::new(self.config.commit_every)?);

        for record in reader.articles()? {
            let record = record?;
            let enricher = Arc::clone(&self.enricher);
            let builder = Arc::clone(&self.builder);
            let batcher = Arc::clone(&batcher);

            scheduler
                .submit(async move {
                    let outcome = enricher.enrich(&record).await;
                    builder.ingest_article(&record, outcome).await?;
                    batcher.record(builder.store().as_ref()).await?;
                    Ok(())
                })
                .await?;
        }
        scheduler.drain().await?;

        // Barrier: nothing from phase two may run before this commit.
        batcher.finish(self.builder.store().as_ref()).await?;
        info!(
            articles = scheduler.completed(),
            commits = batcher.flushes(),
            peak_in_flight = scheduler.peak_in_flight(),
            "Articles committed"
        );
        Ok(scheduler.completed())
    }

    async fn ingest_impressions<R: Read + Seek>(
        &self,
        reader: &mut RecordReader<R>,
    ) -> Result<(u64, u64)> {
        info!(commit_every = self.config.commit_every, "Ingesting impressions");
        let store = Arc::clone(self.builder.store());
        let batcher = CommitBatcher::new(self.config.commit_every)?;

        for record in reader.impressions()? {
            let record = record?;
            self.builder.ingest_impression(&record).await?;
            batcher.record(store.as_ref()).await?;
        }
        batcher.finish(store.as_ref()).await?;

        info!(impressions = batcher.processed(), "Impressions committed");
        Ok((batcher.processed(), batcher.flushes()))
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mindgraph_cli::Cli;
use mindgraph_core::{GraphStore, MemoryStore, Neo4jStore, Pipeline, RecordReader, dataset};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mindgraph=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.ingest_config();
    config.validate().context("invalid ingestion settings")?;

    info!(dataset = %config.dataset, "Preparing dataset");
    let prepared = dataset::prepare(&config)
        .await
        .context("failed to download dataset files")?;

    let store: Arc<dyn GraphStore> = if cli.dry_run {
        info!("Dry run, writing to an in-memory graph");
        Arc::new(MemoryStore::new())
    } else {
        let settings = cli.store_settings();
        let store = Neo4jStore::connect(&settings)
            .await
            .with_context(|| format!("failed to connect to graph store at {}", settings.uri))?;
        Arc::new(store)
    };

    let mut reader = RecordReader::open(&prepared.archive)
        .with_context(|| format!("failed to open {}", prepared.archive.display()))?;
    let pipeline = Pipeline::from_config(config, Arc::clone(&store), prepared.type_map)?;

    let summary = pipeline.run(&mut reader).await?;
    store.close().await?;

    if cli.dry_run {
        println!("{summary}");
    }
    println!("Done !");
    Ok(())
}

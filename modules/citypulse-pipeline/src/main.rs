//! Batch runner: read a JSON array of raw events, run the pipeline, and
//! report per-event outcomes. Ingestion and scheduling live upstream — this
//! binary is the seam they hand batches to.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use citypulse_common::{CityPulseError, Config, RawEvent};
use citypulse_pipeline::{ClaudeGateway, Pipeline, PipelineConfig};
use citypulse_store::{DocStore, Warehouse};

#[derive(Parser, Debug)]
#[command(name = "citypulse", about = "Dedup, enrich, and persist a batch of city events")]
struct Args {
    /// Path to a JSON array of raw events.
    #[arg(long)]
    input: PathBuf,

    /// Items per fan-out chunk.
    #[arg(long, default_value_t = 10)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let events: Vec<RawEvent> = serde_json::from_str(&raw)
        .map_err(|e| CityPulseError::Validation(format!("raw event batch: {e}")))?;

    let gateway = ClaudeGateway::new(&config.anthropic_api_key, &config.claude_model);
    let doc_store = DocStore::new(&config.docstore_url, config.docstore_api_key.as_deref());
    let warehouse = Warehouse::connect(&config.warehouse_database_url).await?;
    warehouse.ensure_schema().await?;

    let pipeline = Pipeline::new(Arc::new(gateway), Arc::new(doc_store), Arc::new(warehouse))
        .with_config(PipelineConfig {
            chunk_size: args.chunk_size,
            ..PipelineConfig::default()
        });

    let output = pipeline.process(events).await;

    for outcome in &output.outcomes {
        if !outcome.doc_store.is_written() || !outcome.warehouse.is_written() {
            warn!(
                event_id = %outcome.event_id,
                doc_store = ?outcome.doc_store,
                warehouse = ?outcome.warehouse,
                "Partial persistence"
            );
        }
    }

    info!(
        input = output.summary.input_count,
        output = output.summary.output_count,
        dedup_ratio = output.summary.dedup_ratio,
        "Run finished"
    );

    Ok(())
}

//! The batch entry point: group → cluster → synthesize → enrich → persist.
//!
//! Work fans out per chunk so a large batch never issues unbounded
//! concurrent external calls; no exception from any single item terminates
//! the batch.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use citypulse_common::{
    BatchOutput, BatchSummary, CanonicalEvent, EnrichedEvent, PersistenceOutcome, RawEvent,
};

use crate::clustering::{cluster_bucket, Cluster};
use crate::enrichment::enrich;
use crate::gateway::ClassificationGateway;
use crate::grouping::group;
use crate::persistence::{persist, DocumentStore, WarehouseSink};
use crate::synthesis::synthesize;

/// Tunables for the whole pipeline. Thresholds are configuration, not magic
/// literals. The AI-confidence and lexical-fallback thresholds share a
/// default but stay independently tunable.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bucket time-window size in hours.
    pub bucket_window_hours: u32,
    /// Max timestamp distance for two reports of one event, in hours.
    pub time_window_hours: i64,
    /// Max coordinate distance for two reports of one event, in km.
    pub proximity_radius_km: f64,
    /// Min classification confidence for a similarity match.
    pub similarity_confidence_threshold: f32,
    /// Min combined Jaccard score for a fallback similarity match.
    pub heuristic_similarity_threshold: f64,
    /// Items per fan-out chunk.
    pub chunk_size: usize,
    /// Max keywords carried on a canonical event.
    pub keyword_cap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket_window_hours: 2,
            time_window_hours: 4,
            proximity_radius_km: 2.0,
            similarity_confidence_threshold: 0.75,
            heuristic_similarity_threshold: 0.75,
            chunk_size: 10,
            keyword_cap: 20,
        }
    }
}

pub struct Pipeline {
    gateway: Arc<dyn ClassificationGateway>,
    doc_store: Arc<dyn DocumentStore>,
    warehouse: Arc<dyn WarehouseSink>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        gateway: Arc<dyn ClassificationGateway>,
        doc_store: Arc<dyn DocumentStore>,
        warehouse: Arc<dyn WarehouseSink>,
    ) -> Self {
        Self {
            gateway,
            doc_store,
            warehouse,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one raw batch to enriched, dual-persisted events.
    pub async fn process(&self, raw_events: Vec<RawEvent>) -> BatchOutput {
        let input_count = raw_events.len();
        info!(input_count, "Batch processing started");

        let buckets = group(raw_events, self.config.bucket_window_hours);
        let bucket_count = buckets.len();

        let clusters = self.cluster_all(buckets.into_values().collect()).await;
        debug!(
            buckets = bucket_count,
            clusters = clusters.len(),
            "Clustering complete"
        );

        let canonical = self.synthesize_all(clusters).await;
        let enriched = self.enrich_all(canonical).await;
        let outcomes = self.persist_all(&enriched).await;

        let summary = BatchSummary::new(input_count, enriched.len());
        info!(
            input = summary.input_count,
            output = summary.output_count,
            dedup_ratio = summary.dedup_ratio,
            "Batch processing complete"
        );

        BatchOutput {
            enriched_events: enriched,
            outcomes,
            summary,
        }
    }

    async fn cluster_all(&self, buckets: Vec<Vec<RawEvent>>) -> Vec<Cluster> {
        let mut clusters = Vec::new();
        for chunk in chunked(buckets, self.config.chunk_size) {
            let results = join_all(
                chunk
                    .into_iter()
                    .map(|bucket| cluster_bucket(bucket, self.gateway.as_ref(), &self.config)),
            )
            .await;
            clusters.extend(results.into_iter().flatten());
        }
        clusters
    }

    async fn synthesize_all(&self, clusters: Vec<Cluster>) -> Vec<CanonicalEvent> {
        let mut canonical = Vec::new();
        for chunk in chunked(clusters, self.config.chunk_size) {
            let results = join_all(
                chunk
                    .into_iter()
                    .map(|cluster| synthesize(cluster, self.gateway.as_ref(), &self.config)),
            )
            .await;
            canonical.extend(results);
        }
        canonical
    }

    async fn enrich_all(&self, events: Vec<CanonicalEvent>) -> Vec<EnrichedEvent> {
        let mut enriched = Vec::new();
        for chunk in chunked(events, self.config.chunk_size) {
            let results = join_all(
                chunk
                    .into_iter()
                    .map(|event| enrich(event, self.gateway.as_ref(), &self.config)),
            )
            .await;
            enriched.extend(results);
        }
        enriched
    }

    async fn persist_all(&self, events: &[EnrichedEvent]) -> Vec<PersistenceOutcome> {
        let mut outcomes = Vec::new();
        for chunk in events.chunks(self.config.chunk_size) {
            let results = join_all(chunk.iter().map(|event| {
                persist(event, self.doc_store.as_ref(), self.warehouse.as_ref())
            }))
            .await;
            outcomes.extend(results);
        }
        outcomes
    }
}

/// Split owned items into fan-out chunks.
fn chunked<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut current = Vec::with_capacity(size);
    for item in items {
        current.push(item);
        if current.len() == size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_splits_evenly() {
        let chunks = chunked((0..25).collect::<Vec<_>>(), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn chunked_empty_input() {
        let chunks = chunked(Vec::<u8>::new(), 10);
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunked_zero_size_is_clamped() {
        let chunks = chunked(vec![1, 2, 3], 0);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn default_config_thresholds() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.similarity_confidence_threshold, 0.75);
        assert_eq!(cfg.heuristic_similarity_threshold, 0.75);
        assert_eq!(cfg.proximity_radius_km, 2.0);
        assert_eq!(cfg.time_window_hours, 4);
        assert_eq!(cfg.bucket_window_hours, 2);
    }
}

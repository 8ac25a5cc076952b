//! Incremental representative-based clustering within one bucket.
//!
//! Each event is compared against the representative (first member) of each
//! existing cluster in creation order; first match wins, otherwise it seeds
//! a new cluster. O(events × clusters) instead of full pairwise, at the cost
//! of arrival-order dependence (an accepted property, not a defect).

use tracing::{debug, warn};

use citypulse_common::RawEvent;

use crate::gateway::{ClassificationGateway, TaskLabel};
use crate::heuristics::{combined_similarity, location_proximate, time_proximate};
use crate::pipeline::PipelineConfig;

/// An ordered, non-empty collection of raw events believed to describe one
/// real occurrence. Transient — lives only for the duration of a run.
#[derive(Debug, Clone)]
pub struct Cluster {
    members: Vec<RawEvent>,
}

impl Cluster {
    fn new(seed: RawEvent) -> Self {
        Self {
            members: vec![seed],
        }
    }

    /// The first member added; all similarity checks run against it.
    pub fn representative(&self) -> &RawEvent {
        &self.members[0]
    }

    pub fn members(&self) -> &[RawEvent] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn into_members(self) -> Vec<RawEvent> {
        self.members
    }

    fn push(&mut self, event: RawEvent) {
        self.members.push(event);
    }

    /// Build a cluster from explicit members. Panics on empty input.
    #[cfg(any(test, feature = "test-support"))]
    pub fn from_members(members: Vec<RawEvent>) -> Self {
        assert!(!members.is_empty(), "cluster must be non-empty");
        Self { members }
    }
}

/// Assign each event in the bucket to the first cluster whose representative
/// it is similar to, in arrival order.
pub async fn cluster_bucket(
    bucket: Vec<RawEvent>,
    gateway: &dyn ClassificationGateway,
    cfg: &PipelineConfig,
) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    'events: for event in bucket {
        for cluster in clusters.iter_mut() {
            if is_similar(cluster.representative(), &event, gateway, cfg).await {
                cluster.push(event);
                continue 'events;
            }
        }
        clusters.push(Cluster::new(event));
    }

    debug!(clusters = clusters.len(), "Bucket clustered");
    clusters
}

/// The two-tier similarity test: cheap deterministic gates first, then one
/// classification call, with a lexical fallback when that call fails.
/// A failed comparison only affects this pair — it never aborts the batch.
async fn is_similar(
    a: &RawEvent,
    b: &RawEvent,
    gateway: &dyn ClassificationGateway,
    cfg: &PipelineConfig,
) -> bool {
    // Category mismatch ends it — no call spent.
    if a.category != b.category {
        return false;
    }

    if !location_proximate(a, b, cfg.proximity_radius_km) {
        return false;
    }

    if !time_proximate(a, b, cfg.time_window_hours) {
        return false;
    }

    let text = format!(
        "similarity check: {} vs {}",
        event_context(a),
        event_context(b)
    );
    match gateway.classify(&text, TaskLabel::SimilarityCheck).await {
        // Missing confidence reads as low-confidence, not as a match.
        Ok(result) => result.confidence.unwrap_or(0.0) >= cfg.similarity_confidence_threshold,
        Err(e) => {
            warn!(error = %e, "Similarity check failed, falling back to token overlap");
            combined_similarity(a, b) >= cfg.heuristic_similarity_threshold
        }
    }
}

/// Context string for one side of a similarity comparison.
fn event_context(e: &RawEvent) -> String {
    let mut ctx = e.title.clone();
    if let Some(desc) = &e.description {
        ctx.push(' ');
        ctx.push_str(desc);
    }
    if let Some(area) = &e.area {
        ctx.push_str(" in ");
        ctx.push_str(area);
    }
    ctx.trim().to_string()
}

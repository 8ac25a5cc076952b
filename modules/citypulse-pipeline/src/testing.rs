//! Test mocks for the pipeline seams.
//!
//! Three mocks matching the three trait boundaries:
//! - MockGateway (ClassificationGateway) — per-task scripted responses
//! - MockDocStore (DocumentStore) — in-memory document list
//! - MockWarehouse (WarehouseSink) — in-memory row list
//!
//! Plus fixture helpers for RawEvent, Cluster, CanonicalEvent, EnrichedEvent.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use citypulse_common::{
    AggregationMethod, CanonicalEvent, EnrichedEvent, EnrichmentRecord, EventSource, RawEvent,
};

use crate::clustering::Cluster;
use crate::gateway::{Classification, ClassificationGateway, TaskLabel};
use crate::persistence::{DocumentStore, WarehouseSink};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A minimal raw event: title only, everything else absent.
pub fn raw_event(title: &str) -> RawEvent {
    RawEvent {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        content: None,
        category: None,
        severity: None,
        sentiment: None,
        timestamp: None,
        location: None,
        area: None,
        keywords: Vec::new(),
        confidence: None,
        source: EventSource::UserReport,
        media_url: None,
        metadata: HashMap::new(),
    }
}

/// A cluster from explicit members. Panics on empty input.
pub fn cluster_of(members: Vec<RawEvent>) -> Cluster {
    Cluster::from_members(members)
}

/// A minimal canonical event with every enrichable field unresolved.
pub fn canonical_event(title: &str) -> CanonicalEvent {
    CanonicalEvent {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: String::new(),
        ai_summary: None,
        category: None,
        severity: None,
        sentiment: None,
        timestamp: None,
        location: None,
        area: None,
        keywords: Vec::new(),
        confidence: 0.5,
        media_url: None,
        media_description: None,
        source_event_ids: vec![Uuid::new_v4()],
        aggregation: AggregationMethod::Passthrough,
    }
}

pub fn enriched_event(title: &str) -> EnrichedEvent {
    EnrichedEvent {
        event: canonical_event(title),
        enrichment: EnrichmentRecord {
            enriched_at: Utc::now(),
            method: "parallel_enrichment_v2".to_string(),
            ai_processed_fields: Vec::new(),
            failed_dimensions: Vec::new(),
            insights: HashMap::new(),
        },
    }
}

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

/// Scripted classification gateway. Returns `Err` for unregistered tasks,
/// mirroring how an unreachable service looks to callers.
/// Builder pattern: `.on_classify()`, `.fail_classify()`, `.on_summarize()`.
pub struct MockGateway {
    responses: HashMap<TaskLabel, Classification>,
    failing_tasks: HashSet<TaskLabel>,
    fail_all: bool,
    summary: Option<String>,
    classify_log: Mutex<Vec<(TaskLabel, String)>>,
    summarize_count: Mutex<usize>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            failing_tasks: HashSet::new(),
            fail_all: false,
            summary: None,
            classify_log: Mutex::new(Vec::new()),
            summarize_count: Mutex::new(0),
        }
    }

    pub fn on_classify(mut self, task: TaskLabel, response: Classification) -> Self {
        self.responses.insert(task, response);
        self
    }

    /// Shorthand: a fields-free response with the given confidence.
    pub fn classify_confidence(self, task: TaskLabel, confidence: f32) -> Self {
        self.on_classify(task, Classification::with_confidence(confidence))
    }

    pub fn fail_classify(mut self, task: TaskLabel) -> Self {
        self.failing_tasks.insert(task);
        self
    }

    /// Every call errors — the always-timing-out gateway.
    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn on_summarize(mut self, text: &str) -> Self {
        self.summary = Some(text.to_string());
        self
    }

    pub fn classify_calls(&self) -> Vec<(TaskLabel, String)> {
        self.classify_log.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task: TaskLabel) -> usize {
        self.classify_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == task)
            .count()
    }

    pub fn summarize_calls(&self) -> usize {
        *self.summarize_count.lock().unwrap()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassificationGateway for MockGateway {
    async fn classify(&self, text: &str, task: TaskLabel) -> Result<Classification> {
        self.classify_log
            .lock()
            .unwrap()
            .push((task, text.to_string()));

        if self.fail_all || self.failing_tasks.contains(&task) {
            return Err(anyhow!("MockGateway: {task} call failed"));
        }
        self.responses
            .get(&task)
            .cloned()
            .ok_or_else(|| anyhow!("MockGateway: no response registered for {task}"))
    }

    async fn summarize(&self, _events: &[RawEvent], _context: &str) -> Result<String> {
        *self.summarize_count.lock().unwrap() += 1;

        if self.fail_all {
            return Err(anyhow!("MockGateway: summarize call failed"));
        }
        self.summary
            .clone()
            .ok_or_else(|| anyhow!("MockGateway: no summary registered"))
    }
}

// ---------------------------------------------------------------------------
// MockDocStore / MockWarehouse
// ---------------------------------------------------------------------------

pub struct MockDocStore {
    written: Mutex<Vec<EnrichedEvent>>,
    fail: bool,
}

impl MockDocStore {
    pub fn new() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn written(&self) -> Vec<EnrichedEvent> {
        self.written.lock().unwrap().clone()
    }
}

impl Default for MockDocStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MockDocStore {
    async fn put_event(&self, event: &EnrichedEvent) -> Result<String> {
        if self.fail {
            return Err(anyhow!("MockDocStore: write rejected"));
        }
        self.written.lock().unwrap().push(event.clone());
        Ok(event.event.id.to_string())
    }
}

pub struct MockWarehouse {
    written: Mutex<Vec<EnrichedEvent>>,
    fail: bool,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn written(&self) -> Vec<EnrichedEvent> {
        self.written.lock().unwrap().clone()
    }
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WarehouseSink for MockWarehouse {
    async fn append_event(&self, event: &EnrichedEvent) -> Result<String> {
        if self.fail {
            return Err(anyhow!("MockWarehouse: connection refused"));
        }
        let mut rows = self.written.lock().unwrap();
        rows.push(event.clone());
        Ok(rows.len().to_string())
    }
}

//! Low-latency document store client.
//!
//! Serves the read path for city pages and alerts, so documents carry a
//! time-to-live; expired documents are reaped by the store itself.

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use citypulse_common::EnrichedEvent;

/// Default document lifetime. The warehouse keeps the durable copy.
const DEFAULT_TTL_DAYS: i64 = 30;

pub struct DocStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    ttl_days: i64,
}

#[derive(Serialize)]
struct EventDocument<'a> {
    #[serde(flatten)]
    event: &'a EnrichedEvent,
    expires_at: DateTime<Utc>,
}

impl DocStore {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
            ttl_days: DEFAULT_TTL_DAYS,
        }
    }

    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl_days = days;
        self
    }

    /// Upsert one enriched event document, keyed by event id.
    /// Returns the document id.
    pub async fn put_event(&self, event: &EnrichedEvent) -> Result<String> {
        let doc_id = event.event.id.to_string();
        let endpoint = format!("{}/v1/events/{doc_id}", self.base_url);

        let body = EventDocument {
            event,
            expires_at: Utc::now() + chrono::Duration::days(self.ttl_days),
        };

        let mut request = self.client.put(&endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Document store error ({status}): {message}"));
        }

        debug!(doc_id, "Event document written");
        Ok(doc_id)
    }
}

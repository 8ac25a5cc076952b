//! Dual-write persistence. The two stores are independent resources with no
//! cross-store transaction: each write succeeds or fails on its own, and a
//! storage failure never fails an event that enriched successfully.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use citypulse_common::{EnrichedEvent, PersistenceOutcome, WriteResult};

// ---------------------------------------------------------------------------
// Store seams
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write one enriched event document. Returns the document id.
    async fn put_event(&self, event: &EnrichedEvent) -> Result<String>;
}

#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Append one enriched event row. Returns the row id.
    async fn append_event(&self, event: &EnrichedEvent) -> Result<String>;
}

#[async_trait]
impl DocumentStore for citypulse_store::DocStore {
    async fn put_event(&self, event: &EnrichedEvent) -> Result<String> {
        self.put_event(event).await
    }
}

#[async_trait]
impl WarehouseSink for citypulse_store::Warehouse {
    async fn append_event(&self, event: &EnrichedEvent) -> Result<String> {
        self.append_event(event).await
    }
}

// ---------------------------------------------------------------------------
// Persistence stage
// ---------------------------------------------------------------------------

/// Issue both writes concurrently and report them separately. Neither write
/// cancels, retries, or fails the other.
pub async fn persist(
    event: &EnrichedEvent,
    doc_store: &dyn DocumentStore,
    warehouse: &dyn WarehouseSink,
) -> PersistenceOutcome {
    let (doc_result, warehouse_result) =
        tokio::join!(doc_store.put_event(event), warehouse.append_event(event));

    PersistenceOutcome {
        event_id: event.event.id,
        doc_store: to_write_result("document store", event, doc_result),
        warehouse: to_write_result("warehouse", event, warehouse_result),
    }
}

fn to_write_result(store: &str, event: &EnrichedEvent, result: Result<String>) -> WriteResult {
    match result {
        Ok(id) => WriteResult::Written { id },
        Err(e) => {
            warn!(event_id = %event.event.id, store, error = %e, "Store write failed");
            WriteResult::Failed {
                error: e.to_string(),
            }
        }
    }
}

//! Append-only analytical warehouse sink.
//!
//! Each enriched event becomes one row in the `event_warehouse` Postgres
//! table: typed columns for the dimensions analysts slice on, plus the full
//! JSONB payload. Rows are never updated or deleted by the pipeline.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use citypulse_common::EnrichedEvent;

pub struct Warehouse {
    pool: PgPool,
}

impl Warehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the warehouse table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_warehouse (
                id          BIGSERIAL PRIMARY KEY,
                event_id    UUID        NOT NULL,
                title       TEXT        NOT NULL,
                category    TEXT,
                severity    TEXT,
                area        TEXT,
                event_time  TIMESTAMPTZ,
                confidence  REAL        NOT NULL,
                aggregation TEXT        NOT NULL,
                payload     JSONB       NOT NULL,
                ingested_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append one enriched event. Returns the warehouse row id.
    pub async fn append_event(&self, event: &EnrichedEvent) -> Result<String> {
        let e = &event.event;
        let payload = serde_json::to_value(event)?;

        let row_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO event_warehouse
                (event_id, title, category, severity, area, event_time, confidence, aggregation, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(e.id)
        .bind(&e.title)
        .bind(e.category.map(|c| c.to_string()))
        .bind(e.severity.map(|s| s.to_string()))
        .bind(&e.area)
        .bind(e.timestamp)
        .bind(e.confidence)
        .bind(e.aggregation.to_string())
        .bind(&payload)
        .fetch_one(&self.pool)
        .await?;

        debug!(event_id = %e.id, row_id, "Event appended to warehouse");
        Ok(row_id.to_string())
    }
}

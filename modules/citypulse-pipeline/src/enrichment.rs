//! Fill missing structured fields on a canonical event, one classification
//! call per missing dimension, all in parallel. A dimension's failure never
//! aborts its siblings; partial enrichment is the steady state under flaky
//! external calls. Fields already present are never overwritten.

use futures::future::join_all;
use tracing::{debug, warn};

use citypulse_common::{
    CanonicalEvent, EnrichedEvent, EnrichmentDimension, EnrichmentRecord, EventCategory, GeoPoint,
    Sentiment, SentimentLabel, Severity,
};

use crate::gateway::{Classification, ClassificationGateway, TaskLabel};
use crate::pipeline::PipelineConfig;

/// Versioned tag recorded on every enrichment pass.
const ENRICHMENT_METHOD: &str = "parallel_enrichment_v2";

/// Sentiment intensity assumed when the model labels but does not score.
const DEFAULT_SENTIMENT_SCORE: f32 = 0.5;

pub async fn enrich(
    mut event: CanonicalEvent,
    gateway: &dyn ClassificationGateway,
    cfg: &PipelineConfig,
) -> EnrichedEvent {
    let needed = needed_dimensions(&event);
    debug!(event_id = %event.id, dimensions = needed.len(), "Enrichment started");

    let calls: Vec<(EnrichmentDimension, String)> = needed
        .iter()
        .map(|&dim| (dim, dimension_context(&event, dim)))
        .collect();

    let dimension_futures = calls.iter().map(|(dim, ctx)| async move {
        (*dim, gateway.classify(ctx, task_for(*dim)).await)
    });

    // The insight call always runs, independent of the dimensions.
    let insight_context = base_text(&event);
    let (results, insight) = tokio::join!(
        join_all(dimension_futures),
        gateway.classify(&insight_context, TaskLabel::InsightGeneration),
    );

    let mut ai_processed_fields = Vec::new();
    let mut failed_dimensions = Vec::new();

    for (dim, result) in results {
        match result {
            Ok(classification) => {
                if apply_dimension(&mut event, dim, &classification, cfg) {
                    ai_processed_fields.push(dim);
                }
            }
            Err(e) => {
                warn!(event_id = %event.id, dimension = %dim, error = %e, "Enrichment call failed");
                failed_dimensions.push(dim);
            }
        }
    }

    let insights = match insight {
        Ok(classification) => classification.fields,
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "Insight call failed");
            Default::default()
        }
    };

    EnrichedEvent {
        event,
        enrichment: EnrichmentRecord {
            enriched_at: chrono::Utc::now(),
            method: ENRICHMENT_METHOD.to_string(),
            ai_processed_fields,
            failed_dimensions,
            insights,
        },
    }
}

/// Dimensions whose needs-enrichment predicate holds.
fn needed_dimensions(event: &CanonicalEvent) -> Vec<EnrichmentDimension> {
    let mut needed = Vec::new();
    // Content also re-runs when the descriptive surface is empty.
    if event.category.is_none() || event.title.is_empty() || event.keywords.is_empty() {
        needed.push(EnrichmentDimension::Category);
    }
    if event.sentiment.is_none() {
        needed.push(EnrichmentDimension::Sentiment);
    }
    if event.location.is_none() {
        needed.push(EnrichmentDimension::Location);
    }
    if event.severity.is_none() {
        needed.push(EnrichmentDimension::Severity);
    }
    if event.media_url.is_some() && event.media_description.is_none() {
        needed.push(EnrichmentDimension::Media);
    }
    needed
}

fn task_for(dim: EnrichmentDimension) -> TaskLabel {
    match dim {
        EnrichmentDimension::Category => TaskLabel::ContentAnalysis,
        EnrichmentDimension::Sentiment => TaskLabel::SentimentAnalysis,
        EnrichmentDimension::Location => TaskLabel::LocationInference,
        EnrichmentDimension::Severity => TaskLabel::SeverityAssessment,
        EnrichmentDimension::Media => TaskLabel::MediaAnalysis,
    }
}

fn base_text(event: &CanonicalEvent) -> String {
    format!("{}. {}", event.title, event.description)
}

fn dimension_context(event: &CanonicalEvent, dim: EnrichmentDimension) -> String {
    match dim {
        EnrichmentDimension::Category | EnrichmentDimension::Sentiment => base_text(event),
        EnrichmentDimension::Location => format!(
            "{} current area: {}",
            base_text(event),
            event.area.as_deref().unwrap_or("unknown")
        ),
        EnrichmentDimension::Severity => format!(
            "{} Category: {}",
            base_text(event),
            event
                .category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string())
        ),
        EnrichmentDimension::Media => format!(
            "media: {} for event: {}",
            event.media_url.as_deref().unwrap_or(""),
            event.title
        ),
    }
}

/// Merge one successful classification into the event. Returns true when a
/// field was actually resolved by the call. Present fields are left alone.
fn apply_dimension(
    event: &mut CanonicalEvent,
    dim: EnrichmentDimension,
    classification: &Classification,
    cfg: &PipelineConfig,
) -> bool {
    match dim {
        EnrichmentDimension::Category => {
            let mut resolved = false;
            if event.category.is_none() {
                if let Some(category) = classification
                    .str_field("category")
                    .and_then(EventCategory::from_str_loose)
                {
                    event.category = Some(category);
                    resolved = true;
                }
            }
            if event.keywords.is_empty() {
                let keywords = classification.string_list("keywords");
                if !keywords.is_empty() {
                    event.keywords = keywords.into_iter().take(cfg.keyword_cap).collect();
                    resolved = true;
                }
            }
            resolved
        }
        EnrichmentDimension::Sentiment => {
            if event.sentiment.is_some() {
                return false;
            }
            match classification
                .str_field("sentiment")
                .and_then(SentimentLabel::from_str_loose)
            {
                Some(label) => {
                    let score = classification
                        .f64_field("sentiment_score")
                        .map(|s| s as f32)
                        .unwrap_or(DEFAULT_SENTIMENT_SCORE);
                    event.sentiment = Some(Sentiment { label, score });
                    true
                }
                None => false,
            }
        }
        EnrichmentDimension::Location => {
            let mut resolved = false;
            if event.location.is_none() {
                if let (Some(lat), Some(lng)) = (
                    classification.f64_field("latitude"),
                    classification.f64_field("longitude"),
                ) {
                    event.location = Some(GeoPoint { lat, lng });
                    resolved = true;
                }
            }
            if event.area.is_none() {
                if let Some(name) = classification.str_field("location_name") {
                    event.area = Some(name.to_string());
                    resolved = true;
                }
            }
            resolved
        }
        EnrichmentDimension::Severity => {
            if event.severity.is_some() {
                return false;
            }
            match classification
                .str_field("severity")
                .and_then(Severity::from_str_loose)
            {
                Some(severity) => {
                    event.severity = Some(severity);
                    true
                }
                None => {
                    // Unmatched or missing severity defaults low rather than
                    // propagating an error.
                    warn!(event_id = %event.id, "Unparseable severity from classification, defaulting to LOW");
                    event.severity = Some(Severity::Low);
                    false
                }
            }
        }
        EnrichmentDimension::Media => {
            if event.media_description.is_some() {
                return false;
            }
            match classification.str_field("summary") {
                Some(summary) => {
                    event.media_description = Some(summary.to_string());
                    true
                }
                None => false,
            }
        }
    }
}

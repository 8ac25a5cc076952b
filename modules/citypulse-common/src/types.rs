use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Traffic,
    CivicIssue,
    Emergency,
    Weather,
    Infrastructure,
    CulturalEvent,
    Safety,
    Community,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Traffic => write!(f, "TRAFFIC"),
            EventCategory::CivicIssue => write!(f, "CIVIC_ISSUE"),
            EventCategory::Emergency => write!(f, "EMERGENCY"),
            EventCategory::Weather => write!(f, "WEATHER"),
            EventCategory::Infrastructure => write!(f, "INFRASTRUCTURE"),
            EventCategory::CulturalEvent => write!(f, "CULTURAL_EVENT"),
            EventCategory::Safety => write!(f, "SAFETY"),
            EventCategory::Community => write!(f, "COMMUNITY"),
        }
    }
}

impl EventCategory {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "traffic" => Some(Self::Traffic),
            "civic_issue" | "civic" => Some(Self::CivicIssue),
            "emergency" => Some(Self::Emergency),
            "weather" => Some(Self::Weather),
            "infrastructure" => Some(Self::Infrastructure),
            "cultural_event" | "cultural" | "event" => Some(Self::CulturalEvent),
            "safety" | "crime" => Some(Self::Safety),
            "community" => Some(Self::Community),
            _ => None,
        }
    }
}

/// Ordered so aggregation across a cluster is `Iterator::max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Moderate => write!(f, "MODERATE"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl Severity {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" => Some(Self::Low),
            "moderate" | "medium" => Some(Self::Moderate),
            "high" | "major" => Some(Self::High),
            "critical" | "severe" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

impl SentimentLabel {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// Intensity in [0,1].
    pub score: f32,
}

/// How a raw event reached the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    UserReport,
    Scraper,
    NewsApi,
    Synthetic,
    #[default]
    Unknown,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSource::UserReport => write!(f, "user_report"),
            EventSource::Scraper => write!(f, "scraper"),
            EventSource::NewsApi => write!(f, "news_api"),
            EventSource::Synthetic => write!(f, "synthetic"),
            EventSource::Unknown => write!(f, "unknown"),
        }
    }
}

impl EventSource {
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "user_report" | "user" => Self::UserReport,
            "scraper" | "scrape" => Self::Scraper,
            "news_api" | "news" => Self::NewsApi,
            "synthetic" => Self::Synthetic,
            _ => Self::Unknown,
        }
    }
}

// --- Raw input ---

/// One independently-sourced city event report. Immutable once handed to the
/// pipeline; consumed, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub category: Option<EventCategory>,
    pub severity: Option<Severity>,
    pub sentiment: Option<Sentiment>,
    pub timestamp: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    /// Free-text area/neighborhood name, as reported.
    pub area: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub confidence: Option<f32>,
    #[serde(default)]
    pub source: EventSource,
    pub media_url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

// --- Canonical output ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    AiSynthesis,
    ManualFallback,
    Passthrough,
}

impl std::fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationMethod::AiSynthesis => write!(f, "ai_synthesis"),
            AggregationMethod::ManualFallback => write!(f, "manual_fallback"),
            AggregationMethod::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// The single record representing one real-world occurrence — either a
/// synthesized cluster or a passed-through singleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub ai_summary: Option<String>,
    pub category: Option<EventCategory>,
    pub severity: Option<Severity>,
    pub sentiment: Option<Sentiment>,
    pub timestamp: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    pub area: Option<String>,
    pub keywords: Vec<String>,
    pub confidence: f32,
    pub media_url: Option<String>,
    pub media_description: Option<String>,
    /// IDs of the raw events this canonical event was aggregated from.
    pub source_event_ids: Vec<Uuid>,
    pub aggregation: AggregationMethod,
}

// --- Enrichment ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentDimension {
    Category,
    Sentiment,
    Location,
    Severity,
    Media,
}

impl std::fmt::Display for EnrichmentDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentDimension::Category => write!(f, "category"),
            EnrichmentDimension::Sentiment => write!(f, "sentiment"),
            EnrichmentDimension::Location => write!(f, "location"),
            EnrichmentDimension::Severity => write!(f, "severity"),
            EnrichmentDimension::Media => write!(f, "media"),
        }
    }
}

/// Typed provenance for one enrichment pass. Only `insights` stays an open
/// map — it holds genuinely free-form AI output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub enriched_at: DateTime<Utc>,
    /// Versioned enrichment method tag, e.g. "parallel_enrichment_v2".
    pub method: String,
    /// Dimensions resolved by a successful classification call.
    pub ai_processed_fields: Vec<EnrichmentDimension>,
    /// Dimensions whose classification call failed; the field stays unresolved.
    pub failed_dimensions: Vec<EnrichmentDimension>,
    #[serde(default)]
    pub insights: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedEvent {
    pub event: CanonicalEvent,
    pub enrichment: EnrichmentRecord,
}

// --- Persistence outcome ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteResult {
    Written { id: String },
    Failed { error: String },
}

impl WriteResult {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }
}

/// Independent per-store write results for one enriched event. A failed
/// store write is reported here, never escalated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceOutcome {
    pub event_id: Uuid,
    pub doc_store: WriteResult,
    pub warehouse: WriteResult,
}

// --- Batch output ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub input_count: usize,
    pub output_count: usize,
    /// Fraction of input events eliminated by clustering. 0 for empty input.
    pub dedup_ratio: f64,
}

impl BatchSummary {
    pub fn new(input_count: usize, output_count: usize) -> Self {
        let dedup_ratio = if input_count == 0 {
            0.0
        } else {
            (input_count - output_count) as f64 / input_count as f64
        };
        Self {
            input_count,
            output_count,
            dedup_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub enriched_events: Vec<EnrichedEvent>,
    pub outcomes: Vec<PersistenceOutcome>,
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_low_to_critical() {
        assert!(Severity::Low < Severity::Moderate);
        assert!(Severity::Moderate < Severity::High);
        assert!(Severity::High < Severity::Critical);
        let max = [Severity::Moderate, Severity::Critical, Severity::Low]
            .into_iter()
            .max();
        assert_eq!(max, Some(Severity::Critical));
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!(Severity::from_str_loose("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::from_str_loose("moderate"), Some(Severity::Moderate));
        assert_eq!(Severity::from_str_loose("Medium"), Some(Severity::Moderate));
        assert_eq!(Severity::from_str_loose("garbage"), None);
    }

    #[test]
    fn category_parses_loose_forms() {
        assert_eq!(
            EventCategory::from_str_loose("civic issue"),
            Some(EventCategory::CivicIssue)
        );
        assert_eq!(
            EventCategory::from_str_loose("TRAFFIC"),
            Some(EventCategory::Traffic)
        );
        assert_eq!(EventCategory::from_str_loose("???"), None);
    }

    #[test]
    fn category_display_matches_wire_vocabulary() {
        assert_eq!(EventCategory::CivicIssue.to_string(), "CIVIC_ISSUE");
        assert_eq!(EventCategory::CulturalEvent.to_string(), "CULTURAL_EVENT");
    }

    #[test]
    fn haversine_koramangala_to_indiranagar() {
        // Koramangala to Indiranagar is ~5km
        let dist = haversine_km(12.9352, 77.6245, 12.9784, 77.6408);
        assert!(
            (dist - 5.1).abs() < 1.0,
            "Koramangala to Indiranagar should be ~5km, got {dist}"
        );
    }

    #[test]
    fn haversine_same_point_is_zero() {
        let dist = haversine_km(12.9716, 77.5946, 12.9716, 77.5946);
        assert!(dist < 0.001, "Same point should be 0km, got {dist}");
    }

    #[test]
    fn batch_summary_empty_input_has_zero_ratio() {
        let s = BatchSummary::new(0, 0);
        assert_eq!(s.dedup_ratio, 0.0);
    }

    #[test]
    fn batch_summary_ratio_bounds() {
        let s = BatchSummary::new(10, 4);
        assert!((s.dedup_ratio - 0.6).abs() < f64::EPSILON);
        let none = BatchSummary::new(5, 5);
        assert_eq!(none.dedup_ratio, 0.0);
    }

    #[test]
    fn aggregation_method_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AggregationMethod::AiSynthesis).unwrap(),
            "\"ai_synthesis\""
        );
        assert_eq!(
            serde_json::to_string(&AggregationMethod::ManualFallback).unwrap(),
            "\"manual_fallback\""
        );
    }

    #[test]
    fn raw_event_roundtrips_with_defaults() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "title": "Waterlogging near Silk Board",
            "description": null,
            "content": null,
            "category": "CIVIC_ISSUE",
            "severity": "HIGH",
            "sentiment": null,
            "timestamp": null,
            "location": null,
            "area": "BTM Layout",
            "confidence": 0.7,
            "media_url": null
        }"#;
        let e: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(e.category, Some(EventCategory::CivicIssue));
        assert_eq!(e.severity, Some(Severity::High));
        assert_eq!(e.source, EventSource::Unknown);
        assert!(e.keywords.is_empty());
        assert!(e.metadata.is_empty());
    }
}

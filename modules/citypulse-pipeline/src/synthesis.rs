//! Collapse a cluster into one canonical event.
//!
//! Singletons pass through untouched. Multi-member clusters get one
//! summarization call; when that fails, a deterministic template keeps the
//! event flowing. Synthesis never drops a cluster.

use tracing::warn;
use uuid::Uuid;

use citypulse_common::{AggregationMethod, CanonicalEvent, RawEvent, Severity};

use crate::clustering::Cluster;
use crate::gateway::ClassificationGateway;
use crate::pipeline::PipelineConfig;

/// Confidence assumed for members that did not report one.
const DEFAULT_MEMBER_CONFIDENCE: f32 = 0.5;

pub async fn synthesize(
    cluster: Cluster,
    gateway: &dyn ClassificationGateway,
    cfg: &PipelineConfig,
) -> CanonicalEvent {
    if cluster.len() == 1 {
        let event = cluster.into_members().pop().expect("cluster is non-empty");
        return passthrough(event);
    }

    let members = cluster.into_members();
    let count = members.len();

    let category = members[0].category;
    let category_label = category
        .map(|c| c.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let area = members.iter().find_map(|m| m.area.clone());
    let area_label = area.clone().unwrap_or_else(|| "unknown".to_string());

    let severity = members
        .iter()
        .map(|m| m.severity.unwrap_or(Severity::Low))
        .max();
    let timestamp = members.iter().filter_map(|m| m.timestamp).max();
    let location = members.iter().find_map(|m| m.location);
    let sentiment = members.iter().find_map(|m| m.sentiment);
    let media_url = members.iter().find_map(|m| m.media_url.clone());
    let keywords = merged_keywords(&members, cfg.keyword_cap);
    let confidence = members
        .iter()
        .map(|m| m.confidence.unwrap_or(DEFAULT_MEMBER_CONFIDENCE))
        .sum::<f32>()
        / count as f32;
    let source_event_ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();

    let context = format!(
        "{count} similar reports, dominant area {area_label}, category {category_label}"
    );

    let (title, description, ai_summary, aggregation) =
        match gateway.summarize(&members, &context).await {
            Ok(text) => {
                let title =
                    extract_title(&text).unwrap_or_else(|| members[0].title.clone());
                (
                    title,
                    text.clone(),
                    Some(text),
                    AggregationMethod::AiSynthesis,
                )
            }
            Err(e) => {
                warn!(error = %e, count, "Synthesis call failed, using manual fallback");
                let description = format!(
                    "Multiple {category_label} reports in {area_label} area. \
                     {count} similar events aggregated."
                );
                (
                    members[0].title.clone(),
                    description,
                    None,
                    AggregationMethod::ManualFallback,
                )
            }
        };

    CanonicalEvent {
        id: Uuid::new_v4(),
        title,
        description,
        ai_summary,
        category,
        severity,
        sentiment,
        timestamp,
        location,
        area,
        keywords,
        confidence,
        media_url,
        media_description: None,
        source_event_ids,
        aggregation,
    }
}

/// A singleton cluster's canonical event mirrors its source — no field is
/// invented, the identifier is reused.
fn passthrough(event: RawEvent) -> CanonicalEvent {
    CanonicalEvent {
        id: event.id,
        title: event.title,
        description: event.description.unwrap_or_default(),
        ai_summary: None,
        category: event.category,
        severity: event.severity,
        sentiment: event.sentiment,
        timestamp: event.timestamp,
        location: event.location,
        area: event.area,
        keywords: event.keywords,
        confidence: event.confidence.unwrap_or(DEFAULT_MEMBER_CONFIDENCE),
        media_url: event.media_url,
        media_description: None,
        source_event_ids: vec![event.id],
        aggregation: AggregationMethod::Passthrough,
    }
}

/// Deduplicated union of member keywords, capped, first-seen order.
fn merged_keywords(members: &[RawEvent], cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for member in members {
        for keyword in &member.keywords {
            let normalized = keyword.trim().to_lowercase();
            if !normalized.is_empty() && seen.insert(normalized.clone()) {
                merged.push(normalized);
                if merged.len() == cap {
                    return merged;
                }
            }
        }
    }
    merged
}

/// First line of the synthesized text whose length is strictly between
/// 10 and 100 characters.
fn extract_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| line.len() > 10 && line.len() < 100)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cluster_of, raw_event, MockGateway};
    use chrono::{TimeZone, Utc};
    use citypulse_common::{EventCategory, GeoPoint, Sentiment, SentimentLabel};

    fn cfg() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[tokio::test]
    async fn singleton_passes_through_unchanged() {
        let mut e = raw_event("Flooding on Hosur Road underpass");
        e.category = Some(EventCategory::CivicIssue);
        e.severity = Some(citypulse_common::Severity::High);
        e.area = Some("Madiwala".to_string());
        e.keywords = vec!["flooding".to_string()];
        e.confidence = Some(0.8);
        e.sentiment = Some(Sentiment {
            label: SentimentLabel::Negative,
            score: 0.7,
        });
        let source = e.clone();

        let gateway = MockGateway::new();
        let canonical = synthesize(cluster_of(vec![e]), &gateway, &cfg()).await;

        assert_eq!(canonical.id, source.id, "identifier is reused");
        assert_eq!(canonical.title, source.title);
        assert_eq!(canonical.category, source.category);
        assert_eq!(canonical.severity, source.severity);
        assert_eq!(canonical.area, source.area);
        assert_eq!(canonical.keywords, source.keywords);
        assert_eq!(canonical.confidence, 0.8);
        assert_eq!(canonical.aggregation, AggregationMethod::Passthrough);
        assert!(canonical.ai_summary.is_none());
        assert!(gateway.summarize_calls() == 0, "no call for singletons");
    }

    #[tokio::test]
    async fn cluster_synthesis_aggregates_fields() {
        let mut a = raw_event("Jam at Silk Board");
        a.category = Some(EventCategory::Traffic);
        a.severity = Some(citypulse_common::Severity::Moderate);
        a.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        a.area = Some("Koramangala".to_string());
        a.keywords = vec!["jam".to_string(), "silk board".to_string()];
        a.confidence = Some(0.6);
        let mut b = raw_event("Huge jam near Silk Board flyover");
        b.category = Some(EventCategory::Traffic);
        b.severity = Some(citypulse_common::Severity::Critical);
        b.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        b.location = Some(GeoPoint {
            lat: 12.917,
            lng: 77.623,
        });
        b.keywords = vec!["JAM".to_string(), "flyover".to_string()];

        let gateway = MockGateway::new()
            .on_summarize("Silk Board junction gridlocked\nTraffic backed up for 2km after a stalled truck.");
        let canonical = synthesize(cluster_of(vec![a, b]), &gateway, &cfg()).await;

        assert_eq!(canonical.aggregation, AggregationMethod::AiSynthesis);
        assert_eq!(canonical.title, "Silk Board junction gridlocked");
        assert_eq!(canonical.severity, Some(citypulse_common::Severity::Critical));
        assert_eq!(
            canonical.timestamp,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(canonical.area.as_deref(), Some("Koramangala"));
        assert!(canonical.location.is_some(), "first non-null location kept");
        assert_eq!(
            canonical.keywords,
            vec!["jam", "silk board", "flyover"],
            "deduplicated union in first-seen order"
        );
        // mean of 0.6 and the 0.5 default
        assert!((canonical.confidence - 0.55).abs() < 1e-6);
        assert_eq!(canonical.source_event_ids.len(), 2);
    }

    #[tokio::test]
    async fn synthesis_failure_uses_manual_template() {
        let mut a = raw_event("Jam at Silk Board");
        a.category = Some(EventCategory::Traffic);
        a.area = Some("Koramangala".to_string());
        let mut b = raw_event("Huge jam near Silk Board");
        b.category = Some(EventCategory::Traffic);

        let gateway = MockGateway::new().fail_all();
        let canonical = synthesize(cluster_of(vec![a, b]), &gateway, &cfg()).await;

        assert_eq!(canonical.aggregation, AggregationMethod::ManualFallback);
        assert_eq!(
            canonical.description,
            "Multiple TRAFFIC reports in Koramangala area. 2 similar events aggregated."
        );
        assert_eq!(canonical.title, "Jam at Silk Board", "representative title kept");
        assert!(canonical.ai_summary.is_none());
    }

    #[tokio::test]
    async fn absent_severities_aggregate_to_low() {
        let mut a = raw_event("Jam");
        a.category = Some(EventCategory::Traffic);
        let mut b = raw_event("Jam again");
        b.category = Some(EventCategory::Traffic);

        let gateway = MockGateway::new().fail_all();
        let canonical = synthesize(cluster_of(vec![a, b]), &gateway, &cfg()).await;
        assert_eq!(canonical.severity, Some(citypulse_common::Severity::Low));
    }

    #[test]
    fn extract_title_takes_first_line_in_bounds() {
        let text = "ok\nSilk Board junction gridlocked this morning\nmore detail here";
        assert_eq!(
            extract_title(text).as_deref(),
            Some("Silk Board junction gridlocked this morning")
        );
    }

    #[test]
    fn extract_title_rejects_out_of_bounds_lines() {
        assert_eq!(extract_title("short\nalso no"), None);
        let long = "x".repeat(100);
        assert_eq!(extract_title(&long), None);
    }

    #[test]
    fn keywords_capped_at_limit() {
        let mut members = Vec::new();
        for i in 0..5 {
            let mut e = raw_event("e");
            e.keywords = (0..10).map(|j| format!("kw-{i}-{j}")).collect();
            members.push(e);
        }
        let merged = merged_keywords(&members, 20);
        assert_eq!(merged.len(), 20);
    }
}

//! Pure similarity heuristics: token overlap, geographic and temporal
//! proximity. No external calls, no state.

use std::collections::HashSet;

use citypulse_common::{haversine_km, RawEvent};

/// Weights for the combined lexical fallback score.
const TITLE_WEIGHT: f64 = 0.4;
const DESCRIPTION_WEIGHT: f64 = 0.4;
const KEYWORD_WEIGHT: f64 = 0.2;

/// Lowercase alphanumeric tokens of a text.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard overlap of two token sets. Two empty sets are vacuously
/// identical (1.0); one empty set shares nothing (0.0).
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Deterministic fallback similarity when the classification call fails:
/// weighted Jaccard over title, description, and keyword token sets.
pub fn combined_similarity(a: &RawEvent, b: &RawEvent) -> f64 {
    let title = jaccard(&tokenize(&a.title), &tokenize(&b.title));
    let description = jaccard(
        &tokenize(a.description.as_deref().unwrap_or("")),
        &tokenize(b.description.as_deref().unwrap_or("")),
    );
    let keywords = jaccard(
        &a.keywords.iter().map(|k| k.to_lowercase()).collect(),
        &b.keywords.iter().map(|k| k.to_lowercase()).collect(),
    );
    TITLE_WEIGHT * title + DESCRIPTION_WEIGHT * description + KEYWORD_WEIGHT * keywords
}

/// Geographic proximity gate. Permissive when either side carries no
/// location information at all; area names compare case-insensitively;
/// coordinates compare by great-circle distance.
pub fn location_proximate(a: &RawEvent, b: &RawEvent, radius_km: f64) -> bool {
    let a_unknown = a.area.is_none() && a.location.is_none();
    let b_unknown = b.area.is_none() && b.location.is_none();
    if a_unknown || b_unknown {
        return true;
    }

    if let (Some(area_a), Some(area_b)) = (&a.area, &b.area) {
        return area_a.trim().eq_ignore_ascii_case(area_b.trim());
    }

    if let (Some(loc_a), Some(loc_b)) = (&a.location, &b.location) {
        return haversine_km(loc_a.lat, loc_a.lng, loc_b.lat, loc_b.lng) <= radius_km;
    }

    // One side has only an area name, the other only coordinates — no
    // comparable basis, stay permissive.
    true
}

/// Temporal proximity gate. Permissive when either timestamp is unknown.
pub fn time_proximate(a: &RawEvent, b: &RawEvent, window_hours: i64) -> bool {
    match (a.timestamp, b.timestamp) {
        (Some(ta), Some(tb)) => {
            let diff = (ta - tb).num_seconds().abs();
            diff <= window_hours * 3600
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::raw_event;
    use chrono::{TimeZone, Utc};
    use citypulse_common::GeoPoint;

    #[test]
    fn tokenize_strips_punctuation_and_case() {
        let tokens = tokenize("Heavy traffic, near Silk-Board!");
        assert!(tokens.contains("heavy"));
        assert!(tokens.contains("traffic"));
        assert!(tokens.contains("silk"));
        assert!(tokens.contains("board"));
        assert!(!tokens.contains(""));
    }

    #[test]
    fn jaccard_identical_sets_is_one() {
        let a = tokenize("water pipe burst");
        assert_eq!(jaccard(&a, &a), 1.0);
    }

    #[test]
    fn jaccard_disjoint_sets_is_zero() {
        let a = tokenize("water pipe");
        let b = tokenize("road closed");
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn jaccard_both_empty_is_one() {
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 1.0);
    }

    #[test]
    fn jaccard_one_empty_is_zero() {
        let a = tokenize("water pipe");
        assert_eq!(jaccard(&a, &HashSet::new()), 0.0);
    }

    #[test]
    fn combined_similarity_is_deterministic() {
        let mut a = raw_event("Heavy traffic jam at Silk Board junction");
        a.description = Some("Long queues on Outer Ring Road".to_string());
        a.keywords = vec!["traffic".into(), "silk board".into()];
        let mut b = raw_event("Heavy traffic at Silk Board junction");
        b.description = Some("Queues on Outer Ring Road".to_string());
        b.keywords = vec!["traffic".into()];

        let first = combined_similarity(&a, &b);
        let second = combined_similarity(&a, &b);
        assert_eq!(first, second);
        assert!(first > 0.5, "near-identical reports should score high, got {first}");
    }

    #[test]
    fn identical_titles_alone_pass_threshold() {
        let a = raw_event("Tree fallen on Sarjapur Road");
        let b = raw_event("Tree fallen on Sarjapur Road");
        // Empty descriptions and keyword lists are vacuously identical.
        assert!(combined_similarity(&a, &b) >= 0.75);
    }

    #[test]
    fn location_unknown_is_permissive() {
        let a = raw_event("a");
        let mut b = raw_event("b");
        b.area = Some("Koramangala".to_string());
        assert!(location_proximate(&a, &b, 2.0));
    }

    #[test]
    fn location_area_names_compare_case_insensitively() {
        let mut a = raw_event("a");
        a.area = Some("Koramangala".to_string());
        let mut b = raw_event("b");
        b.area = Some("koramangala".to_string());
        assert!(location_proximate(&a, &b, 2.0));

        b.area = Some("Whitefield".to_string());
        assert!(!location_proximate(&a, &b, 2.0));
    }

    #[test]
    fn location_coordinates_use_radius() {
        let mut a = raw_event("a");
        a.location = Some(GeoPoint { lat: 12.9352, lng: 77.6245 });
        let mut b = raw_event("b");
        b.location = Some(GeoPoint { lat: 12.9360, lng: 77.6250 });
        assert!(location_proximate(&a, &b, 2.0), "~100m apart should be proximate");

        b.location = Some(GeoPoint { lat: 12.9698, lng: 77.7500 });
        assert!(!location_proximate(&a, &b, 2.0), "Koramangala to Whitefield is ~14km");
    }

    #[test]
    fn time_within_window_is_proximate() {
        let mut a = raw_event("a");
        a.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        let mut b = raw_event("b");
        b.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 13, 30, 0).unwrap());
        assert!(time_proximate(&a, &b, 4));

        b.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap());
        assert!(!time_proximate(&a, &b, 4));
    }

    #[test]
    fn time_unknown_is_permissive() {
        let mut a = raw_event("a");
        a.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        let b = raw_event("b");
        assert!(time_proximate(&a, &b, 4));
    }
}

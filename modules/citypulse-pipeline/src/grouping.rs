//! Deterministic first pass: partition a raw batch into coarse buckets by
//! category, area, and time window, so the clustering stage only compares
//! within-bucket pairs.
//!
//! Reports of one real event that land on opposite sides of an area or
//! window boundary are never compared. This is an accepted trade-off:
//! widening the windows multiplies comparison cost, so the window size is
//! a tunable instead.

use std::collections::HashMap;

use chrono::Timelike;
use citypulse_common::RawEvent;

pub const UNKNOWN_CATEGORY: &str = "UNKNOWN";
pub const UNKNOWN_AREA: &str = "unknown_area";
pub const UNKNOWN_TIME: &str = "unknown_time";

/// Geohash-5 cells are ~5km across — neighborhood scale.
const GEOHASH_PRECISION: usize = 5;

/// Normalize an area name for bucketing: trim, lowercase, whitespace → `_`.
pub fn normalize_area(area: &str) -> String {
    area.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Bucket key: `category|area|date_slot`. Total function — missing fields
/// fall back to sentinel components, nothing is ever rejected.
pub fn bucket_key(event: &RawEvent, window_hours: u32) -> String {
    let category = event
        .category
        .map(|c| c.to_string())
        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

    // Located-but-unnamed reports bucket by geohash cell instead of all
    // colliding in the unknown-area bucket.
    let area = match (&event.area, &event.location) {
        (Some(name), _) if !name.trim().is_empty() => normalize_area(name),
        (_, Some(loc)) => geohash::encode(
            geohash::Coord {
                x: loc.lng,
                y: loc.lat,
            },
            GEOHASH_PRECISION,
        )
        .unwrap_or_else(|_| UNKNOWN_AREA.to_string()),
        _ => UNKNOWN_AREA.to_string(),
    };

    let window = window_hours.max(1);
    let time = match event.timestamp {
        Some(ts) => format!("{}_{}", ts.format("%Y-%m-%d"), ts.hour() / window),
        None => UNKNOWN_TIME.to_string(),
    };

    format!("{category}|{area}|{time}")
}

/// Partition a batch into buckets. Deterministic, total, no errors.
pub fn group(events: Vec<RawEvent>, window_hours: u32) -> HashMap<String, Vec<RawEvent>> {
    let mut buckets: HashMap<String, Vec<RawEvent>> = HashMap::new();
    for event in events {
        let key = bucket_key(&event, window_hours);
        buckets.entry(key).or_default().push(event);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::raw_event;
    use chrono::{TimeZone, Utc};
    use citypulse_common::{EventCategory, GeoPoint};

    #[test]
    fn normalize_area_collapses_case_and_whitespace() {
        assert_eq!(normalize_area("  HSR  Layout "), "hsr_layout");
        assert_eq!(normalize_area("Koramangala"), "koramangala");
    }

    #[test]
    fn bucket_key_uses_two_hour_windows() {
        let mut e = raw_event("Signal failure at Marathahalli");
        e.category = Some(EventCategory::Traffic);
        e.area = Some("Marathahalli".to_string());
        e.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 15, 0).unwrap());
        assert_eq!(bucket_key(&e, 2), "TRAFFIC|marathahalli|2025-06-01_4");

        e.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 8, 5, 0).unwrap());
        assert_eq!(bucket_key(&e, 2), "TRAFFIC|marathahalli|2025-06-01_4");

        e.timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        assert_eq!(bucket_key(&e, 2), "TRAFFIC|marathahalli|2025-06-01_5");
    }

    #[test]
    fn bucket_key_missing_fields_use_sentinels() {
        let e = raw_event("Something happened");
        assert_eq!(bucket_key(&e, 2), "UNKNOWN|unknown_area|unknown_time");
    }

    #[test]
    fn bucket_key_coordinates_fall_back_to_geohash_cell() {
        let mut e = raw_event("Pothole");
        e.location = Some(GeoPoint {
            lat: 12.9352,
            lng: 77.6245,
        });
        let key = bucket_key(&e, 2);
        let area = key.split('|').nth(1).unwrap();
        assert_ne!(area, UNKNOWN_AREA);
        assert_eq!(area.len(), 5, "geohash-5 cell expected, got {area}");
    }

    #[test]
    fn group_partitions_by_key() {
        let mut a = raw_event("Jam at Silk Board");
        a.category = Some(EventCategory::Traffic);
        a.area = Some("BTM Layout".to_string());
        let mut b = raw_event("Another jam at Silk Board");
        b.category = Some(EventCategory::Traffic);
        b.area = Some("btm layout".to_string());
        let mut c = raw_event("Garbage pileup");
        c.category = Some(EventCategory::CivicIssue);
        c.area = Some("BTM Layout".to_string());

        let buckets = group(vec![a, b, c], 2);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets["TRAFFIC|btm_layout|unknown_time"].len(), 2);
        assert_eq!(buckets["CIVIC_ISSUE|btm_layout|unknown_time"].len(), 1);
    }

    #[test]
    fn group_is_total_over_malformed_input() {
        // No category, no area, no timestamp — still bucketed, never rejected.
        let events = vec![raw_event("???"), raw_event("!!!")];
        let buckets = group(events, 2);
        assert_eq!(buckets["UNKNOWN|unknown_area|unknown_time"].len(), 2);
    }
}

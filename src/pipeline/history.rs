//! Append-only series merge semantics.

use crate::models::observation::Observation;
use std::collections::HashMap;

/// Merge newly fetched observations into an existing series.
///
/// Deduplicates on `(date, dimension)` keeping the incoming value, so
/// re-ingesting a revised historical row supersedes the stale cached one.
/// The result is sorted by `(date, dimension)` for deterministic
/// downstream indexing; merging the same incoming batch twice is a no-op.
pub fn merge(existing: &[Observation], incoming: &[Observation]) -> Vec<Observation> {
    let mut by_key: HashMap<(String, Option<String>), Observation> =
        HashMap::with_capacity(existing.len() + incoming.len());

    for obs in existing.iter().chain(incoming.iter()) {
        by_key.insert(obs.key(), obs.clone());
    }

    let mut merged: Vec<Observation> = by_key.into_values().collect();
    merged.sort_by(|a, b| (&a.date, &a.dimension).cmp(&(&b.date, &b.dimension)));
    merged
}

/// Drop a trailing zero that looks like a non-final publication.
///
/// Upstream publishers sometimes emit a zero row before the real figure
/// for a period is finalized. When the final row is exactly zero while the
/// preceding `window` rows are predominantly non-zero with a median at or
/// above `min_median`, the zero is suppressed and a note returned.
pub fn suppress_trailing_placeholder(
    mut series: Vec<Observation>,
    window: usize,
    min_median: f64,
) -> (Vec<Observation>, Option<String>) {
    let Some(last) = series.last() else {
        return (series, None);
    };
    if last.value != 0.0 || series.len() < window + 1 {
        return (series, None);
    }

    let preceding = &series[series.len() - 1 - window..series.len() - 1];
    let non_zero = preceding.iter().filter(|o| o.value != 0.0).count();
    if non_zero * 2 <= preceding.len() {
        return (series, None);
    }

    let mut values: Vec<f64> = preceding.iter().map(|o| o.value).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if values.len() % 2 == 1 {
        values[values.len() / 2]
    } else {
        (values[values.len() / 2 - 1] + values[values.len() / 2]) / 2.0
    };
    if median < min_median {
        return (series, None);
    }

    let Some(dropped) = series.pop() else {
        return (series, None);
    };
    let note = format!(
        "dropped trailing zero for {}: preceding {} rows have median {:.1}, \
         treating the zero as a placeholder publication",
        dropped.date, window, median
    );
    (series, Some(note))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(date: &str, dimension: Option<&str>, value: f64, ingested_at: &str) -> Observation {
        Observation {
            date: date.to_string(),
            dimension: dimension.map(|d| d.to_string()),
            value,
            source_url: "https://example.gov/report.xlsx".to_string(),
            ingested_at_utc: ingested_at.to_string(),
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let existing = vec![
            obs("2024-10-05", None, 310.0, "t0"),
            obs("2024-10-12", None, 295.0, "t0"),
        ];
        let incoming = vec![obs("2024-10-12", None, 298.0, "t1")];

        let once = merge(&existing, &incoming);
        let twice = merge(&once, &incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_prefers_incoming_on_key_collision() {
        let existing = vec![obs("2024-10-12", None, 295.0, "t0")];
        let incoming = vec![obs("2024-10-12", None, 298.0, "t1")];

        let merged = merge(&existing, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, 298.0);
        assert_eq!(merged[0].ingested_at_utc, "t1");
    }

    #[test]
    fn merge_sorts_by_date_then_dimension() {
        let existing = vec![obs("2024-10-12", Some("UP:terminal_dwell_hours"), 24.0, "t0")];
        let incoming = vec![
            obs("2024-10-05", Some("UP:terminal_dwell_hours"), 23.5, "t1"),
            obs("2024-10-12", Some("BNSF:terminal_dwell_hours"), 22.0, "t1"),
        ];

        let merged = merge(&existing, &incoming);
        let keys: Vec<(String, Option<String>)> = merged.iter().map(|o| o.key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn merge_treats_dimensions_as_distinct_keys() {
        let existing = vec![obs("2024-10-12", Some("UP:terminal_dwell_hours"), 24.0, "t0")];
        let incoming = vec![obs("2024-10-12", Some("UP:train_speed_mph"), 21.8, "t1")];

        assert_eq!(merge(&existing, &incoming).len(), 2);
    }

    #[test]
    fn trailing_zero_after_healthy_run_is_suppressed() {
        let mut series: Vec<Observation> = (1..=7)
            .map(|week| obs(&format!("2024-09-{:02}", week * 4), None, 250.0 + week as f64, "t0"))
            .collect();
        series.push(obs("2024-10-05", None, 310.0, "t0"));
        series.push(obs("2024-10-12", None, 295.0, "t0"));
        series.push(obs("2024-10-19", None, 0.0, "t0"));

        let (kept, note) = suppress_trailing_placeholder(series, 7, 10.0);
        assert_eq!(kept.last().map(|o| o.value), Some(295.0));
        let note = note.expect("suppression note");
        assert!(note.contains("2024-10-19"));
    }

    #[test]
    fn genuine_zero_in_sparse_series_is_kept() {
        let series = vec![
            obs("2024-10-05", None, 0.0, "t0"),
            obs("2024-10-12", None, 0.0, "t0"),
            obs("2024-10-19", None, 5.0, "t0"),
            obs("2024-10-26", None, 0.0, "t0"),
        ];

        let (kept, note) = suppress_trailing_placeholder(series.clone(), 3, 10.0);
        assert_eq!(kept, series);
        assert!(note.is_none());
    }

    #[test]
    fn non_zero_tail_is_never_suppressed() {
        let series: Vec<Observation> = (1..=8)
            .map(|week| obs(&format!("2024-09-{:02}", week * 3), None, 300.0, "t0"))
            .collect();

        let (kept, note) = suppress_trailing_placeholder(series.clone(), 7, 10.0);
        assert_eq!(kept.len(), series.len());
        assert!(note.is_none());
    }

    #[test]
    fn short_series_is_left_alone() {
        let series = vec![
            obs("2024-10-05", None, 300.0, "t0"),
            obs("2024-10-12", None, 0.0, "t0"),
        ];

        let (kept, note) = suppress_trailing_placeholder(series, 7, 10.0);
        assert_eq!(kept.len(), 2);
        assert!(note.is_none());
    }
}

//! Fixed-lag deltas between two as-of lookups on one series.

use crate::analysis::asof::value_as_of;
use crate::models::observation::Observation;
use chrono::{Duration, NaiveDate};

/// `value_as_of(date) - value_as_of(date - lag_days)`.
///
/// A signal with no comparison point contributes no score rather than
/// blocking the composite, so an unavailable lookup on either side (or an
/// unparseable date) yields `0.0`.
pub fn delta(series: &[Observation], date: &str, lag_days: u32) -> f64 {
    let Ok(target) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return 0.0;
    };
    let lagged = (target - Duration::days(lag_days as i64))
        .format("%Y-%m-%d")
        .to_string();

    match (value_as_of(series, date), value_as_of(series, &lagged)) {
        (Some(current), Some(past)) => current - past,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(rows: &[(&str, f64)]) -> Vec<Observation> {
        rows.iter()
            .map(|(date, value)| Observation {
                date: date.to_string(),
                dimension: None,
                value: *value,
                source_url: String::new(),
                ingested_at_utc: String::new(),
            })
            .collect()
    }

    #[test]
    fn matches_the_two_as_of_lookups_exactly() {
        let s = series(&[
            ("2024-09-14", 20.0),
            ("2024-09-21", 21.0),
            ("2024-10-05", 24.0),
            ("2024-10-12", 26.5),
        ]);

        let d = delta(&s, "2024-10-12", 28);
        let expected = value_as_of(&s, "2024-10-12").unwrap() - value_as_of(&s, "2024-09-14").unwrap();
        assert_eq!(d, expected);
        assert_eq!(d, 6.5);
    }

    #[test]
    fn weekly_cadence_resolves_through_as_of() {
        // 2024-10-10 minus 7 days lands between weekly rows; as-of picks
        // the preceding publication on both sides.
        let s = series(&[("2024-09-28", 310.0), ("2024-10-05", 295.0)]);
        assert_eq!(delta(&s, "2024-10-10", 7), -15.0);
    }

    #[test]
    fn empty_series_is_neutral() {
        assert_eq!(delta(&[], "2024-10-12", 7), 0.0);
    }

    #[test]
    fn pre_history_window_is_neutral() {
        // Both lookups fall back to the earliest value, so the delta is 0.
        let s = series(&[("2024-10-05", 295.0)]);
        assert_eq!(delta(&s, "2023-01-01", 28), 0.0);
    }

    #[test]
    fn malformed_date_is_neutral() {
        let s = series(&[("2024-10-05", 295.0)]);
        assert_eq!(delta(&s, "last tuesday", 7), 0.0);
    }
}

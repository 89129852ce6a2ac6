use serde::{Deserialize, Serialize};

/// One reconciled reading of a source series.
///
/// `date` is a calendar day or ISO week-ending date (`YYYY-MM-DD`); the
/// format sorts lexicographically in chronological order, which the as-of
/// lookups rely on. `dimension` disambiguates co-located series: the site
/// key for river gauges, `"{carrier}:{metric}"` for rail, absent for barge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: String,
    pub dimension: Option<String>,
    pub value: f64,
    pub source_url: String,
    pub ingested_at_utc: String,
}

impl Observation {
    pub fn key(&self) -> (String, Option<String>) {
        (self.date.clone(), self.dimension.clone())
    }
}

/// Dimension string for one rail carrier/metric pair.
pub fn rail_dimension(carrier: &str, metric: &str) -> String {
    format!("{carrier}:{metric}")
}

/// Filter a mixed-dimension series down to a single dimension, preserving
/// date order.
pub fn filter_dimension(series: &[Observation], dimension: &str) -> Vec<Observation> {
    series
        .iter()
        .filter(|o| o.dimension.as_deref() == Some(dimension))
        .cloned()
        .collect()
}

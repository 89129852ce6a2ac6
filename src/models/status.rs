//! Typed views of the three per-signal status documents.
//!
//! Upstream publishers omit fields freely, so every field is optional and
//! consumers must handle absence. A document that fails to parse at all is
//! treated the same as a missing one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Downsampled series embedded in a status document for visualization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesBlock {
    pub n_points_raw: usize,
    pub n_points: usize,
    pub t_utc: Vec<String>,
    pub v: Vec<f64>,
}

/// Window summary of one river metric at one site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub latest_utc: Option<String>,
    pub latest_value: Option<f64>,
    pub earliest_utc: Option<String>,
    pub earliest_value: Option<f64>,
    pub delta_7d: Option<f64>,
    pub slope_per_day: Option<f64>,
    pub n_points: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_7d: Option<SeriesBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteStatus {
    pub site_no: Option<String>,
    pub label: Option<String>,
    pub gage_height_ft: Option<MetricSummary>,
    pub discharge_cfs: Option<MetricSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiverStatus {
    pub generated_at_utc: Option<String>,
    pub source_url: Option<String>,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteStatus>,
}

/// Latest value and 4-week delta of one rail metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: Option<f64>,
    pub delta_4w: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarrierMetrics {
    pub train_speed_mph: Option<MetricReading>,
    pub terminal_dwell_hours: Option<MetricReading>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarrierStatus {
    #[serde(default)]
    pub metrics: CarrierMetrics,
    pub week_end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RailStatus {
    pub generated_at_utc: Option<String>,
    pub source_url: Option<String>,
    #[serde(default)]
    pub carriers: BTreeMap<String, CarrierStatus>,
}

/// Locks 27 weekly throughput summary. `unit` is always `"barges"`; the
/// legacy tons rendition is migrated away at the settings layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockSummary {
    pub week_end_date: Option<String>,
    pub value: Option<f64>,
    pub delta_4w: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BargeStatus {
    pub generated_at_utc: Option<String>,
    pub source_url: Option<String>,
    pub locks_27: Option<LockSummary>,
}

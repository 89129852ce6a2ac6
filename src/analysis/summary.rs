//! Window summaries and downsampling for high-frequency gauge series.

use crate::models::status::{MetricSummary, SeriesBlock};
use chrono::{DateTime, SecondsFormat, Utc};

pub const MAX_SERIES_POINTS: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub t: DateTime<Utc>,
    pub v: f64,
}

fn iso_z(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Summarize a sorted point window: latest/earliest values, window delta,
/// per-day slope, point count. Empty windows have no summary.
pub fn summarize(points: &[Point]) -> Option<MetricSummary> {
    let latest = points.last()?;
    let earliest = points.first()?;
    let delta = latest.v - earliest.v;
    let days = ((latest.t - earliest.t).num_seconds() as f64 / 86_400.0).max(1e-9);

    Some(MetricSummary {
        latest_utc: Some(iso_z(latest.t)),
        latest_value: Some(latest.v),
        earliest_utc: Some(iso_z(earliest.t)),
        earliest_value: Some(earliest.v),
        delta_7d: Some(delta),
        slope_per_day: Some(delta / days),
        n_points: Some(points.len()),
        series_7d: None,
    })
}

/// Thin a series to at most `max_points` by index spacing, always keeping
/// the first and last points.
pub fn downsample(points: &[Point], max_points: usize) -> Vec<Point> {
    if points.len() <= max_points || max_points < 2 {
        return points.to_vec();
    }

    let step = (points.len() - 1) as f64 / (max_points - 1) as f64;
    let mut out = Vec::with_capacity(max_points);
    let mut last_idx = usize::MAX;
    for i in 0..max_points {
        let idx = ((i as f64 * step).round() as usize).min(points.len() - 1);
        if idx != last_idx {
            out.push(points[idx]);
            last_idx = idx;
        }
    }
    out
}

/// Downsampled series block for embedding in a status document.
pub fn build_series(points: &[Point], max_points: usize) -> SeriesBlock {
    let ds = downsample(points, max_points);
    SeriesBlock {
        n_points_raw: points.len(),
        n_points: ds.len(),
        t_utc: ds.iter().map(|p| iso_z(p.t)).collect(),
        v: ds.iter().map(|p| p.v).collect(),
    }
}

//! Wide-to-long reshape for the rail service sheet.
//!
//! The source publishes a pivoted layout: one row per railroad and measure,
//! one column per week-ending date. Melting turns that into long rows keyed
//! by `(carrier, metric, date)`, which are then pivoted back into one row
//! per `(date, carrier)` with one column per metric.

use crate::ingest::table::{norm_header, Frame};
use crate::ingest::FormatError;
use std::collections::BTreeMap;

pub const METRIC_TRAIN_SPEED: &str = "train_speed_mph";
pub const METRIC_TERMINAL_DWELL: &str = "terminal_dwell_hours";

/// Canonical rail row after reshape: one per `(week_end_date, carrier)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RailRow {
    pub week_end_date: String,
    pub carrier: String,
    pub train_speed_mph: Option<f64>,
    pub terminal_dwell_hours: Option<f64>,
}

/// Map a raw railroad/region label onto a canonical carrier code. Unmapped
/// labels are expected noise (system totals, shortline groupings) and their
/// rows are dropped silently.
pub fn map_carrier(raw: &str) -> Option<&'static str> {
    let upper = raw.trim().to_uppercase();
    if upper.contains("BNSF") {
        return Some("BNSF");
    }
    if upper.contains("UNION PACIFIC") || upper == "UP" || upper == "UPRR" {
        return Some("UP");
    }
    if upper.contains("NORFOLK SOUTHERN") || upper == "NS" {
        return Some("NS");
    }
    if upper.contains("CSX") {
        return Some("CSX");
    }
    if upper.contains("CANADIAN NATIONAL") || upper == "CN" {
        return Some("CN");
    }
    if upper.contains("CANADIAN PACIFIC") || upper.contains("KANSAS CITY SOUTHERN") || upper == "CPKC" {
        return Some("CPKC");
    }
    None
}

/// Substring-map a measure label onto a canonical metric name.
pub fn map_metric(raw: &str) -> Option<&'static str> {
    let measure = norm_header(raw);
    if measure.contains("train speed") {
        return Some(METRIC_TRAIN_SPEED);
    }
    if measure.contains("terminal dwell") {
        return Some(METRIC_TERMINAL_DWELL);
    }
    if measure.contains("dwell time") && measure.contains("terminal") {
        return Some(METRIC_TERMINAL_DWELL);
    }
    None
}

fn find_carrier_column(frame: &Frame) -> usize {
    for (col, header) in frame.headers.iter().enumerate() {
        let h = norm_header(header);
        if h.contains("railroad") || h.contains("region") {
            return col;
        }
    }
    0
}

fn find_measure_column(frame: &Frame) -> Result<usize, FormatError> {
    frame
        .headers
        .iter()
        .position(|header| norm_header(header).contains("measure"))
        .ok_or(FormatError::MeasureColumn)
}

fn find_week_columns(frame: &Frame) -> Result<Vec<(usize, String)>, FormatError> {
    let cols: Vec<(usize, String)> = frame
        .headers
        .iter()
        .enumerate()
        .filter_map(|(col, header)| {
            crate::ingest::table::parse_date(header)
                .map(|date| (col, date.format("%Y-%m-%d").to_string()))
        })
        .collect();

    if cols.is_empty() {
        return Err(FormatError::WeekColumns);
    }
    Ok(cols)
}

#[derive(Default)]
struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Melt a pivoted rail frame into canonical rows. Duplicate cells for the
/// same `(date, carrier, metric)` are aggregated by mean.
pub fn melt_wide(frame: &Frame) -> Result<Vec<RailRow>, FormatError> {
    let carrier_col = find_carrier_column(frame);
    let measure_col = find_measure_column(frame)?;
    let week_cols = find_week_columns(frame)?;

    let mut cells: BTreeMap<(String, String), (MeanAcc, MeanAcc)> = BTreeMap::new();

    for row in 0..frame.rows.len() {
        let Some(carrier) = map_carrier(&frame.cell(row, carrier_col).as_text()) else {
            continue;
        };
        let Some(metric) = map_metric(&frame.cell(row, measure_col).as_text()) else {
            continue;
        };

        for (col, date) in &week_cols {
            let Some(value) = frame.cell(row, *col).as_number() else {
                continue;
            };
            let entry = cells
                .entry((date.clone(), carrier.to_string()))
                .or_default();
            match metric {
                METRIC_TRAIN_SPEED => entry.0.push(value),
                _ => entry.1.push(value),
            }
        }
    }

    Ok(cells
        .into_iter()
        .map(|((week_end_date, carrier), (speed, dwell))| RailRow {
            week_end_date,
            carrier,
            train_speed_mph: speed.mean(),
            terminal_dwell_hours: dwell.mean(),
        })
        .collect())
}

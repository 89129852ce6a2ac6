//! USGS water-services JSON payload extraction.
//!
//! Both the instantaneous-values and daily-values endpoints share this
//! nesting: `value.timeSeries[].{sourceInfo, variable, values[].value[]}`.
//! Every field is optional; rows with missing or non-finite values are
//! dropped rather than defaulted.

use crate::analysis::summary::Point;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsPayload {
    pub value: Option<UsgsValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsValue {
    #[serde(rename = "timeSeries", default)]
    pub time_series: Vec<UsgsTimeSeries>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsTimeSeries {
    #[serde(rename = "sourceInfo", default)]
    pub source_info: UsgsSourceInfo,
    #[serde(default)]
    pub variable: UsgsVariable,
    #[serde(default)]
    pub values: Vec<UsgsValueBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsSourceInfo {
    #[serde(rename = "siteCode", default)]
    pub site_code: Vec<UsgsCode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsVariable {
    #[serde(rename = "variableCode", default)]
    pub variable_code: Vec<UsgsCode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsCode {
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsValueBlock {
    #[serde(default)]
    pub value: Vec<UsgsPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsPoint {
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    pub value: Option<String>,
}

pub fn parse_payload(raw: &str) -> Result<UsgsPayload, serde_json::Error> {
    serde_json::from_str(raw)
}

fn parse_usgs_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    // Daily-values timestamps come without an offset.
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc());
    }
    None
}

fn safe_float(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

fn matches_code(codes: &[UsgsCode], wanted: &str) -> bool {
    codes
        .first()
        .and_then(|c| c.value.as_deref())
        .map(|v| v == wanted)
        .unwrap_or(false)
}

/// Pull the sorted point series for one `(site, parameter)` pair out of a
/// payload. Missing series yield an empty vec, not an error.
pub fn extract_points(payload: &UsgsPayload, site_no: &str, parameter_cd: &str) -> Vec<Point> {
    let Some(value) = &payload.value else {
        return Vec::new();
    };

    let mut points = Vec::new();
    for ts in &value.time_series {
        if !matches_code(&ts.source_info.site_code, site_no) {
            continue;
        }
        if !matches_code(&ts.variable.variable_code, parameter_cd) {
            continue;
        }
        for block in &ts.values {
            for row in &block.value {
                let Some(t_raw) = row.date_time.as_deref() else {
                    continue;
                };
                let Some(t) = parse_usgs_time(t_raw) else {
                    continue;
                };
                let Some(v) = row.value.as_deref().and_then(safe_float) else {
                    continue;
                };
                points.push(Point { t, v });
            }
        }
    }

    points.sort_by_key(|p| p.t);
    points
}

/// Collapse one `(site, parameter)` series to one value per calendar day,
/// keeping the last reading of each day. Days are keyed by the source's
/// local timestamp prefix, matching how the publisher dates its rows.
/// Returns `(YYYY-MM-DD, value)` rows in date order.
pub fn extract_daily(payload: &UsgsPayload, site_no: &str, parameter_cd: &str) -> Vec<(String, f64)> {
    let Some(value) = &payload.value else {
        return Vec::new();
    };

    let mut by_day: HashMap<String, f64> = HashMap::new();
    for ts in &value.time_series {
        if !matches_code(&ts.source_info.site_code, site_no) {
            continue;
        }
        if !matches_code(&ts.variable.variable_code, parameter_cd) {
            continue;
        }
        for block in &ts.values {
            for row in &block.value {
                let Some(t_raw) = row.date_time.as_deref() else {
                    continue;
                };
                if t_raw.len() < 10 {
                    continue;
                }
                let Some(v) = row.value.as_deref().and_then(safe_float) else {
                    continue;
                };
                by_day.insert(t_raw[..10].to_string(), v);
            }
        }
    }

    let mut out: Vec<(String, f64)> = by_day.into_iter().collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

//! Ingestion-then-score orchestration.
//!
//! Each signal's ingestion runs to completion on its own and fails in
//! isolation: a malformed rail sheet aborts the rail run with a diagnostic
//! naming the failed detection step, but never blocks scoring with the
//! other signals. Runs are short-lived, synchronous batch jobs; the single
//! on-disk database is read fully, merged in memory, and rewritten fully.

use crate::analysis::backfill::{reconstruct, SignalHistories};
use crate::analysis::scorer::{score, SignalFeatures};
use crate::ingest::melt::METRIC_TERMINAL_DWELL;
use crate::ingest::usgs;
use crate::models::observation::{filter_dimension, rail_dimension};
use crate::models::risk::{RiskHistoryRow, RiskSnapshot};
use crate::models::status::{BargeStatus, RailStatus, RiverStatus};
use crate::pipeline::settings::EffectiveSettings;
use crate::pipeline::{db, history, signals, snapshot};
use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub signal: &'static str,
    pub merged_rows: usize,
    pub note: Option<String>,
}

pub fn ingest_river(
    conn: &Connection,
    settings: &EffectiveSettings,
    payload_raw: &str,
    source_url: &str,
    now_utc: &str,
) -> Result<IngestReport, String> {
    let payload = usgs::parse_payload(payload_raw)
        .map_err(|e| format!("river: malformed USGS payload: {e}"))?;

    let incoming = signals::normalize_river(&payload, source_url, now_utc);
    let existing = db::load_series(conn, signals::SIGNAL_RIVER)
        .map_err(|e| format!("river: DB read error: {e}"))?;
    let merged = history::merge(&existing, &incoming);
    db::replace_signal(conn, signals::SIGNAL_RIVER, &merged)
        .map_err(|e| format!("river: DB write error: {e}"))?;

    let status =
        signals::build_river_status(&payload, source_url, now_utc, settings.max_series_points);
    snapshot::write_json_if_changed(&settings.river_status_file, &status)?;

    log::info!("river: merged {} observations", merged.len());
    Ok(IngestReport {
        signal: signals::SIGNAL_RIVER,
        merged_rows: merged.len(),
        note: None,
    })
}

pub fn ingest_rail(
    conn: &Connection,
    settings: &EffectiveSettings,
    sheet_bytes: &[u8],
    source_url: &str,
    now_utc: &str,
) -> Result<IngestReport, String> {
    let incoming = signals::normalize_rail(sheet_bytes, source_url, now_utc)
        .map_err(|e| format!("rail: {e}"))?;
    let existing = db::load_series(conn, signals::SIGNAL_RAIL)
        .map_err(|e| format!("rail: DB read error: {e}"))?;
    let merged = history::merge(&existing, &incoming);
    db::replace_signal(conn, signals::SIGNAL_RAIL, &merged)
        .map_err(|e| format!("rail: DB write error: {e}"))?;

    let status = signals::build_rail_status(&merged, &settings.lags, source_url, now_utc);
    snapshot::write_json_if_changed(&settings.rail_status_file, &status)?;

    log::info!("rail: merged {} observations", merged.len());
    Ok(IngestReport {
        signal: signals::SIGNAL_RAIL,
        merged_rows: merged.len(),
        note: None,
    })
}

pub fn ingest_barge(
    conn: &Connection,
    settings: &EffectiveSettings,
    sheet_bytes: &[u8],
    source_url: &str,
    now_utc: &str,
) -> Result<IngestReport, String> {
    let incoming = signals::normalize_barge(sheet_bytes, source_url, now_utc)
        .map_err(|e| format!("barge: {e}"))?;
    let existing = db::load_series(conn, signals::SIGNAL_BARGE)
        .map_err(|e| format!("barge: DB read error: {e}"))?;
    let mut merged = history::merge(&existing, &incoming);

    let mut note = None;
    if settings.placeholder_suppression {
        let (kept, suppression_note) = history::suppress_trailing_placeholder(
            merged,
            settings.placeholder_window_rows,
            settings.placeholder_min_median,
        );
        merged = kept;
        if let Some(text) = &suppression_note {
            log::warn!("barge: {text}");
        }
        note = suppression_note;
    }

    db::replace_signal(conn, signals::SIGNAL_BARGE, &merged)
        .map_err(|e| format!("barge: DB write error: {e}"))?;

    let status = signals::build_barge_status(&merged, &settings.lags, source_url, now_utc);
    snapshot::write_json_if_changed(&settings.barge_status_file, &status)?;

    log::info!("barge: merged {} observations", merged.len());
    Ok(IngestReport {
        signal: signals::SIGNAL_BARGE,
        merged_rows: merged.len(),
        note,
    })
}

/// Read one status document, treating a missing or malformed file the same
/// way: that signal is absent this run.
fn load_status<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(doc) => Some(doc),
        Err(e) => {
            log::warn!("ignoring malformed status document {}: {e}", path.display());
            None
        }
    }
}

/// Feature extraction from the status documents, degrading per signal: a
/// missing document leaves that driver's features absent rather than
/// failing the composite.
pub fn features_from_status(
    river: Option<&RiverStatus>,
    rail: Option<&RailStatus>,
    barge: Option<&BargeStatus>,
    settings: &EffectiveSettings,
) -> SignalFeatures {
    let mut features = SignalFeatures::default();

    if let Some(gh) = river
        .and_then(|doc| doc.sites.get(&settings.river_site))
        .and_then(|site| site.gage_height_ft.as_ref())
    {
        features.river_stage_ft = gh.latest_value;
        features.river_delta_7d_ft = Some(gh.delta_7d.unwrap_or(0.0));
    }

    if let Some(dwell) = rail
        .and_then(|doc| doc.carriers.get(&settings.rail_carrier))
        .and_then(|carrier| carrier.metrics.terminal_dwell_hours.as_ref())
    {
        features.rail_dwell_delta_4w_hours = Some(dwell.delta_4w.unwrap_or(0.0));
    }

    if let Some(locks) = barge.and_then(|doc| doc.locks_27.as_ref()) {
        features.barge_delta_4w_count = Some(locks.delta_4w.unwrap_or(0.0));
    }

    features
}

/// Score the latest status documents, write the snapshot when its content
/// changed, and upsert today's row in the risk history.
pub fn score_live(
    conn: &Connection,
    settings: &EffectiveSettings,
    now_utc: &str,
) -> Result<RiskSnapshot, String> {
    let river: Option<RiverStatus> = load_status(&settings.river_status_file);
    let rail: Option<RailStatus> = load_status(&settings.rail_status_file);
    let barge: Option<BargeStatus> = load_status(&settings.barge_status_file);

    let features = features_from_status(river.as_ref(), rail.as_ref(), barge.as_ref(), settings);
    let breakdown = score(&features, &settings.thresholds);

    let result = RiskSnapshot {
        generated_at_utc: now_utc.to_string(),
        risk_score: breakdown.risk_score,
        risk_level: breakdown.risk_level,
        primary_driver: breakdown.primary_driver,
        drivers: breakdown.drivers,
    };

    let changed = snapshot::write_snapshot(&settings.snapshot_file, &result)?;
    if changed {
        log::info!(
            "risk score updated: {} ({}) driver {}",
            result.risk_score,
            result.risk_level.as_str(),
            result.primary_driver
        );
    } else {
        log::info!("risk score unchanged: {}", result.risk_score);
    }

    db::upsert_risk_row(
        conn,
        &RiskHistoryRow {
            timestamp_utc: now_utc.to_string(),
            risk_score: result.risk_score,
            risk_level: result.risk_level,
            primary_driver: result.primary_driver.clone(),
        },
    )
    .map_err(|e| format!("risk history upsert error: {e}"))?;

    Ok(result)
}

/// Re-derive the daily risk table for the trailing window and overwrite it
/// in full.
pub fn run_backfill(
    conn: &Connection,
    settings: &EffectiveSettings,
    today: NaiveDate,
) -> Result<usize, String> {
    let river_all = db::load_series(conn, signals::SIGNAL_RIVER)
        .map_err(|e| format!("river: DB read error: {e}"))?;
    let rail_all = db::load_series(conn, signals::SIGNAL_RAIL)
        .map_err(|e| format!("rail: DB read error: {e}"))?;
    let barge = db::load_series(conn, signals::SIGNAL_BARGE)
        .map_err(|e| format!("barge: DB read error: {e}"))?;

    let histories = SignalHistories {
        river: filter_dimension(&river_all, &settings.river_site),
        rail_dwell: filter_dimension(
            &rail_all,
            &rail_dimension(&settings.rail_carrier, METRIC_TERMINAL_DWELL),
        ),
        barge,
    };

    let rows = reconstruct(
        &histories,
        settings.backfill_days,
        today,
        &settings.lags,
        &settings.thresholds,
    );
    db::replace_risk_history(conn, &rows)
        .map_err(|e| format!("risk history rewrite error: {e}"))?;

    log::info!("backfill reconstructed {} daily rows", rows.len());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::status::{LockSummary, MetricSummary, SiteStatus};

    fn settings() -> EffectiveSettings {
        EffectiveSettings::default()
    }

    fn river_doc(latest: f64, delta: f64) -> RiverStatus {
        let mut doc = RiverStatus::default();
        doc.sites.insert(
            "st_louis_mo".to_string(),
            SiteStatus {
                gage_height_ft: Some(MetricSummary {
                    latest_value: Some(latest),
                    delta_7d: Some(delta),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        doc
    }

    #[test]
    fn features_degrade_per_missing_document() {
        let features = features_from_status(None, None, None, &settings());

        assert!(features.river_stage_ft.is_none());
        assert!(features.river_delta_7d_ft.is_none());
        assert!(features.rail_dwell_delta_4w_hours.is_none());
        assert!(features.barge_delta_4w_count.is_none());
    }

    #[test]
    fn river_features_come_from_the_configured_site() {
        let doc = river_doc(-0.5, -3.0);
        let features = features_from_status(Some(&doc), None, None, &settings());

        assert_eq!(features.river_stage_ft, Some(-0.5));
        assert_eq!(features.river_delta_7d_ft, Some(-3.0));
    }

    #[test]
    fn missing_optional_fields_default_to_neutral_deltas() {
        let mut barge = BargeStatus::default();
        barge.locks_27 = Some(LockSummary::default());
        let features = features_from_status(None, None, Some(&barge), &settings());

        assert_eq!(features.barge_delta_4w_count, Some(0.0));
    }
}

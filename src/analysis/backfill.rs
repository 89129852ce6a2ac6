//! Historical risk reconstruction.
//!
//! Replays the scorer over a trailing window of calendar days, deriving
//! each day's features from the as-of state of the full history rather
//! than from previously stored scores.

use crate::analysis::asof::value_as_of;
use crate::analysis::delta::delta;
use crate::analysis::scorer::{score, SignalFeatures, Thresholds};
use crate::models::observation::Observation;
use crate::models::risk::RiskHistoryRow;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Metric-specific comparison lags, in days. River publishes daily, so a
/// week is enough; rail and barge are weekly series compared to their
/// 4-week-prior values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Lags {
    pub river_days: u32,
    pub rail_days: u32,
    pub barge_days: u32,
}

impl Default for Lags {
    fn default() -> Self {
        Lags {
            river_days: 7,
            rail_days: 28,
            barge_days: 28,
        }
    }
}

/// Single-dimension histories for the three scored signals.
#[derive(Debug, Clone, Default)]
pub struct SignalHistories {
    pub river: Vec<Observation>,
    pub rail_dwell: Vec<Observation>,
    pub barge: Vec<Observation>,
}

/// Features for one calendar day, derived purely from as-of lookups.
pub fn features_as_of(histories: &SignalHistories, date: &str, lags: &Lags) -> SignalFeatures {
    SignalFeatures {
        river_stage_ft: value_as_of(&histories.river, date),
        river_delta_7d_ft: Some(delta(&histories.river, date, lags.river_days)),
        rail_dwell_delta_4w_hours: Some(delta(&histories.rail_dwell, date, lags.rail_days)),
        barge_delta_4w_count: Some(delta(&histories.barge, date, lags.barge_days)),
    }
}

/// One row per day in `[today - days_back, today - 1]`, ascending. Today is
/// excluded: the live path owns today's row, and two disagreeing rows for
/// the same day must never coexist.
pub fn reconstruct(
    histories: &SignalHistories,
    days_back: u32,
    today: NaiveDate,
    lags: &Lags,
    thresholds: &Thresholds,
) -> Vec<RiskHistoryRow> {
    let mut rows = Vec::with_capacity(days_back as usize);

    for offset in (1..=i64::from(days_back)).rev() {
        let day = today - Duration::days(offset);
        let date = day.format("%Y-%m-%d").to_string();

        let features = features_as_of(histories, &date, lags);
        let breakdown = score(&features, thresholds);

        rows.push(RiskHistoryRow {
            timestamp_utc: format!("{date}T12:00:00Z"),
            risk_score: breakdown.risk_score,
            risk_level: breakdown.risk_level,
            primary_driver: breakdown.primary_driver,
        });
    }

    rows
}

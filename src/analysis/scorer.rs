//! Composite risk scoring over per-signal features.
//!
//! The rules are fixed threshold checks, not learned weights. River rules
//! are independent and additive; rail and barge are mutually exclusive
//! tiers evaluated highest-threshold-first. The function is pure: identical
//! inputs always produce identical output, and the caller attaches the
//! generation timestamp.

use crate::models::risk::{DriverScore, RiskLevel};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Threshold constants, configurable through settings. Defaults follow the
/// calibrated count-based barge scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// 7-day stage delta below this many feet marks a fast drop.
    pub river_drop_ft: f64,
    /// Latest stage below this marks gauge-zero low water.
    pub river_low_stage_ft: f64,
    /// 28-day dwell delta above this many hours is a major slowdown.
    pub rail_dwell_major_hours: f64,
    /// 28-day dwell delta above this many hours is a warning.
    pub rail_dwell_warn_hours: f64,
    /// 28-day lock-count delta below this is a major capacity loss.
    pub barge_drop_major: f64,
    /// 28-day lock-count delta below this is a warning.
    pub barge_drop_warn: f64,
    /// Composite strictly above this is CRITICAL.
    pub level_critical: f64,
    /// Composite strictly above this is MODERATE.
    pub level_moderate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            river_drop_ft: -2.0,
            river_low_stage_ft: 0.0,
            rail_dwell_major_hours: 2.0,
            rail_dwell_warn_hours: 0.5,
            barge_drop_major: -50.0,
            barge_drop_warn: -20.0,
            level_critical: 70.0,
            level_moderate: 40.0,
        }
    }
}

/// Per-signal inputs to one scoring run. `None` means the source was
/// unavailable this run; deltas from an available source default to 0.0
/// upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalFeatures {
    pub river_stage_ft: Option<f64>,
    pub river_delta_7d_ft: Option<f64>,
    pub rail_dwell_delta_4w_hours: Option<f64>,
    pub barge_delta_4w_count: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub primary_driver: String,
    pub drivers: Vec<DriverScore>,
}

pub fn score(features: &SignalFeatures, t: &Thresholds) -> ScoreBreakdown {
    let mut drivers = Vec::with_capacity(3);

    // River: a fast drop strains loading drafts, and a stage below gauge
    // zero triggers draft restrictions. Both can hold at once and add.
    let river_delta = features.river_delta_7d_ft.unwrap_or(0.0);
    let mut river_score = 0.0;
    if river_delta < t.river_drop_ft {
        river_score += 20.0;
    }
    if let Some(stage) = features.river_stage_ft {
        if stage < t.river_low_stage_ft {
            river_score += 20.0;
        }
    }
    drivers.push(DriverScore {
        name: "river".to_string(),
        score: river_score,
        raw: json!({
            "delta_7d_ft": features.river_delta_7d_ft,
            "latest_stage_ft": features.river_stage_ft,
        }),
    });

    // Rail: rising terminal dwell is the classic congestion signal.
    let rail_delta = features.rail_dwell_delta_4w_hours.unwrap_or(0.0);
    let rail_score = if rail_delta > t.rail_dwell_major_hours {
        30.0
    } else if rail_delta > t.rail_dwell_warn_hours {
        15.0
    } else {
        0.0
    };
    drivers.push(DriverScore {
        name: "rail".to_string(),
        score: rail_score,
        raw: json!({
            "dwell_delta_4w_hours": features.rail_dwell_delta_4w_hours,
        }),
    });

    // Barge: a 50-barge weekly drop is roughly 15-20% of Locks 27 capacity.
    let barge_delta = features.barge_delta_4w_count.unwrap_or(0.0);
    let barge_score = if barge_delta < t.barge_drop_major {
        30.0
    } else if barge_delta < t.barge_drop_warn {
        15.0
    } else {
        0.0
    };
    drivers.push(DriverScore {
        name: "barge".to_string(),
        score: barge_score,
        raw: json!({
            "locks27_delta_4w_count": features.barge_delta_4w_count,
        }),
    });

    let risk_score = clamp(river_score + rail_score + barge_score, 0.0, 100.0);

    let risk_level = if risk_score > t.level_critical {
        RiskLevel::Critical
    } else if risk_score > t.level_moderate {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    };

    ScoreBreakdown {
        risk_score,
        risk_level,
        primary_driver: primary_driver(&drivers),
        drivers,
    }
}

fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// First strict maximum in evaluation order; `"none"` when nothing scored.
fn primary_driver(drivers: &[DriverScore]) -> String {
    let mut primary = "none";
    let mut best = 0.0;
    for driver in drivers {
        if driver.score > best {
            best = driver.score;
            primary = &driver.name;
        }
    }
    primary.to_string()
}

//! On-disk settings with schema migration and sanitized typed extraction.
//!
//! Every threshold, lag, and file path the pipeline uses lives here;
//! components receive the typed view explicitly, so unit tests never
//! depend on the environment.

use crate::analysis::backfill::Lags;
use crate::analysis::scorer::Thresholds;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 2;

/// Typed view of the settings file, extracted after migration and
/// sanitization.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub database_file: PathBuf,
    pub snapshot_file: PathBuf,
    pub river_status_file: PathBuf,
    pub rail_status_file: PathBuf,
    pub barge_status_file: PathBuf,
    pub backfill_days: u32,
    pub lags: Lags,
    pub thresholds: Thresholds,
    pub placeholder_suppression: bool,
    pub placeholder_window_rows: usize,
    pub placeholder_min_median: f64,
    pub rail_carrier: String,
    pub river_site: String,
    pub river_site_no: String,
    pub max_series_points: usize,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        effective_from_value(&default_settings())
    }
}

pub fn load_effective_settings(path: &Path) -> Result<EffectiveSettings, String> {
    let settings = load_settings_from_disk(path)?;
    Ok(effective_from_value(&settings))
}

pub fn load_settings_from_disk(path: &Path) -> Result<Value, String> {
    let original = if path.exists() {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| json!({}))
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(path: &Path, settings: Value) -> Result<Value, String> {
    let mut merged = load_settings_from_disk(path).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(path, &migrated)?;
    Ok(migrated)
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "databaseFile": "data/freightlens.db",
        "snapshotFile": "data/composite_risk_score.json",
        "statusFiles": {
            "river": "data/river_status.json",
            "rail": "data/rail_status.json",
            "barge": "data/barge_status.json"
        },
        "backfillDays": 90,
        "lags": {"riverDays": 7, "railDays": 28, "bargeDays": 28},
        "thresholds": {
            "riverDropFt": -2.0,
            "riverLowStageFt": 0.0,
            "railDwellMajorHours": 2.0,
            "railDwellWarnHours": 0.5,
            "bargeDropMajor": -50.0,
            "bargeDropWarn": -20.0
        },
        "levels": {"moderate": 40.0, "critical": 70.0},
        "placeholderSuppression": {"enabled": true, "windowRows": 7, "minMedian": 10.0},
        "railCarrier": "UP",
        "riverSite": "st_louis_mo",
        "riverSiteNo": "07010000",
        "maxSeriesPoints": 96
    })
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    deep_merge_defaults(&mut out, &defaults);

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 2 {
        // V1 configs carried ton-scale barge thresholds; the source series
        // switched to barge counts, so the old constants are three orders
        // of magnitude off.
        migrate_barge_thresholds_from_tons(&mut out);
    }

    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn migrate_barge_thresholds_from_tons(settings: &mut Value) {
    let Some(thresholds) = settings.get_mut("thresholds").and_then(Value::as_object_mut) else {
        return;
    };

    for key in ["bargeDropMajor", "bargeDropWarn"] {
        if let Some(v) = thresholds.get(key).and_then(Value::as_f64) {
            if v.abs() > 1000.0 {
                thresholds.insert(key.to_string(), json!(v / 1000.0));
            }
        }
    }
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "backfillDays", 7, 365, 90);
    clamp_u64(obj, "maxSeriesPoints", 10, 500, 96);

    if let Some(lags) = obj.get_mut("lags").and_then(Value::as_object_mut) {
        clamp_u64(lags, "riverDays", 1, 90, 7);
        clamp_u64(lags, "railDays", 1, 90, 28);
        clamp_u64(lags, "bargeDays", 1, 90, 28);
    }

    if let Some(suppression) = obj
        .get_mut("placeholderSuppression")
        .and_then(Value::as_object_mut)
    {
        ensure_bool(suppression, "enabled", true);
        // The heuristic is only meaningful over a short recent window.
        clamp_u64(suppression, "windowRows", 5, 8, 7);
        let median = suppression
            .get("minMedian")
            .and_then(Value::as_f64)
            .unwrap_or(10.0);
        suppression.insert("minMedian".to_string(), json!(median.max(0.0)));
    }

    if let Some(carrier) = obj.get("railCarrier").and_then(Value::as_str) {
        let upper = carrier.trim().to_uppercase();
        obj.insert("railCarrier".to_string(), json!(upper));
    }
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}

fn f64_at(settings: &Value, group: &str, key: &str, default: f64) -> f64 {
    settings
        .get(group)
        .and_then(|g| g.get(key))
        .and_then(Value::as_f64)
        .unwrap_or(default)
}

fn path_at(settings: &Value, key: &str, default: &str) -> PathBuf {
    PathBuf::from(
        settings
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default),
    )
}

fn effective_from_value(settings: &Value) -> EffectiveSettings {
    let status = settings.get("statusFiles").cloned().unwrap_or(json!({}));
    let defaults = Thresholds::default();

    EffectiveSettings {
        database_file: path_at(settings, "databaseFile", "data/freightlens.db"),
        snapshot_file: path_at(settings, "snapshotFile", "data/composite_risk_score.json"),
        river_status_file: path_at(&status, "river", "data/river_status.json"),
        rail_status_file: path_at(&status, "rail", "data/rail_status.json"),
        barge_status_file: path_at(&status, "barge", "data/barge_status.json"),
        backfill_days: settings
            .get("backfillDays")
            .and_then(Value::as_u64)
            .unwrap_or(90)
            .clamp(7, 365) as u32,
        lags: Lags {
            river_days: f64_at(settings, "lags", "riverDays", 7.0) as u32,
            rail_days: f64_at(settings, "lags", "railDays", 28.0) as u32,
            barge_days: f64_at(settings, "lags", "bargeDays", 28.0) as u32,
        },
        thresholds: Thresholds {
            river_drop_ft: f64_at(settings, "thresholds", "riverDropFt", defaults.river_drop_ft),
            river_low_stage_ft: f64_at(
                settings,
                "thresholds",
                "riverLowStageFt",
                defaults.river_low_stage_ft,
            ),
            rail_dwell_major_hours: f64_at(
                settings,
                "thresholds",
                "railDwellMajorHours",
                defaults.rail_dwell_major_hours,
            ),
            rail_dwell_warn_hours: f64_at(
                settings,
                "thresholds",
                "railDwellWarnHours",
                defaults.rail_dwell_warn_hours,
            ),
            barge_drop_major: f64_at(settings, "thresholds", "bargeDropMajor", defaults.barge_drop_major),
            barge_drop_warn: f64_at(settings, "thresholds", "bargeDropWarn", defaults.barge_drop_warn),
            level_critical: f64_at(settings, "levels", "critical", defaults.level_critical),
            level_moderate: f64_at(settings, "levels", "moderate", defaults.level_moderate),
        },
        placeholder_suppression: settings
            .get("placeholderSuppression")
            .and_then(|s| s.get("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(true),
        placeholder_window_rows: f64_at(settings, "placeholderSuppression", "windowRows", 7.0)
            as usize,
        placeholder_min_median: f64_at(settings, "placeholderSuppression", "minMedian", 10.0),
        rail_carrier: settings
            .get("railCarrier")
            .and_then(Value::as_str)
            .unwrap_or("UP")
            .to_string(),
        river_site: settings
            .get("riverSite")
            .and_then(Value::as_str)
            .unwrap_or("st_louis_mo")
            .to_string(),
        river_site_no: settings
            .get("riverSiteNo")
            .and_then(Value::as_str)
            .unwrap_or("07010000")
            .to_string(),
        max_series_points: settings
            .get("maxSeriesPoints")
            .and_then(Value::as_u64)
            .unwrap_or(96) as usize,
    }
}

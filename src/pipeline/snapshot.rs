//! Content-idempotent JSON document writes.

use crate::models::risk::RiskSnapshot;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Write `value` as pretty JSON, skipping the write when the file already
/// holds identical content. Returns whether anything was written.
pub fn write_json_if_changed<T: Serialize>(path: &Path, value: &T) -> Result<bool, String> {
    let new_text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize {}: {e}", path.display()))?;

    if path.exists() {
        let old_text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        if old_text == new_text {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
    }
    fs::write(path, new_text).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
    Ok(true)
}

pub fn write_snapshot(path: &Path, snapshot: &RiskSnapshot) -> Result<bool, String> {
    write_json_if_changed(path, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::risk::RiskLevel;

    fn snapshot(score: f64, generated_at: &str) -> RiskSnapshot {
        RiskSnapshot {
            generated_at_utc: generated_at.to_string(),
            risk_score: score,
            risk_level: RiskLevel::Low,
            primary_driver: "none".to_string(),
            drivers: Vec::new(),
        }
    }

    #[test]
    fn first_write_creates_parent_dirs_and_reports_changed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("data").join("composite_risk_score.json");

        let changed = write_snapshot(&path, &snapshot(0.0, "t0")).expect("write snapshot");
        assert!(changed);
        assert!(path.exists());
    }

    #[test]
    fn identical_content_is_not_rewritten() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("composite_risk_score.json");

        assert!(write_snapshot(&path, &snapshot(20.0, "t0")).expect("first write"));
        assert!(!write_snapshot(&path, &snapshot(20.0, "t0")).expect("second write"));
    }

    #[test]
    fn changed_content_is_rewritten() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("composite_risk_score.json");

        assert!(write_snapshot(&path, &snapshot(20.0, "t0")).expect("first write"));
        assert!(write_snapshot(&path, &snapshot(35.0, "t1")).expect("second write"));

        let raw = fs::read_to_string(&path).expect("read back");
        let parsed: RiskSnapshot = serde_json::from_str(&raw).expect("parse back");
        assert_eq!(parsed.risk_score, 35.0);
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse(raw: &str) -> Option<RiskLevel> {
        match raw {
            "LOW" => Some(RiskLevel::Low),
            "MODERATE" => Some(RiskLevel::Moderate),
            "CRITICAL" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

/// Per-driver contribution to the composite score. `raw` carries the inputs
/// that produced the score; fields are null when the source was unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverScore {
    pub name: String,
    pub score: f64,
    pub raw: serde_json::Value,
}

/// Latest scoring state, written as pretty JSON only when its content
/// differs from the file already on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub generated_at_utc: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub primary_driver: String,
    pub drivers: Vec<DriverScore>,
}

/// One row of the long-lived daily risk table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskHistoryRow {
    pub timestamp_utc: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub primary_driver: String,
}

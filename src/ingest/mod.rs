pub mod detect;
pub mod melt;
pub mod table;
pub mod usgs;

use thiserror::Error;

/// Tabular auto-detection failures. These must propagate: scoring on a
/// misdetected column is worse than failing loudly, so no variant is ever
/// silently defaulted. The pipeline layer prefixes the failing signal name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("no usable header row: table is empty after dropping blank rows and columns")]
    HeaderRow,
    #[error("no usable date column above the confidence floor")]
    DateColumn,
    #[error("no usable numeric value column above the confidence floor")]
    ValueColumn,
    #[error("missing measure column, cannot map metrics")]
    MeasureColumn,
    #[error("no week date columns found among the headers")]
    WeekColumns,
    #[error("csv parse failure: {0}")]
    Csv(String),
}

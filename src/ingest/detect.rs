//! Header, date-column, and value-column auto-detection.
//!
//! Detection is vote-based over a bounded sample of rows. Columns must clear
//! a minimum hit count before they are trusted; anything below the floor is
//! a `FormatError`, not a guess.

use crate::ingest::table::{norm_header, Frame, Table};
use crate::ingest::FormatError;

/// How far down a sheet the header scan looks.
pub const HEADER_SCAN_ROWS: usize = 50;
/// How many body rows each column is sampled over.
pub const SAMPLE_ROWS: usize = 120;
/// Minimum successful parses before a detected column is trusted.
pub const MIN_PARSE_HITS: usize = 5;

const HEADER_VOCABULARY: &[&str] = &["date", "week", "ending"];

/// Scan the first rows for one that reads like a header: at least two text
/// cells whose normalized join mentions a vocabulary token. First hit wins;
/// a sheet with no qualifying row keeps row 0.
pub fn choose_header_row(table: &Table) -> usize {
    for (i, row) in table.rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let strings: Vec<String> = row
            .iter()
            .filter(|c| c.is_text())
            .map(|c| norm_header(&c.as_text()))
            .collect();
        if strings.len() < 2 {
            continue;
        }
        let blob = strings.join(" ");
        if HEADER_VOCABULARY.iter().any(|token| blob.contains(token)) {
            return i;
        }
    }
    0
}

/// Pick the column with the most date parses over the sample. Fails when
/// the best column has fewer than `MIN_PARSE_HITS` hits.
pub fn detect_date_column(frame: &Frame) -> Result<usize, FormatError> {
    let sample = frame.rows.len().min(SAMPLE_ROWS);
    let mut best: Option<usize> = None;
    let mut best_hits = 0usize;

    for col in 0..frame.column_count() {
        let hits = (0..sample)
            .filter(|&row| frame.cell(row, col).as_date().is_some())
            .count();
        if hits > best_hits {
            best_hits = hits;
            best = Some(col);
        }
    }

    match best {
        Some(col) if best_hits >= MIN_PARSE_HITS => Ok(col),
        _ => Err(FormatError::DateColumn),
    }
}

/// Prefer a non-date column whose header mentions `total`; fall back to the
/// non-date column with the most numeric parses, subject to the same floor.
pub fn detect_value_column(frame: &Frame, date_col: usize) -> Result<usize, FormatError> {
    for (col, header) in frame.headers.iter().enumerate() {
        if col == date_col {
            continue;
        }
        if norm_header(header).contains("total") {
            return Ok(col);
        }
    }

    let sample = frame.rows.len().min(SAMPLE_ROWS);
    let mut best: Option<usize> = None;
    let mut best_hits = 0usize;

    for col in 0..frame.column_count() {
        if col == date_col {
            continue;
        }
        let hits = (0..sample)
            .filter(|&row| frame.cell(row, col).as_number().is_some())
            .count();
        if hits > best_hits {
            best_hits = hits;
            best = Some(col);
        }
    }

    match best {
        Some(col) if best_hits >= MIN_PARSE_HITS => Ok(col),
        _ => Err(FormatError::ValueColumn),
    }
}

/// Extract `(date, value)` rows from the detected columns. Rows failing
/// either parse are dropped.
pub fn extract_keyed_rows(frame: &Frame, date_col: usize, value_col: usize) -> Vec<(String, f64)> {
    let mut out = Vec::new();
    for row in 0..frame.rows.len() {
        let date = frame.cell(row, date_col).as_date();
        let value = frame.cell(row, value_col).as_number();
        if let (Some(date), Some(value)) = (date, value) {
            out.push((date.format("%Y-%m-%d").to_string(), value));
        }
    }
    out
}

/// Full simple-table path: header scan, column detection, keyed extraction.
pub fn normalize_simple(mut table: Table) -> Result<Vec<(String, f64)>, FormatError> {
    table.drop_blank();
    if table.is_empty() {
        return Err(FormatError::HeaderRow);
    }

    let header = choose_header_row(&table);
    let frame = table.into_frame(header);
    let date_col = detect_date_column(&frame)?;
    let value_col = detect_value_column(&frame, date_col)?;
    Ok(extract_keyed_rows(&frame, date_col, value_col))
}

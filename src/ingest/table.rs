//! Cell-grid model for loosely structured tabular payloads.
//!
//! Source-maintained spreadsheets move their header row and columns around
//! over time, so nothing here assumes a fixed layout: a payload is parsed
//! into a rectangular grid of typed cells and the detection layer works out
//! what the columns mean.

use crate::ingest::FormatError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Cell::Text(_))
    }

    /// Cell rendered as header text.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format!("{n}"),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number(s),
            Cell::Empty => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Text(s) => parse_date(s),
            _ => None,
        }
    }
}

/// Lowercase, collapse whitespace, strip everything but `[a-z0-9 ]`.
pub fn norm_header(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y", "%m-%d-%Y", "%m-%d-%y"];

/// Parse a date cell in any of the layouts the sources have used. Values
/// with a time component are truncated to their date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    // "2024-11-02 00:00:00" and "2024-11-02T00:00:00Z" style cells.
    if trimmed.len() > 10 {
        let head = &trimmed[..10];
        if let Ok(date) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
            return Some(date);
        }
    }

    None
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// A rectangular grid of cells, before any header interpretation.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Parse raw CSV bytes into a grid. Numeric-looking fields become
    /// `Cell::Number`, blank fields `Cell::Empty`, everything else text.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Table, FormatError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| FormatError::Csv(e.to_string()))?;
            let row: Vec<Cell> = record
                .iter()
                .map(|field| {
                    let trimmed = field.trim();
                    if trimmed.is_empty() {
                        Cell::Empty
                    } else if let Some(n) = parse_number(trimmed) {
                        Cell::Number(n)
                    } else {
                        Cell::Text(trimmed.to_string())
                    }
                })
                .collect();
            rows.push(row);
        }

        let mut table = Table { rows };
        table.drop_blank();
        Ok(table)
    }

    /// Drop rows and columns that are entirely empty, mirroring how the
    /// source workbooks pad their sheets.
    pub fn drop_blank(&mut self) {
        self.rows.retain(|row| row.iter().any(|c| !c.is_empty()));

        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut self.rows {
            row.resize(width, Cell::Empty);
        }

        let keep: Vec<bool> = (0..width)
            .map(|col| self.rows.iter().any(|row| !row[col].is_empty()))
            .collect();

        for row in &mut self.rows {
            let mut col = 0;
            row.retain(|_| {
                let keep_col = keep[col];
                col += 1;
                keep_col
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Re-interpret the grid with `header_row` as the header: cells on that
    /// row become column names and the rows below become the body.
    pub fn into_frame(self, header_row: usize) -> Frame {
        let headers: Vec<String> = self
            .rows
            .get(header_row)
            .map(|row| row.iter().map(Cell::as_text).collect())
            .unwrap_or_default();

        let width = headers.len();
        let rows: Vec<Vec<Cell>> = self
            .rows
            .into_iter()
            .skip(header_row + 1)
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        Frame { headers, rows }
    }
}

/// A grid with named columns.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Frame {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

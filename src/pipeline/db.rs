use crate::models::observation::Observation;
use crate::models::risk::{RiskHistoryRow, RiskLevel};
use rusqlite::{params, Connection, Result};
use std::path::Path;

const DB_SCHEMA_VERSION: i64 = 2;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        // Future schema; do not fail reads/writes for forward-compatible changes.
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS observations (
            signal TEXT NOT NULL,
            date TEXT NOT NULL,
            dimension TEXT NOT NULL DEFAULT '',
            value REAL NOT NULL,
            source_url TEXT NOT NULL DEFAULT '',
            ingested_at_utc TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (signal, date, dimension)
        );

        CREATE TABLE IF NOT EXISTS risk_history (
            timestamp_utc TEXT PRIMARY KEY,
            risk_score REAL NOT NULL,
            risk_level TEXT NOT NULL CHECK(risk_level IN ('LOW', 'MODERATE', 'CRITICAL')),
            primary_driver TEXT NOT NULL
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_observations_signal_dimension_date
            ON observations(signal, dimension, date);
        ",
    )
}

pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// The empty dimension string stands in for "no dimension" so it can join
/// the primary key.
fn dimension_to_db(dimension: &Option<String>) -> String {
    dimension.clone().unwrap_or_default()
}

fn dimension_from_db(raw: String) -> Option<String> {
    (!raw.is_empty()).then_some(raw)
}

/// Load a signal's full series, ordered by `(date, dimension)`.
pub fn load_series(conn: &Connection, signal: &str) -> Result<Vec<Observation>> {
    let mut stmt = conn.prepare(
        "SELECT date, dimension, value, source_url, ingested_at_utc
         FROM observations WHERE signal = ?1 ORDER BY date ASC, dimension ASC",
    )?;

    let rows = stmt
        .query_map(params![signal], |row| {
            Ok(Observation {
                date: row.get(0)?,
                dimension: dimension_from_db(row.get::<_, String>(1)?),
                value: row.get(2)?,
                source_url: row.get(3)?,
                ingested_at_utc: row.get(4)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(rows)
}

/// Persist a merged series wholesale: the signal's rows are deleted and the
/// merged set inserted inside one transaction, so readers never observe a
/// partial rewrite.
pub fn replace_signal(conn: &Connection, signal: &str, series: &[Observation]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM observations WHERE signal = ?1", params![signal])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO observations (signal, date, dimension, value, source_url, ingested_at_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for obs in series {
            stmt.execute(params![
                signal,
                obs.date,
                dimension_to_db(&obs.dimension),
                obs.value,
                obs.source_url,
                obs.ingested_at_utc,
            ])?;
        }
    }
    tx.commit()
}

pub fn load_risk_history(conn: &Connection) -> Result<Vec<RiskHistoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT timestamp_utc, risk_score, risk_level, primary_driver
         FROM risk_history ORDER BY timestamp_utc ASC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            let level: String = row.get(2)?;
            Ok(RiskHistoryRow {
                timestamp_utc: row.get(0)?,
                risk_score: row.get(1)?,
                risk_level: RiskLevel::parse(&level).unwrap_or(RiskLevel::Low),
                primary_driver: row.get(3)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(rows)
}

/// Backfill policy: the table is a full reconstruction, so it is rewritten
/// in one transaction rather than appended to.
pub fn replace_risk_history(conn: &Connection, rows: &[RiskHistoryRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM risk_history", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO risk_history (timestamp_utc, risk_score, risk_level, primary_driver)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.timestamp_utc,
                row.risk_score,
                row.risk_level.as_str(),
                row.primary_driver,
            ])?;
        }
    }
    tx.commit()
}

/// Live policy: at most one row per calendar day. Any existing row for the
/// new row's day is removed before the append; older rows are untouched.
pub fn upsert_risk_row(conn: &Connection, row: &RiskHistoryRow) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM risk_history WHERE substr(timestamp_utc, 1, 10) = substr(?1, 1, 10)",
        params![row.timestamp_utc],
    )?;
    tx.execute(
        "INSERT INTO risk_history (timestamp_utc, risk_score, risk_level, primary_driver)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            row.timestamp_utc,
            row.risk_score,
            row.risk_level.as_str(),
            row.primary_driver,
        ],
    )?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(date: &str, dimension: Option<&str>, value: f64) -> Observation {
        Observation {
            date: date.to_string(),
            dimension: dimension.map(|d| d.to_string()),
            value,
            source_url: "https://example.gov/data".to_string(),
            ingested_at_utc: "2024-11-02T12:00:00Z".to_string(),
        }
    }

    fn risk_row(timestamp: &str, score: f64) -> RiskHistoryRow {
        RiskHistoryRow {
            timestamp_utc: timestamp.to_string(),
            risk_score: score,
            risk_level: RiskLevel::Low,
            primary_driver: "none".to_string(),
        }
    }

    #[test]
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn replace_then_load_round_trips_a_series() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");

        let series = vec![
            obs("2024-10-05", None, 310.0),
            obs("2024-10-12", Some("UP:terminal_dwell_hours"), 24.0),
        ];
        replace_signal(&conn, "barge", &series).expect("replace signal");

        let loaded = load_series(&conn, "barge").expect("load series");
        assert_eq!(loaded, series);
        assert!(load_series(&conn, "rail").expect("other signal").is_empty());
    }

    #[test]
    fn replace_discards_rows_missing_from_the_merged_set() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");

        replace_signal(&conn, "barge", &[obs("2024-10-05", None, 310.0)]).expect("first write");
        replace_signal(&conn, "barge", &[obs("2024-10-12", None, 295.0)]).expect("second write");

        let loaded = load_series(&conn, "barge").expect("load series");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].date, "2024-10-12");
    }

    #[test]
    fn risk_history_overwrite_replaces_all_rows() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");

        replace_risk_history(&conn, &[risk_row("2024-10-01T12:00:00Z", 20.0)]).expect("first");
        replace_risk_history(
            &conn,
            &[
                risk_row("2024-10-02T12:00:00Z", 0.0),
                risk_row("2024-10-03T12:00:00Z", 15.0),
            ],
        )
        .expect("second");

        let rows = load_risk_history(&conn).expect("load history");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp_utc, "2024-10-02T12:00:00Z");
    }

    #[test]
    fn upsert_keeps_at_most_one_row_per_day() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");

        replace_risk_history(&conn, &[risk_row("2024-10-01T12:00:00Z", 20.0)]).expect("seed");
        upsert_risk_row(&conn, &risk_row("2024-10-02T09:15:00Z", 15.0)).expect("first today");
        upsert_risk_row(&conn, &risk_row("2024-10-02T17:40:00Z", 30.0)).expect("second today");

        let rows = load_risk_history(&conn).expect("load history");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp_utc, "2024-10-01T12:00:00Z");
        assert_eq!(rows[1].timestamp_utc, "2024-10-02T17:40:00Z");
        assert_eq!(rows[1].risk_score, 30.0);
    }
}

//! Thin batch entry point: reads already-fetched payload files, runs the
//! ingestion and scoring pipeline, and reports through exit codes. All of
//! the actual logic lives in the library.

use chrono::Utc;
use freightlens::pipeline::{db, run, settings};
use std::fs;
use std::path::Path;

const USAGE: &str = "usage: freightlens [--settings <file>] <command>
commands:
  ingest-river <payload.json> [source-url]   merge a USGS payload into the river history
  ingest-rail <sheet.csv> [source-url]       merge a rail service sheet into the rail history
  ingest-barge <sheet.csv> [source-url]      merge a Locks 27 sheet into the barge history
  score                                      score the latest status documents
  backfill                                   reconstruct the daily risk history";

fn main() {
    env_logger::init();
    if let Err(message) = run_cli() {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), String> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let settings_path = if args.first().map(String::as_str) == Some("--settings") {
        if args.len() < 2 {
            return Err(USAGE.to_string());
        }
        args.remove(0);
        args.remove(0)
    } else {
        "data/settings.json".to_string()
    };

    let effective = settings::load_effective_settings(Path::new(&settings_path))?;
    let conn = db::open_database(&effective.database_file)
        .map_err(|e| format!("DB error: {e}"))?;
    let now = run::utc_now_iso();

    let command = args.first().map(String::as_str).unwrap_or("");
    match command {
        "ingest-river" => {
            let (path, source_url) = payload_args(&args)?;
            let raw = fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read {path}: {e}"))?;
            let report = run::ingest_river(&conn, &effective, &raw, &source_url, &now)?;
            println!("river: merged {} observations", report.merged_rows);
            Ok(())
        }
        "ingest-rail" => {
            let (path, source_url) = payload_args(&args)?;
            let bytes = fs::read(&path).map_err(|e| format!("Failed to read {path}: {e}"))?;
            let report = run::ingest_rail(&conn, &effective, &bytes, &source_url, &now)?;
            println!("rail: merged {} observations", report.merged_rows);
            Ok(())
        }
        "ingest-barge" => {
            let (path, source_url) = payload_args(&args)?;
            let bytes = fs::read(&path).map_err(|e| format!("Failed to read {path}: {e}"))?;
            let report = run::ingest_barge(&conn, &effective, &bytes, &source_url, &now)?;
            println!("barge: merged {} observations", report.merged_rows);
            if let Some(note) = report.note {
                println!("barge: {note}");
            }
            Ok(())
        }
        "score" => {
            let result = run::score_live(&conn, &effective, &now)?;
            println!(
                "risk score {} ({}) driver {}",
                result.risk_score,
                result.risk_level.as_str(),
                result.primary_driver
            );
            Ok(())
        }
        "backfill" => {
            let rows = run::run_backfill(&conn, &effective, Utc::now().date_naive())?;
            println!("backfill wrote {rows} daily rows");
            Ok(())
        }
        _ => Err(USAGE.to_string()),
    }
}

fn payload_args(args: &[String]) -> Result<(String, String), String> {
    let path = args.get(1).cloned().ok_or_else(|| USAGE.to_string())?;
    let source_url = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| format!("file://{path}"));
    Ok((path, source_url))
}

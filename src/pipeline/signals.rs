//! Per-signal normalization into canonical observations and status
//! documents.

use crate::analysis::backfill::Lags;
use crate::analysis::delta::delta;
use crate::analysis::summary::{build_series, summarize};
use crate::ingest::detect::normalize_simple;
use crate::ingest::melt::{melt_wide, METRIC_TERMINAL_DWELL, METRIC_TRAIN_SPEED};
use crate::ingest::table::Table;
use crate::ingest::usgs::{extract_daily, extract_points, UsgsPayload};
use crate::ingest::{detect, FormatError};
use crate::models::observation::{filter_dimension, rail_dimension, Observation};
use crate::models::status::{
    BargeStatus, CarrierMetrics, CarrierStatus, LockSummary, MetricReading, MetricSummary,
    RailStatus, RiverStatus, SiteStatus,
};
use std::collections::BTreeSet;

pub const SIGNAL_RIVER: &str = "river";
pub const SIGNAL_RAIL: &str = "rail";
pub const SIGNAL_BARGE: &str = "barge";

pub const PCODE_GAGE_HEIGHT_FT: &str = "00065";
pub const PCODE_DISCHARGE_CFS: &str = "00060";

pub struct GaugeSite {
    pub key: &'static str,
    pub site_no: &'static str,
    pub label: &'static str,
}

pub const GAUGE_SITES: &[GaugeSite] = &[
    GaugeSite {
        key: "st_louis_mo",
        site_no: "07010000",
        label: "Mississippi River at St. Louis, MO",
    },
    GaugeSite {
        key: "memphis_tn",
        site_no: "07032000",
        label: "Mississippi River at Memphis, TN",
    },
];

fn observation(
    date: String,
    dimension: Option<String>,
    value: f64,
    source_url: &str,
    ingested_at: &str,
) -> Observation {
    Observation {
        date,
        dimension,
        value,
        source_url: source_url.to_string(),
        ingested_at_utc: ingested_at.to_string(),
    }
}

/// Daily gauge-height observations for every configured site, keyed by the
/// site's dimension.
pub fn normalize_river(
    payload: &UsgsPayload,
    source_url: &str,
    ingested_at: &str,
) -> Vec<Observation> {
    let mut out = Vec::new();
    for site in GAUGE_SITES {
        for (date, value) in extract_daily(payload, site.site_no, PCODE_GAGE_HEIGHT_FT) {
            out.push(observation(
                date,
                Some(site.key.to_string()),
                value,
                source_url,
                ingested_at,
            ));
        }
    }
    out
}

/// River status document: per-site window summaries with an embedded
/// downsampled series per metric.
pub fn build_river_status(
    payload: &UsgsPayload,
    source_url: &str,
    generated_at: &str,
    max_series_points: usize,
) -> RiverStatus {
    let mut status = RiverStatus {
        generated_at_utc: Some(generated_at.to_string()),
        source_url: Some(source_url.to_string()),
        sites: Default::default(),
    };

    for site in GAUGE_SITES {
        let mut block = SiteStatus {
            site_no: Some(site.site_no.to_string()),
            label: Some(site.label.to_string()),
            gage_height_ft: None,
            discharge_cfs: None,
        };

        block.gage_height_ft =
            metric_block(payload, site.site_no, PCODE_GAGE_HEIGHT_FT, max_series_points);
        block.discharge_cfs =
            metric_block(payload, site.site_no, PCODE_DISCHARGE_CFS, max_series_points);

        status.sites.insert(site.key.to_string(), block);
    }

    status
}

fn metric_block(
    payload: &UsgsPayload,
    site_no: &str,
    parameter_cd: &str,
    max_series_points: usize,
) -> Option<MetricSummary> {
    let points = extract_points(payload, site_no, parameter_cd);
    let mut summary = summarize(&points)?;
    summary.series_7d = Some(build_series(&points, max_series_points));
    Some(summary)
}

/// Reshape a pivoted rail sheet into per-carrier/metric observations.
pub fn normalize_rail(
    bytes: &[u8],
    source_url: &str,
    ingested_at: &str,
) -> Result<Vec<Observation>, FormatError> {
    let mut table = Table::from_csv_bytes(bytes)?;
    table.drop_blank();
    if table.is_empty() {
        return Err(FormatError::HeaderRow);
    }

    let header = detect::choose_header_row(&table);
    let frame = table.into_frame(header);
    let rows = melt_wide(&frame)?;

    let mut out = Vec::new();
    for row in rows {
        if let Some(speed) = row.train_speed_mph {
            out.push(observation(
                row.week_end_date.clone(),
                Some(rail_dimension(&row.carrier, METRIC_TRAIN_SPEED)),
                speed,
                source_url,
                ingested_at,
            ));
        }
        if let Some(dwell) = row.terminal_dwell_hours {
            out.push(observation(
                row.week_end_date,
                Some(rail_dimension(&row.carrier, METRIC_TERMINAL_DWELL)),
                dwell,
                source_url,
                ingested_at,
            ));
        }
    }
    Ok(out)
}

/// Rail status: latest value and lagged delta per carrier and metric, for
/// every carrier present in the merged history.
pub fn build_rail_status(
    merged: &[Observation],
    lags: &Lags,
    source_url: &str,
    generated_at: &str,
) -> RailStatus {
    let carriers: BTreeSet<String> = merged
        .iter()
        .filter_map(|o| o.dimension.as_deref())
        .filter_map(|d| d.split_once(':').map(|(carrier, _)| carrier.to_string()))
        .collect();

    let mut status = RailStatus {
        generated_at_utc: Some(generated_at.to_string()),
        source_url: Some(source_url.to_string()),
        carriers: Default::default(),
    };

    for carrier in carriers {
        let speed = metric_reading(merged, &carrier, METRIC_TRAIN_SPEED, lags.rail_days);
        let dwell = metric_reading(merged, &carrier, METRIC_TERMINAL_DWELL, lags.rail_days);

        let week_end_date = [METRIC_TRAIN_SPEED, METRIC_TERMINAL_DWELL]
            .iter()
            .filter_map(|metric| {
                filter_dimension(merged, &rail_dimension(&carrier, metric))
                    .last()
                    .map(|o| o.date.clone())
            })
            .max();

        status.carriers.insert(
            carrier,
            CarrierStatus {
                metrics: CarrierMetrics {
                    train_speed_mph: speed,
                    terminal_dwell_hours: dwell,
                },
                week_end_date,
            },
        );
    }

    status
}

fn metric_reading(
    merged: &[Observation],
    carrier: &str,
    metric: &str,
    lag_days: u32,
) -> Option<MetricReading> {
    let series = filter_dimension(merged, &rail_dimension(carrier, metric));
    let latest = series.last()?.clone();
    Some(MetricReading {
        value: Some(latest.value),
        delta_4w: Some(delta(&series, &latest.date, lag_days)),
    })
}

/// Simple-table path for the Locks 27 weekly workbook.
pub fn normalize_barge(
    bytes: &[u8],
    source_url: &str,
    ingested_at: &str,
) -> Result<Vec<Observation>, FormatError> {
    let table = Table::from_csv_bytes(bytes)?;
    let rows = normalize_simple(table)?;
    Ok(rows
        .into_iter()
        .map(|(date, value)| observation(date, None, value, source_url, ingested_at))
        .collect())
}

/// Barge status: latest weekly count and lagged delta.
pub fn build_barge_status(
    merged: &[Observation],
    lags: &Lags,
    source_url: &str,
    generated_at: &str,
) -> BargeStatus {
    let locks_27 = merged.last().map(|latest| LockSummary {
        week_end_date: Some(latest.date.clone()),
        value: Some(latest.value),
        delta_4w: Some(delta(merged, &latest.date, lags.barge_days)),
        unit: Some("barges".to_string()),
    });

    BargeStatus {
        generated_at_utc: Some(generated_at.to_string()),
        source_url: Some(source_url.to_string()),
        locks_27,
    }
}

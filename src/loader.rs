//! Dataset ingestion and record normalization.
//!
//! Each source schema gets its own adapter that maps raw rows onto the
//! single [`Record`] shape the pipeline consumes. Row-level problems are
//! never errors: bad numerics become 0, missing categories become the
//! `"Unknown"` sentinel, and the counts end up in a [`LoadReport`]. Only
//! dataset-level failures (unreadable file, undecodable payload) surface
//! as [`LoadError`].

use crate::types::{
    Dataset, PrevalenceRow, PriceRow, Record, SeizureRow, TraffickingRow, UNKNOWN,
};
use crate::util::{parse_date_safe, parse_f64_safe, parse_i32_safe};
use chrono::Datelike;
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use std::fs;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Row-level diagnostics for one loaded dataset.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub parse_errors: usize,
    /// Rows kept without a usable year; year-keyed views skip them.
    pub missing_year: usize,
}

/// Trimmed category value, or the `"Unknown"` sentinel when absent.
fn category(value: Option<String>) -> String {
    match value {
        Some(v) => {
            let v = v.trim();
            if v.is_empty() {
                UNKNOWN.to_string()
            } else {
                v.to_string()
            }
        }
        None => UNKNOWN.to_string(),
    }
}

/// Trimmed optional value, with empty strings collapsed to `None`.
fn optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let v = v.trim();
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    })
}

pub fn normalize_seizure(row: SeizureRow) -> Record {
    let mut rec = Record::empty(Dataset::Seizure);
    rec.year = parse_i32_safe(row.year.as_deref());
    rec.country = category(row.country);
    rec.region = category(row.region);
    rec.sub_region = category(row.sub_region);
    rec.drug_group = category(row.drug_group);
    rec.drug = category(row.drug);
    rec.weight = parse_f64_safe(row.kilograms.as_deref()).unwrap_or(0.0);
    rec.ms_code = optional(row.ms_code);
    rec
}

pub fn normalize_prevalence(row: PrevalenceRow, dataset: Dataset) -> Record {
    let mut rec = Record::empty(dataset);
    rec.year = parse_i32_safe(row.year.as_deref());
    rec.country = category(row.country);
    rec.region = category(row.region);
    rec.sub_region = category(row.sub_region);
    rec.drug_group = category(row.drug_group);
    rec.drug = category(row.drug);
    // The general export reports a best estimate, the NPS export a Q2
    // quartile; whichever is present is the record's weight.
    rec.weight = parse_f64_safe(row.best.as_deref())
        .or_else(|| parse_f64_safe(row.q2.as_deref()))
        .unwrap_or(0.0);
    rec.gender = optional(row.gender);
    rec.age_group = optional(row.age);
    rec
}

pub fn normalize_price(row: PriceRow) -> Record {
    let mut rec = Record::empty(Dataset::Price);
    rec.year = parse_i32_safe(row.year.as_deref());
    rec.country = category(row.country);
    rec.region = category(row.region);
    rec.sub_region = category(row.sub_region);
    rec.drug_group = category(row.drug_group);
    rec.drug = category(row.drug);
    rec.weight = parse_f64_safe(row.typical_usd.as_deref()).unwrap_or(0.0);
    rec.price_min = parse_f64_safe(row.minimum_usd.as_deref());
    rec.price_max = parse_f64_safe(row.maximum_usd.as_deref());
    rec
}

pub fn normalize_trafficking(row: TraffickingRow) -> Record {
    let mut rec = Record::empty(Dataset::Trafficking);
    // Individual seizures sometimes omit the Year column; fall back to the
    // year of the seizure date.
    rec.year = parse_i32_safe(row.year.as_deref())
        .or_else(|| parse_date_safe(row.seizure_date.as_deref()).map(|d| d.year()));
    rec.country = category(row.country);
    rec.region = category(row.region);
    rec.sub_region = category(row.sub_region);
    rec.drug_group = category(row.drug_group);
    rec.drug = category(row.drug);
    rec.weight = parse_f64_safe(row.kilograms.as_deref()).unwrap_or(0.0);
    rec.ms_code = optional(row.ms_code);
    rec.seizure_location = optional(row.seizure_location);
    rec.trafficking_category = optional(row.trafficking_category);
    rec
}

/// Parse a JSON array file row by row so one malformed element only costs
/// that element, not the whole dataset.
fn read_json_rows<T: DeserializeOwned>(path: &str) -> Result<(Vec<T>, usize, usize), LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_string(),
        source,
    })?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&text).map_err(|source| LoadError::Json {
            path: path.to_string(),
            source,
        })?;
    let total = values.len();
    let mut parse_errors = 0usize;
    let mut rows = Vec::with_capacity(total);
    for value in values {
        match serde_json::from_value::<T>(value) {
            Ok(row) => rows.push(row),
            Err(err) => {
                parse_errors += 1;
                debug!(path, %err, "skipping malformed row");
            }
        }
    }
    Ok((rows, total, parse_errors))
}

fn finish(
    path: &str,
    total_rows: usize,
    parse_errors: usize,
    records: Vec<Record>,
) -> (Vec<Record>, LoadReport) {
    let missing_year = records.iter().filter(|r| r.year.is_none()).count();
    let report = LoadReport {
        total_rows,
        kept_rows: records.len(),
        parse_errors,
        missing_year,
    };
    info!(
        path,
        total = report.total_rows,
        kept = report.kept_rows,
        parse_errors = report.parse_errors,
        missing_year = report.missing_year,
        "dataset loaded"
    );
    (records, report)
}

pub fn load_seizures(path: &str) -> Result<(Vec<Record>, LoadReport), LoadError> {
    let (rows, total, errors) = read_json_rows::<SeizureRow>(path)?;
    let records = rows.into_iter().map(normalize_seizure).collect();
    Ok(finish(path, total, errors, records))
}

pub fn load_prevalence(
    path: &str,
    dataset: Dataset,
) -> Result<(Vec<Record>, LoadReport), LoadError> {
    let (rows, total, errors) = read_json_rows::<PrevalenceRow>(path)?;
    let records = rows
        .into_iter()
        .map(|row| normalize_prevalence(row, dataset))
        .collect();
    Ok(finish(path, total, errors, records))
}

pub fn load_prices(path: &str) -> Result<(Vec<Record>, LoadReport), LoadError> {
    let (rows, total, errors) = read_json_rows::<PriceRow>(path)?;
    let records = rows.into_iter().map(normalize_price).collect();
    Ok(finish(path, total, errors, records))
}

pub fn load_trafficking(path: &str) -> Result<(Vec<Record>, LoadReport), LoadError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_string(),
            source,
        })?;
    let mut total = 0usize;
    let mut parse_errors = 0usize;
    let mut records = Vec::new();
    for result in rdr.deserialize::<TraffickingRow>() {
        total += 1;
        match result {
            Ok(row) => records.push(normalize_trafficking(row)),
            Err(err) => {
                parse_errors += 1;
                debug!(path, %err, "skipping malformed row");
            }
        }
    }
    Ok(finish(path, total, parse_errors, records))
}

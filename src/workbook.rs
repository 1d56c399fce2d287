use crate::records::{parse_records, Cell, ExamRecord, ParsedRecords, RawTable, SchemaError};
use anyhow::Context;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// Load summary returned to the caller after a workbook is read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub sheet_name: String,
    pub row_count: usize,
    pub fingerprint: String,
    pub loaded_at: String,
    pub dropped_columns: Vec<String>,
    pub coercion_gaps: usize,
    pub duplicate_rows: usize,
    pub skipped_blank_rows: usize,
}

/// An immutable parsed workbook. Cloning shares the record snapshot.
#[derive(Debug, Clone)]
pub struct LoadedWorkbook {
    pub records: Arc<[ExamRecord]>,
    pub fingerprint: String,
    pub sheet_name: String,
    pub loaded_at: DateTime<Utc>,
    pub report: LoadReport,
}

pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn convert_value(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Bool(v) => Cell::Bool(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Float(v) => Cell::Number(*v),
        Data::String(v) => Cell::Text(v.clone()),
        Data::DateTime(v) => Cell::Number(v.as_f64()),
        Data::DateTimeIso(v) | Data::DurationIso(v) => Cell::Text(v.clone()),
    }
}

/// Read one sheet into a raw table: first used row is the header, the rest
/// are data rows.
pub fn read_sheet(bytes: Vec<u8>, sheet_name: &str) -> anyhow::Result<RawTable> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).context("unrecognised workbook format")?;

    let available = workbook.sheet_names().to_owned();
    if !available.iter().any(|s| s == sheet_name) {
        return Err(SchemaError::MissingSheet {
            sheet: sheet_name.to_string(),
            available,
        }
        .into());
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("failed to read sheet `{sheet_name}`"))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|r| {
            r.iter()
                .map(|c| match convert_value(c) {
                    Cell::Text(s) => s.trim().to_string(),
                    Cell::Number(v) => v.to_string(),
                    Cell::Bool(b) => b.to_string(),
                    Cell::Empty => String::new(),
                })
                .collect()
        })
        .unwrap_or_default();
    let rows = rows.map(|r| r.iter().map(convert_value).collect()).collect();

    Ok(RawTable { headers, rows })
}

fn build(bytes: Vec<u8>, sheet_name: &str) -> anyhow::Result<LoadedWorkbook> {
    let fingerprint = fingerprint(&bytes);
    let table = read_sheet(bytes, sheet_name)?;
    let ParsedRecords {
        records,
        dropped_columns,
        coercion_gaps,
        duplicate_rows,
        skipped_blank_rows,
    } = parse_records(&table)?;

    let loaded_at = Utc::now();
    let report = LoadReport {
        sheet_name: sheet_name.to_string(),
        row_count: records.len(),
        fingerprint: fingerprint.clone(),
        loaded_at: loaded_at.to_rfc3339(),
        dropped_columns,
        coercion_gaps,
        duplicate_rows,
        skipped_blank_rows,
    };
    Ok(LoadedWorkbook {
        records: records.into(),
        fingerprint,
        sheet_name: sheet_name.to_string(),
        loaded_at,
        report,
    })
}

/// Read and parse a workbook file. When `previous` holds the same bytes and
/// sheet, it is returned as-is and the second tuple field is `true`.
pub fn load_workbook(
    path: &Path,
    sheet_name: &str,
    previous: Option<&LoadedWorkbook>,
) -> anyhow::Result<(LoadedWorkbook, bool)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read workbook {}", path.to_string_lossy()))?;

    if let Some(prev) = previous {
        if prev.sheet_name == sheet_name && prev.fingerprint == fingerprint(&bytes) {
            return Ok((prev.clone(), true));
        }
    }

    let loaded = build(bytes, sheet_name)?;
    log::info!(
        "loaded {} record(s) from {} [{}]: {} coercion gap(s), {} duplicate row(s)",
        loaded.report.row_count,
        path.to_string_lossy(),
        sheet_name,
        loaded.report.coercion_gaps,
        loaded.report.duplicate_rows,
    );
    if !loaded.report.dropped_columns.is_empty() {
        log::debug!("dropped columns: {:?}", loaded.report.dropped_columns);
    }
    Ok((loaded, false))
}

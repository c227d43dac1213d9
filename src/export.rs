// 📤 Export - CSV output and carry-forward input
// Nulls are written as empty cells; NA markers read back as null

use crate::config::RunContext;
use crate::deduplication::DeduplicationResolver;
use crate::error::Result;
use crate::record::{Record, RecordSet, Value};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// EXPORT KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportKind {
    /// Valid survey records
    Import,
    Revenue,
    /// Invalid records; next run's carry-forward
    Failed,
}

impl ExportKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ExportKind::Import => "CGImport",
            ExportKind::Revenue => "CGRevenue",
            ExportKind::Failed => "CGFailedRecords",
        }
    }
}

fn file_date(date: NaiveDate) -> String {
    date.format("%m.%d.%Y").to_string()
}

/// `CGImport_03.22.2024.csv`
pub fn daily_filename(kind: ExportKind, date: NaiveDate) -> String {
    format!("{}_{}.csv", kind.prefix(), file_date(date))
}

/// Daily file name; custom-range runs append the window
pub fn export_filename(kind: ExportKind, ctx: &RunContext) -> String {
    match ctx.custom_range {
        None => daily_filename(kind, ctx.today),
        Some(range) => format!(
            "{}_{}_{}_{}.csv",
            kind.prefix(),
            file_date(ctx.today),
            file_date(range.from),
            file_date(range.to)
        ),
    }
}

/// Reindex to an export layout; missing columns become null, extras are dropped
pub fn project(records: &RecordSet, columns: &[String]) -> RecordSet {
    records.project(columns)
}

// ============================================================================
// CSV I/O
// ============================================================================

pub fn write_csv(records: &RecordSet, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    writer.write_record(records.columns())?;
    for record in records {
        writer.write_record(
            records
                .columns()
                .iter()
                .map(|column| record.get(column).render_or_empty()),
        )?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = records.len(), "Wrote CSV");
    Ok(())
}

/// Read every cell as text; cells equal to an NA marker become null
pub fn read_csv(path: &Path, na_values: &[String]) -> Result<RecordSet> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut records = RecordSet::new(headers.clone());

    for row in reader.records() {
        let row = row?;
        let mut record = Record::new();
        for (column, cell) in headers.iter().zip(row.iter()) {
            let value = if na_values.iter().any(|na| na == cell) {
                Value::Null
            } else {
                Value::text(cell)
            };
            record.set(column, value);
        }
        records.push(record);
    }

    info!(path = %path.display(), rows = records.len(), "Read CSV");
    Ok(records)
}

// ============================================================================
// CONSOLIDATION
// ============================================================================

/// Daily exports folded into one file: five on Tuesday, two on Thursday
pub fn consolidation_lookback(date: NaiveDate) -> Option<u32> {
    match date.weekday() {
        Weekday::Tue => Some(5),
        Weekday::Thu => Some(2),
        _ => None,
    }
}

/// Concatenate the daily exports of `lookback` days ending at `to_date`
///
/// Files are read newest first, so ties in the duplicate check keep the most
/// recent row. Missing days are skipped. An empty result means nothing to write.
pub fn consolidate(
    dir: &Path,
    kind: ExportKind,
    to_date: NaiveDate,
    lookback: u32,
    key_columns: &[String],
    ctx: &RunContext,
) -> Result<RecordSet> {
    let mut combined = RecordSet::default();
    for offset in 0..i64::from(lookback) {
        let path = dir.join(daily_filename(kind, to_date - Duration::days(offset)));
        if !path.exists() {
            warn!(path = %path.display(), "Daily export missing; skipped in consolidation");
            continue;
        }
        combined.extend(read_csv(&path, &ctx.na_values)?);
    }

    let consolidated = DeduplicationResolver::from_context(ctx).resolve(&combined, key_columns);
    info!(
        kind = kind.prefix(),
        days = lookback,
        rows = consolidated.len(),
        "Consolidated daily exports"
    );
    Ok(consolidated)
}

// ============================================================================
// TESTS
// ============================================================================

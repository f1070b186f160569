//! Cleaner: drop low-information columns, duplicate rows and incomplete rows.
//!
//! Columns are dropped first, so duplicates are judged on the remaining
//! columns only. Duplicates go next, then any row with a null field.

use serde::Serialize;

use crate::error::{PipelineResult, SchemaError};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::models::Table;
use crate::validation::{check_clean, REQUIRED_LOADED_COLUMNS};

/// What the cleaner removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Columns actually removed (configured names absent from the table are skipped)
    pub columns_dropped: Vec<String>,
    pub duplicates_removed: usize,
    pub rows_with_nulls_removed: usize,
    /// Nulls per column after deduplication, before null rows are dropped
    pub null_counts: Vec<(String, usize)>,
}

/// Clean a loaded table.
///
/// Fails with [`SchemaError::RequiredColumnDropped`] if `drop_columns` names a
/// column later stages need. The result has no duplicate rows and no nulls.
pub fn clean(table: Table, drop_columns: &[String]) -> PipelineResult<(Table, CleanReport)> {
    log_info("🧹 Cleaning...");

    if let Some(required) = drop_columns
        .iter()
        .find(|name| REQUIRED_LOADED_COLUMNS.contains(&name.as_str()))
    {
        log_error(format!("Column '{}' is required and cannot be dropped", required));
        return Err(SchemaError::RequiredColumnDropped(required.clone()).into());
    }

    let rows_in = table.row_count();
    let (table, columns_dropped) = drop_low_value_columns(table, drop_columns);
    let (table, duplicates_removed) = drop_duplicates(table)?;
    let null_counts: Vec<(String, usize)> = table
        .null_counts()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect();
    let (table, rows_with_nulls_removed) = drop_incomplete(table)?;

    check_clean(&table, "cleaner")?;

    let report = CleanReport {
        rows_in,
        rows_out: table.row_count(),
        columns_dropped,
        duplicates_removed,
        rows_with_nulls_removed,
        null_counts,
    };
    log_report(&report);

    Ok((table, report))
}

/// Remove the listed columns, logging any that were not present.
pub fn drop_low_value_columns(table: Table, drop_columns: &[String]) -> (Table, Vec<String>) {
    let (table, dropped) = table.drop_columns(drop_columns);
    for name in drop_columns.iter().filter(|n| !dropped.contains(n)) {
        log_warning(format!("Column '{}' not in input, nothing to drop", name));
    }
    (table, dropped)
}

/// Remove rows equal to an earlier row, keeping the first occurrence.
pub fn drop_duplicates(table: Table) -> PipelineResult<(Table, usize)> {
    let unique = table.unique_rows()?;
    let removed = table.row_count() - unique.row_count();
    Ok((unique, removed))
}

/// Remove rows with at least one null field.
pub fn drop_incomplete(table: Table) -> PipelineResult<(Table, usize)> {
    let complete = table.complete_rows()?;
    let removed = table.row_count() - complete.row_count();
    Ok((complete, removed))
}

fn log_report(report: &CleanReport) {
    log_success(format!("Dropped {} columns: {}", report.columns_dropped.len(), report.columns_dropped.join(", ")));
    log_success(format!("Removed {} duplicate rows", report.duplicates_removed));
    if !report.null_counts.is_empty() {
        log_info("Null fields per column:");
        for (column, count) in &report.null_counts {
            log_info_indent(format!("{}: {}", column, count), 1);
        }
    }
    log_success(format!("Removed {} rows with missing values", report.rows_with_nulls_removed));
    log_success(format!("{} → {} rows", report.rows_in, report.rows_out));
}

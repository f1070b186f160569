//! Schema and invariant checks.
//!
//! The input shape is fixed, so it is validated once, at the loader
//! boundary, instead of failing deep inside derivation.
//!
//! # Two schemas
//!
//! - **Header schema** - the columns of the raw file, including `release_date`.
//! - **Loaded schema** - what the loader hands to the cleaner: `release_date`
//!   replaced by `release_day` and `release_month`.
//!
//! [`check_clean`] verifies the cleaner's guarantee (no nulls, no duplicate
//! rows) and is used as a guard before derivation.

use crate::error::{InvariantViolationError, PipelineResult, SchemaError, SchemaResult};
use crate::models::{columns, ColumnKind, Schema, Table};

/// Columns the raw file must provide.
pub const REQUIRED_HEADER_COLUMNS: &[&str] = &[
    columns::ORIGINAL_TITLE,
    columns::BUDGET,
    columns::REVENUE,
    columns::POPULARITY,
    columns::VOTE_AVERAGE,
    columns::RELEASE_YEAR,
    columns::RELEASE_DATE,
    columns::GENRES,
    columns::CAST,
    columns::DIRECTOR,
];

/// Columns every stage after the loader relies on.
pub const REQUIRED_LOADED_COLUMNS: &[&str] = &[
    columns::ORIGINAL_TITLE,
    columns::BUDGET,
    columns::REVENUE,
    columns::POPULARITY,
    columns::VOTE_AVERAGE,
    columns::RELEASE_YEAR,
    columns::RELEASE_DAY,
    columns::RELEASE_MONTH,
    columns::GENRES,
    columns::CAST,
    columns::DIRECTOR,
];

/// Fixed kind of a known TMDB column; `None` for columns outside the export.
pub fn expected_kind(name: &str) -> Option<ColumnKind> {
    let kind = match name {
        columns::ID | columns::BUDGET | columns::REVENUE | columns::RUNTIME | columns::VOTE_COUNT
        | columns::RELEASE_YEAR | columns::RELEASE_DAY | columns::RELEASE_MONTH => ColumnKind::Integer,
        columns::POPULARITY | columns::VOTE_AVERAGE | columns::BUDGET_ADJ | columns::REVENUE_ADJ => {
            ColumnKind::Float
        }
        columns::GENRES | columns::CAST | columns::DIRECTOR | columns::KEYWORDS
        | columns::PRODUCTION_COMPANIES => ColumnKind::MultiText,
        columns::IMDB_ID | columns::ORIGINAL_TITLE | columns::HOMEPAGE | columns::TAGLINE
        | columns::OVERVIEW | columns::RELEASE_DATE => ColumnKind::Text,
        _ => return None,
    };
    Some(kind)
}

/// Every problem with `schema` against a list of required columns.
pub fn schema_issues(schema: &Schema, required: &[&str]) -> Vec<SchemaError> {
    let mut issues = Vec::new();
    for name in required {
        match schema.column(name) {
            None => issues.push(SchemaError::MissingColumn(name.to_string())),
            Some(def) => {
                if let Some(expected) = expected_kind(name) {
                    if def.kind != expected {
                        issues.push(SchemaError::WrongKind {
                            column: name.to_string(),
                            expected: expected.name().to_string(),
                            actual: def.kind.name().to_string(),
                        });
                    }
                }
            }
        }
    }
    issues
}

/// Validate the raw header. Fails with the first issue found.
pub fn validate_header(schema: &Schema) -> SchemaResult<()> {
    first_issue(schema_issues(schema, REQUIRED_HEADER_COLUMNS))
}

/// Validate a loaded table's schema. Fails with the first issue found.
pub fn validate_loaded(schema: &Schema) -> SchemaResult<()> {
    first_issue(schema_issues(schema, REQUIRED_LOADED_COLUMNS))
}

/// Quick check against the loaded schema.
pub fn is_valid_loaded(schema: &Schema) -> bool {
    schema_issues(schema, REQUIRED_LOADED_COLUMNS).is_empty()
}

fn first_issue(issues: Vec<SchemaError>) -> SchemaResult<()> {
    match issues.into_iter().next() {
        Some(issue) => Err(issue),
        None => Ok(()),
    }
}

/// Verify that a table has no null field and no duplicate row.
pub fn check_clean(table: &Table, stage: &'static str) -> PipelineResult<()> {
    for (def_idx, def) in table.schema().columns().iter().enumerate() {
        let cells = table.column_at(def_idx).unwrap_or_default();
        if let Some(row) = cells.iter().position(|c| c.is_null()) {
            return Err(InvariantViolationError {
                stage,
                column: def.name.clone(),
                row,
                message: "null field in a table that must be complete".to_string(),
            }
            .into());
        }
    }

    // Unique rows keep table order, so the first mismatch is the first repeat.
    let unique = table.unique_rows()?;
    if unique.row_count() < table.row_count() {
        let row = unique
            .rows()
            .zip(table.rows())
            .position(|(kept, original)| !kept.cells().eq(original.cells()))
            .unwrap_or(unique.row_count());
        return Err(InvariantViolationError {
            stage,
            column: String::new(),
            row,
            message: "duplicate row in a table that must be deduplicated".to_string(),
        }
        .into());
    }

    Ok(())
}

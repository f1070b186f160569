//! Row explosion of multi-valued columns.
//!
//! `Action|Drama` in `genres` becomes two rows with `genre = Action` and
//! `genre = Drama`; every other field is copied. The input table is only
//! read, so several explosions can share it.

use serde::{Deserialize, Serialize};

use crate::error::{InvariantViolationError, PipelineResult, SchemaError};
use crate::logs::{log_success, log_success_indent};
use crate::models::{Cell, ColumnDef, ColumnKind, Table};

fn default_delimiter() -> String {
    "|".to_string()
}

/// Which column to split, on what, and the name of the resulting column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplodeSpec {
    pub source: String,
    pub target: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl ExplodeSpec {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            delimiter: default_delimiter(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }
}

/// Result of one explosion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplodedView {
    pub source_column: String,
    pub target_column: String,
    /// Row of the input table each output row came from
    pub source_rows: Vec<usize>,
    pub table: Table,
}

impl ExplodedView {
    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Tokens in output order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> + '_ {
        self.table
            .column(&self.target_column)
            .unwrap_or_default()
            .iter()
            .filter_map(Cell::as_str)
    }
}

/// Split a field into tokens. A field without the delimiter, including the
/// empty string, yields itself as the only token.
pub fn split_tokens<'a>(value: &'a str, delimiter: &str) -> Vec<&'a str> {
    if value.is_empty() || delimiter.is_empty() {
        return vec![value];
    }
    value.split(delimiter).collect()
}

/// Explode `spec.source` into one row per token.
///
/// Output rows follow input row order, then token order. The source column is
/// removed and the target column appended as text.
pub fn explode(table: &Table, spec: &ExplodeSpec) -> PipelineResult<ExplodedView> {
    let source_idx = table.schema().require(&spec.source)?;
    let kind = &table.schema().columns()[source_idx].kind;
    if !matches!(kind, ColumnKind::Text | ColumnKind::MultiText) {
        return Err(SchemaError::WrongKind {
            column: spec.source.clone(),
            expected: ColumnKind::MultiText.name().to_string(),
            actual: kind.name().to_string(),
        }
        .into());
    }
    if table.schema().contains(&spec.target) {
        return Err(SchemaError::ColumnExists(spec.target.clone()).into());
    }

    let cells = table.column(&spec.source)?;
    let mut source_rows = Vec::with_capacity(cells.len());
    let mut tokens = Vec::with_capacity(cells.len());

    for (row, cell) in cells.iter().enumerate() {
        let value = cell.as_str().ok_or_else(|| InvariantViolationError {
            stage: "explode",
            column: spec.source.clone(),
            row,
            message: format!("cannot split '{}'", cell),
        })?;
        for token in split_tokens(value, &spec.delimiter) {
            source_rows.push(row);
            tokens.push(Cell::text(token));
        }
    }

    let (exploded, _, _) = table.take_rows(&source_rows).take_column(&spec.source)?;
    let exploded = exploded.with_column(ColumnDef::new(spec.target.clone(), ColumnKind::Text), tokens)?;

    log_success_indent(
        format!("{} → {}: {} → {} rows", spec.source, spec.target, table.row_count(), exploded.row_count()),
        1,
    );

    Ok(ExplodedView {
        source_column: spec.source.clone(),
        target_column: spec.target.clone(),
        source_rows,
        table: exploded,
    })
}

/// Run every spec against the same table, in spec order.
///
/// With `parallel`, each explosion runs on its own scoped thread; the output
/// is identical to the sequential run.
pub fn explode_all(table: &Table, specs: &[ExplodeSpec], parallel: bool) -> PipelineResult<Vec<ExplodedView>> {
    let views = if parallel && specs.len() > 1 {
        std::thread::scope(|scope| {
            let handles: Vec<_> = specs
                .iter()
                .map(|spec| scope.spawn(move || explode(table, spec)))
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect::<PipelineResult<Vec<_>>>()
        })?
    } else {
        specs
            .iter()
            .map(|spec| explode(table, spec))
            .collect::<PipelineResult<Vec<_>>>()?
    };

    log_success(format!("Exploded {} columns", views.len()));
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::Schema;

    fn movies(genres: &[Cell]) -> Table {
        let schema = Schema::new(vec![
            ColumnDef::new("original_title", ColumnKind::Text),
            ColumnDef::new("budget", ColumnKind::Integer),
            ColumnDef::new("genres", ColumnKind::MultiText),
        ])
        .unwrap();
        let rows = genres
            .iter()
            .enumerate()
            .map(|(i, g)| vec![Cell::text(format!("Movie {}", i)), Cell::Int(i as i64 * 100), g.clone()])
            .collect();
        Table::from_rows(schema, rows).unwrap()
    }

    fn spec() -> ExplodeSpec {
        ExplodeSpec::new("genres", "genre")
    }

    #[test]
    fn test_rows_per_source_row() {
        crate::logs::set_quiet(true);
        let table = movies(&[Cell::text("Action|Drama"), Cell::text("Comedy"), Cell::text("A|B|C")]);
        let view = explode(&table, &spec()).unwrap();

        assert_eq!(view.row_count(), 6);
        assert_eq!(view.source_rows, vec![0, 0, 1, 2, 2, 2]);
        assert_eq!(
            view.tokens().collect::<Vec<_>>(),
            vec!["Action", "Drama", "Comedy", "A", "B", "C"]
        );

        for (out_row, src_row) in view.source_rows.iter().enumerate() {
            assert_eq!(
                view.table.cell(out_row, "budget"),
                table.cell(*src_row, "budget")
            );
            assert_eq!(
                view.table.cell(out_row, "original_title"),
                table.cell(*src_row, "original_title")
            );
        }
    }

    #[test]
    fn test_source_removed_target_appended() {
        crate::logs::set_quiet(true);
        let view = explode(&movies(&[Cell::text("Drama")]), &spec()).unwrap();
        assert_eq!(view.table.schema().names(), vec!["original_title", "budget", "genre"]);
        assert_eq!(view.table.schema().column("genre").unwrap().kind, ColumnKind::Text);
    }

    #[test]
    fn test_empty_field_yields_one_empty_token() {
        crate::logs::set_quiet(true);
        let view = explode(&movies(&[Cell::text("")]), &spec()).unwrap();
        assert_eq!(view.row_count(), 1);
        assert_eq!(view.table.cell(0, "genre"), Some(&Cell::text("")));
    }

    #[test]
    fn test_null_field_is_invariant_violation() {
        crate::logs::set_quiet(true);
        let err = explode(&movies(&[Cell::text("Drama"), Cell::Null]), &spec()).unwrap_err();
        match err {
            PipelineError::InvariantViolation(e) => {
                assert_eq!(e.row, 1);
                assert_eq!(e.column, "genres");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_target_collision() {
        crate::logs::set_quiet(true);
        let spec = ExplodeSpec::new("genres", "budget");
        let err = explode(&movies(&[Cell::text("Drama")]), &spec).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(SchemaError::ColumnExists(_))));
    }

    #[test]
    fn test_numeric_source_rejected() {
        crate::logs::set_quiet(true);
        let spec = ExplodeSpec::new("budget", "budget_token");
        let err = explode(&movies(&[Cell::text("Drama")]), &spec).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(SchemaError::WrongKind { .. })));
    }

    #[test]
    fn test_custom_delimiter() {
        assert_eq!(split_tokens("a;b", ";"), vec!["a", "b"]);
        assert_eq!(split_tokens("a|b", ";"), vec!["a|b"]);
        assert_eq!(split_tokens("a||b", "|"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        crate::logs::set_quiet(true);
        let table = movies(&[Cell::text("Action|Drama"), Cell::text("Comedy")]);
        let specs = vec![spec(), ExplodeSpec::new("original_title", "title_word").with_delimiter(" ")];

        let sequential = explode_all(&table, &specs, false).unwrap();
        let parallel = explode_all(&table, &specs, true).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[1].row_count(), 4);
    }
}

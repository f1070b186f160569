//! Read-only aggregations over a [`Table`].
//!
//! Frequency rankings, per-group rankings, numeric pairs for scatter
//! comparisons, largest-N selection and numeric summaries. None of these
//! fail on an empty table; they return empty results instead.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PipelineResult, SchemaResult};
use crate::models::{to_cells, Cell, CellKey, ColumnKind, Table};

/// Name of the per-group row count in grouped frames.
const COUNT_COLUMN: &str = "__count";

// =============================================================================
// Frequencies
// =============================================================================

/// Ordering of values with equal counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Value seen first in the table comes first
    #[default]
    FirstSeen,
    /// Values compared by kind, then by value
    Lexicographic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frequency {
    pub value: Cell,
    pub count: usize,
}

/// Count of each distinct non-null value, most frequent first.
pub fn value_counts(table: &Table, column: &str, tie_break: TieBreak) -> PipelineResult<Vec<Frequency>> {
    let kind = column_kind(table, column)?;
    let counts = table
        .series(column)?
        .drop_nulls()
        .into_frame()
        .lazy()
        .group_by_stable([col(column)])
        .agg([len().alias(COUNT_COLUMN)])
        .collect()?;

    let values = cells_of(&counts, column, &kind)?;
    let mut freqs: Vec<Frequency> = values
        .into_iter()
        .zip(counts_of(&counts)?)
        .map(|(value, count)| Frequency { value, count })
        .collect();
    rank(&mut freqs, tie_break);
    Ok(freqs)
}

/// Most frequent first. Groups arrive in first-seen order, so a stable sort
/// keeps that order among equal counts.
fn rank(freqs: &mut [Frequency], tie_break: TieBreak) {
    freqs.sort_by(|a, b| {
        b.count.cmp(&a.count).then_with(|| match tie_break {
            TieBreak::FirstSeen => std::cmp::Ordering::Equal,
            TieBreak::Lexicographic => a.value.key().cmp(&b.value.key()),
        })
    });
}

/// Top values of one column within one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTopK {
    pub group: Cell,
    pub top: Vec<Frequency>,
}

/// The `k` most frequent `value_column` values within each `group_column` group.
///
/// Groups follow the category's label order when the group column is
/// categorical, otherwise `tie_break` order. Rows with a null group are skipped.
pub fn grouped_top_k(
    table: &Table,
    group_column: &str,
    value_column: &str,
    k: usize,
    tie_break: TieBreak,
) -> PipelineResult<Vec<GroupTopK>> {
    let group_kind = column_kind(table, group_column)?;
    let value_kind = column_kind(table, value_column)?;

    let counts = table
        .select(&[group_column, value_column])?
        .to_frame()?
        .lazy()
        .filter(col(group_column).is_not_null().and(col(value_column).is_not_null()))
        .group_by_stable([col(group_column), col(value_column)])
        .agg([len().alias(COUNT_COLUMN)])
        .collect()?;

    let groups = cells_of(&counts, group_column, &group_kind)?;
    let values = cells_of(&counts, value_column, &value_kind)?;
    let totals = counts_of(&counts)?;

    let mut position: HashMap<CellKey<'_>, usize> = HashMap::new();
    let mut result: Vec<GroupTopK> = Vec::new();
    for ((group, value), count) in groups.iter().zip(values).zip(totals) {
        let idx = *position.entry(group.key()).or_insert_with(|| {
            result.push(GroupTopK {
                group: group.clone(),
                top: Vec::new(),
            });
            result.len() - 1
        });
        result[idx].top.push(Frequency { value, count });
    }

    match (&group_kind, tie_break) {
        (ColumnKind::Category { .. }, _) => result.sort_by_key(|g| {
            g.group
                .as_str()
                .and_then(|label| group_kind.label_rank(label))
                .unwrap_or(usize::MAX)
        }),
        (_, TieBreak::Lexicographic) => result.sort_by(|a, b| a.group.key().cmp(&b.group.key())),
        (_, TieBreak::FirstSeen) => {}
    }

    for group in &mut result {
        rank(&mut group.top, tie_break);
        group.top.truncate(k);
    }
    Ok(result)
}

fn column_kind(table: &Table, column: &str) -> SchemaResult<ColumnKind> {
    let idx = table.schema().require(column)?;
    Ok(table.schema().columns()[idx].kind.clone())
}

fn cells_of(frame: &DataFrame, column: &str, kind: &ColumnKind) -> PolarsResult<Vec<Cell>> {
    to_cells(kind, frame.column(column)?.as_materialized_series())
}

fn counts_of(frame: &DataFrame) -> PolarsResult<Vec<usize>> {
    let counts = frame.column(COUNT_COLUMN)?.cast(&DataType::UInt64)?;
    Ok(counts
        .u64()?
        .into_iter()
        .map(|c| c.unwrap_or(0) as usize)
        .collect())
}

// =============================================================================
// Numeric queries
// =============================================================================

/// Paired values of two numeric columns, for a scatter comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bivariate {
    pub x: String,
    pub y: String,
    pub pairs: Vec<(f64, f64)>,
    /// Pearson correlation; `None` with fewer than two pairs or zero variance
    pub pearson: Option<f64>,
}

/// `(x, y)` for every row where both are present, in row order.
pub fn bivariate(table: &Table, x: &str, y: &str) -> SchemaResult<Bivariate> {
    let xs = numeric_column(table, x)?;
    let ys = numeric_column(table, y)?;

    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(a, b)| Some((a.as_f64()?, b.as_f64()?)))
        .collect();
    let pearson = pearson(&pairs);

    Ok(Bivariate {
        x: x.to_string(),
        y: y.to_string(),
        pairs,
        pearson,
    })
}

pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// The `n` rows with the largest `column` values, largest first.
/// Equal values keep table order; nulls are never selected.
pub fn top_n(table: &Table, column: &str, n: usize) -> SchemaResult<Table> {
    let cells = numeric_column(table, column)?;
    let mut ranked: Vec<(usize, f64)> = cells
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.as_f64().map(|v| (i, v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let indices: Vec<usize> = ranked.into_iter().take(n).map(|(i, _)| i).collect();
    Ok(table.take_rows(&indices))
}

/// Summary statistics of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` for a single value
    pub std: Option<f64>,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

/// Summary of the non-null values of `column`; `None` if there are none.
pub fn describe(table: &Table, column: &str) -> PipelineResult<Option<Summary>> {
    table.schema().require_numeric(column)?;
    let series = table.series(column)?.drop_nulls().cast(&DataType::Float64)?;
    let values = series.f64()?;
    let count = values.len();
    if count == 0 {
        return Ok(None);
    }

    let quantile = |q: f64| -> PolarsResult<f64> {
        Ok(values.quantile(q, QuantileMethod::Linear)?.unwrap_or(f64::NAN))
    };

    Ok(Some(Summary {
        column: column.to_string(),
        count,
        mean: values.mean().unwrap_or(f64::NAN),
        std: if count > 1 { values.std(1) } else { None },
        min: values.min().unwrap_or(f64::NAN),
        q25: quantile(0.25)?,
        median: quantile(0.5)?,
        q75: quantile(0.75)?,
        max: values.max().unwrap_or(f64::NAN),
    }))
}

/// Summaries of every numeric column, in schema order.
pub fn describe_all(table: &Table) -> Vec<Summary> {
    table
        .schema()
        .columns()
        .iter()
        .filter(|def| def.kind.is_numeric())
        .filter_map(|def| describe(table, &def.name).ok().flatten())
        .collect()
}

fn numeric_column<'a>(table: &'a Table, column: &str) -> SchemaResult<&'a [Cell]> {
    table.schema().require_numeric(column)?;
    table.column(column)
}

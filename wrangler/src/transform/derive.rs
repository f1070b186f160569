//! Derivation: profit, profitability ratio, revenue tier and decade.
//!
//! Runs on a cleaned table, so every input field is present. Adds four
//! columns and never removes a row.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, InvariantViolationError, PipelineResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{columns, Cell, ColumnDef, ColumnKind, Table};
use crate::options::PipelineOptions;
use crate::validation::validate_loaded;

/// Added to revenue before dividing, so zero-revenue rows yield a ratio of 0.
pub const RATIO_EPSILON: f64 = 0.0001;

// =============================================================================
// Bins
// =============================================================================

/// Labeled numeric ranges.
///
/// Label `i` covers the half-open interval `(edges[i], edges[i + 1]]`: the
/// lowest edge itself belongs to no bin, and a value equal to an inner edge
/// falls in the lower bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bins {
    pub edges: Vec<f64>,
    pub labels: Vec<String>,
}

impl Bins {
    pub fn new(edges: Vec<f64>, labels: Vec<String>) -> ConfigResult<Self> {
        let bins = Self { edges, labels };
        bins.validate("bins")?;
        Ok(bins)
    }

    /// Revenue tiers: under a million, millions, billions.
    pub fn revenue_tiers() -> Self {
        Self {
            edges: vec![0.0, 1e6, 1e9, 2.827124e9],
            labels: labels(&["under_million", "millions", "billions"]),
        }
    }

    /// Release decades from 1960 through 2015.
    pub fn decades() -> Self {
        Self {
            edges: vec![1959.0, 1970.0, 1980.0, 1990.0, 2000.0, 2010.0, 2015.0],
            labels: labels(&[
                "sixties",
                "seventies",
                "eighties",
                "nineties",
                "two_thousands",
                "two_thousand_tens",
            ]),
        }
    }

    /// Edges must be finite and strictly increasing, with one more edge than labels.
    pub fn validate(&self, name: &str) -> ConfigResult<()> {
        let invalid = |message: String| ConfigError::InvalidBins {
            name: name.to_string(),
            message,
        };

        if self.labels.is_empty() {
            return Err(invalid("at least one label is required".to_string()));
        }
        if self.edges.len() != self.labels.len() + 1 {
            return Err(invalid(format!(
                "{} edges for {} labels (need labels + 1)",
                self.edges.len(),
                self.labels.len()
            )));
        }
        if self.edges.iter().any(|e| !e.is_finite()) {
            return Err(invalid("edges must be finite".to_string()));
        }
        if self.edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("edges must be strictly increasing".to_string()));
        }
        Ok(())
    }

    /// Label of the bin containing `value`, or `None` if it is out of range.
    pub fn assign(&self, value: f64) -> Option<&str> {
        self.edges
            .windows(2)
            .zip(&self.labels)
            .find(|(w, _)| value > w[0] && value <= w[1])
            .map(|(_, label)| label.as_str())
    }

    pub fn column_kind(&self) -> ColumnKind {
        ColumnKind::Category {
            labels: self.labels.clone(),
        }
    }
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Derivation
// =============================================================================

/// Counters reported by [`derive`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeriveReport {
    /// Negative ratios clamped to 0 (always 0 when profit is non-negative)
    pub clamped_ratios: usize,
    /// Rows whose revenue fell in no tier and got the backfill label
    pub backfilled_ratings: usize,
    /// Rows whose release year fell in no decade (left null)
    pub unlabeled_decades: usize,
}

/// `max(0, revenue - budget)`.
pub fn profit(revenue: i64, budget: i64) -> i64 {
    revenue.saturating_sub(budget).max(0)
}

/// Integer percentage of revenue kept as profit, truncated toward zero.
pub fn profitability_ratio(profit: i64, revenue: i64) -> i64 {
    ((profit as f64 / (revenue as f64 + RATIO_EPSILON)) * 100.0) as i64
}

/// Add `profit`, `profitability_ratio`, `revenue_rating` and `decades`.
pub fn derive(table: Table, options: &PipelineOptions) -> PipelineResult<(Table, DeriveReport)> {
    log_info("➕ Deriving columns...");
    validate_loaded(table.schema())?;

    let revenue = integer_column(&table, columns::REVENUE)?;
    let budget = integer_column(&table, columns::BUDGET)?;
    let years = integer_column(&table, columns::RELEASE_YEAR)?;

    let mut report = DeriveReport::default();

    let profits: Vec<i64> = revenue
        .iter()
        .zip(&budget)
        .map(|(r, b)| profit(*r, *b))
        .collect();

    let ratios: Vec<Cell> = profits
        .iter()
        .zip(&revenue)
        .map(|(p, r)| {
            let ratio = profitability_ratio(*p, *r);
            if ratio < 0 {
                report.clamped_ratios += 1;
                Cell::Int(0)
            } else {
                Cell::Int(ratio)
            }
        })
        .collect();

    let ratings: Vec<Cell> = revenue
        .iter()
        .map(|r| match options.revenue_bins.assign(*r as f64) {
            Some(label) => Cell::text(label),
            None => {
                report.backfilled_ratings += 1;
                Cell::text(options.revenue_backfill.as_str())
            }
        })
        .collect();

    let decades: Vec<Cell> = years
        .iter()
        .map(|y| match options.decade_bins.assign(*y as f64) {
            Some(label) => Cell::text(label),
            None => {
                report.unlabeled_decades += 1;
                Cell::Null
            }
        })
        .collect();

    let mut rating_kind = options.revenue_bins.column_kind();
    if let ColumnKind::Category { labels } = &mut rating_kind {
        if !labels.contains(&options.revenue_backfill) {
            labels.push(options.revenue_backfill.clone());
        }
    }

    let table = table
        .with_column(
            ColumnDef::new(columns::PROFIT, ColumnKind::Integer),
            profits.into_iter().map(Cell::Int).collect(),
        )?
        .with_column(ColumnDef::new(columns::PROFITABILITY_RATIO, ColumnKind::Integer), ratios)?
        .with_column(ColumnDef::new(columns::REVENUE_RATING, rating_kind), ratings)?
        .with_column(ColumnDef::new(columns::DECADES, options.decade_bins.column_kind()), decades)?;

    if report.clamped_ratios > 0 {
        log_warning(format!("{} negative profitability ratios clamped to 0", report.clamped_ratios));
    }
    log_success(format!(
        "{} revenue ratings backfilled to '{}'",
        report.backfilled_ratings, options.revenue_backfill
    ));
    if report.unlabeled_decades > 0 {
        log_warning(format!("{} release years outside every decade", report.unlabeled_decades));
    }

    Ok((table, report))
}

/// Values of a non-null integer column.
fn integer_column(table: &Table, name: &str) -> PipelineResult<Vec<i64>> {
    let cells = table.column(name)?;
    cells
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            cell.as_i64().ok_or_else(|| {
                InvariantViolationError {
                    stage: "derive",
                    column: name.to_string(),
                    row,
                    message: format!("expected an integer, found '{}'", cell),
                }
                .into()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Schema;
    use crate::validation::{expected_kind, REQUIRED_LOADED_COLUMNS};

    /// Loaded-schema table with one row per (budget, revenue, year).
    fn table(rows: &[(i64, i64, i64)]) -> Table {
        let schema = Schema::new(
            REQUIRED_LOADED_COLUMNS
                .iter()
                .map(|name| ColumnDef::new(*name, expected_kind(name).unwrap()))
                .collect(),
        )
        .unwrap();
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, (budget, revenue, year))| {
                schema
                    .columns()
                    .iter()
                    .map(|def| match def.name.as_str() {
                        columns::BUDGET => Cell::Int(*budget),
                        columns::REVENUE => Cell::Int(*revenue),
                        columns::RELEASE_YEAR => Cell::Int(*year),
                        columns::ORIGINAL_TITLE => Cell::text(format!("Movie {}", i)),
                        _ => match def.kind {
                            ColumnKind::Integer => Cell::Int(1),
                            ColumnKind::Float => Cell::Float(1.0),
                            _ => Cell::text("x"),
                        },
                    })
                    .collect()
            })
            .collect();
        Table::from_rows(schema, rows).unwrap()
    }

    fn run(rows: &[(i64, i64, i64)]) -> (Table, DeriveReport) {
        crate::logs::set_quiet(true);
        derive(table(rows), &PipelineOptions::default()).unwrap()
    }

    #[test]
    fn test_profit_never_negative() {
        let (derived, _) = run(&[(100, 0, 2000), (100, 250, 2000), (300, 250, 2000)]);
        let profits: Vec<i64> = derived
            .column("profit")
            .unwrap()
            .iter()
            .filter_map(Cell::as_i64)
            .collect();
        assert_eq!(profits, vec![0, 150, 0]);
    }

    #[test]
    fn test_ratio_range_and_no_clamping() {
        let (derived, report) = run(&[
            (100, 0, 2000),
            (0, 0, 2000),
            (0, 1_000_000, 2000),
            (250, 1000, 2000),
            (5000, 1000, 2000),
        ]);
        assert_eq!(report.clamped_ratios, 0);

        let ratios: Vec<i64> = derived
            .column("profitability_ratio")
            .unwrap()
            .iter()
            .filter_map(Cell::as_i64)
            .collect();
        assert!(ratios.iter().all(|r| (0..=100).contains(r)));
        // 1_000_000 / 1_000_000.0001 * 100 truncates to 99
        assert_eq!(ratios, vec![0, 0, 99, 74, 0]);
    }

    #[test]
    fn test_zero_revenue_scenario() {
        let (derived, report) = run(&[(100, 0, 2000)]);
        assert_eq!(derived.cell(0, "profit"), Some(&Cell::Int(0)));
        assert_eq!(derived.cell(0, "profitability_ratio"), Some(&Cell::Int(0)));
        assert_eq!(derived.cell(0, "revenue_rating"), Some(&Cell::text("under_million")));
        assert_eq!(report.backfilled_ratings, 1);
    }

    #[test]
    fn test_revenue_tiers() {
        let (derived, report) = run(&[
            (0, 1, 2000),
            (0, 1_000_000, 2000),
            (0, 1_000_001, 2000),
            (0, 1_000_000_000, 2000),
            (0, 2_827_124_000, 2000),
        ]);
        let ratings: Vec<&str> = derived
            .column("revenue_rating")
            .unwrap()
            .iter()
            .filter_map(Cell::as_str)
            .collect();
        assert_eq!(
            ratings,
            vec!["under_million", "under_million", "millions", "millions", "billions"]
        );
        assert_eq!(report.backfilled_ratings, 0);
    }

    #[test]
    fn test_decades_without_backfill() {
        let (derived, report) = run(&[(0, 0, 1959), (0, 0, 1960), (0, 0, 1970), (0, 0, 1971), (0, 0, 2015), (0, 0, 2016)]);
        let decades: Vec<Cell> = derived.column("decades").unwrap().to_vec();
        assert_eq!(
            decades,
            vec![
                Cell::Null,
                Cell::text("sixties"),
                Cell::text("sixties"),
                Cell::text("seventies"),
                Cell::text("two_thousand_tens"),
                Cell::Null,
            ]
        );
        assert_eq!(report.unlabeled_decades, 2);
    }

    #[test]
    fn test_no_rows_removed_and_columns_appended() {
        let (derived, _) = run(&[(1, 2, 2001), (3, 4, 2002)]);
        assert_eq!(derived.row_count(), 2);
        let names = derived.schema().names();
        assert_eq!(
            &names[names.len() - 4..],
            &["profit", "profitability_ratio", "revenue_rating", "decades"]
        );
    }

    #[test]
    fn test_bins_assign_edges() {
        let bins = Bins::revenue_tiers();
        assert_eq!(bins.assign(0.0), None);
        assert_eq!(bins.assign(-5.0), None);
        assert_eq!(bins.assign(1e6), Some("under_million"));
        assert_eq!(bins.assign(2.827124e9), Some("billions"));
        assert_eq!(bins.assign(3e9), None);
        assert_eq!(bins.assign(f64::NAN), None);
    }

    #[test]
    fn test_bins_validation() {
        assert!(Bins::new(vec![0.0, 1.0], vec!["a".into()]).is_ok());
        assert!(Bins::new(vec![0.0, 1.0], vec!["a".into(), "b".into()]).is_err());
        assert!(Bins::new(vec![1.0, 1.0], vec!["a".into()]).is_err());
        assert!(Bins::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_custom_backfill_label_added_to_categories() {
        crate::logs::set_quiet(true);
        let options = PipelineOptions {
            revenue_backfill: "unknown".to_string(),
            ..PipelineOptions::default()
        };
        let (derived, _) = derive(table(&[(0, 0, 2000)]), &options).unwrap();
        let kind = &derived.schema().column("revenue_rating").unwrap().kind;
        assert_eq!(kind.label_rank("unknown"), Some(3));
        assert_eq!(derived.cell(0, "revenue_rating"), Some(&Cell::text("unknown")));
    }
}

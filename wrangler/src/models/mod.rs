//! Domain models for the wrangling pipeline.
//!
//! - [`Cell`] - one typed field value
//! - [`ColumnKind`] - semantic type of a column
//! - [`Schema`] - ordered, uniquely named column definitions
//! - [`Table`] - columnar storage of rows sharing one schema

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SchemaError, SchemaResult};

mod frame;
mod table;

pub(crate) use frame::to_cells;
pub use table::{Row, Table};

/// Column names of the TMDB movie export and of the derived columns.
pub mod columns {
    pub const ID: &str = "id";
    pub const IMDB_ID: &str = "imdb_id";
    pub const POPULARITY: &str = "popularity";
    pub const BUDGET: &str = "budget";
    pub const REVENUE: &str = "revenue";
    pub const ORIGINAL_TITLE: &str = "original_title";
    pub const CAST: &str = "cast";
    pub const HOMEPAGE: &str = "homepage";
    pub const DIRECTOR: &str = "director";
    pub const TAGLINE: &str = "tagline";
    pub const KEYWORDS: &str = "keywords";
    pub const OVERVIEW: &str = "overview";
    pub const RUNTIME: &str = "runtime";
    pub const GENRES: &str = "genres";
    pub const PRODUCTION_COMPANIES: &str = "production_companies";
    pub const RELEASE_DATE: &str = "release_date";
    pub const VOTE_COUNT: &str = "vote_count";
    pub const VOTE_AVERAGE: &str = "vote_average";
    pub const RELEASE_YEAR: &str = "release_year";
    pub const BUDGET_ADJ: &str = "budget_adj";
    pub const REVENUE_ADJ: &str = "revenue_adj";

    // Added by the loader
    pub const RELEASE_DAY: &str = "release_day";
    pub const RELEASE_MONTH: &str = "release_month";

    // Added by derivation
    pub const PROFIT: &str = "profit";
    pub const PROFITABILITY_RATIO: &str = "profitability_ratio";
    pub const REVENUE_RATING: &str = "revenue_rating";
    pub const DECADES: &str = "decades";
}

// =============================================================================
// Cell
// =============================================================================

/// A single field value.
///
/// Categorical labels are stored as `Text`; a missing label is `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view of the cell; `None` for text and nulls.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Hashable identity of the cell. Floats compare by bit pattern so that
    /// equal values written the same way always deduplicate.
    pub fn key(&self) -> CellKey<'_> {
        match self {
            Cell::Null => CellKey::Null,
            Cell::Int(i) => CellKey::Int(*i),
            Cell::Float(f) => CellKey::Float(f.to_bits()),
            Cell::Text(s) => CellKey::Text(s),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Borrowed, hashable form of a [`Cell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey<'a> {
    Null,
    Int(i64),
    Float(u64),
    Text(&'a str),
}

// =============================================================================
// Column kinds
// =============================================================================

/// Semantic type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    /// Text holding several values joined by a delimiter (genres, cast...)
    MultiText,
    /// Label from a fixed, ordered set
    Category { labels: Vec<String> },
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
            ColumnKind::MultiText => "multi-valued text",
            ColumnKind::Category { .. } => "category",
        }
    }

    /// Position of a label in a category's declared order.
    pub fn label_rank(&self, label: &str) -> Option<usize> {
        match self {
            ColumnKind::Category { labels } => labels.iter().position(|l| l == label),
            _ => None,
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self { name: name.into(), kind }
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Ordered set of uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> SchemaResult<Self> {
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(SchemaError::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Index of `name`, or [`SchemaError::MissingColumn`].
    pub fn require(&self, name: &str) -> SchemaResult<usize> {
        self.index_of(name)
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))
    }

    /// Index of a numeric column, or the matching schema error.
    pub fn require_numeric(&self, name: &str) -> SchemaResult<usize> {
        let idx = self.require(name)?;
        let kind = &self.columns[idx].kind;
        if !kind.is_numeric() {
            return Err(SchemaError::WrongKind {
                column: name.to_string(),
                expected: "numeric".to_string(),
                actual: kind.name().to_string(),
            });
        }
        Ok(idx)
    }

    pub(crate) fn push(&mut self, column: ColumnDef) -> SchemaResult<()> {
        if self.contains(&column.name) {
            return Err(SchemaError::ColumnExists(column.name));
        }
        self.columns.push(column);
        Ok(())
    }

    pub(crate) fn remove(&mut self, idx: usize) -> ColumnDef {
        self.columns.remove(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_column_rejected() {
        let result = Schema::new(vec![
            ColumnDef::new("budget", ColumnKind::Integer),
            ColumnDef::new("budget", ColumnKind::Float),
        ]);
        assert_eq!(result, Err(SchemaError::DuplicateColumn("budget".into())));
    }

    #[test]
    fn test_require_numeric() {
        let schema = Schema::new(vec![
            ColumnDef::new("budget", ColumnKind::Integer),
            ColumnDef::new("original_title", ColumnKind::Text),
        ])
        .unwrap();

        assert_eq!(schema.require_numeric("budget"), Ok(0));
        assert!(matches!(
            schema.require_numeric("original_title"),
            Err(SchemaError::WrongKind { .. })
        ));
        assert_eq!(
            schema.require_numeric("revenue"),
            Err(SchemaError::MissingColumn("revenue".into()))
        );
    }

    #[test]
    fn test_cell_keys_distinguish_types() {
        assert_ne!(Cell::Int(1).key(), Cell::Float(1.0).key());
        assert_eq!(Cell::Float(0.5).key(), Cell::Float(0.5).key());
        assert_eq!(Cell::text("a").key(), CellKey::Text("a"));
    }

    #[test]
    fn test_cell_display_and_serialize() {
        assert_eq!(Cell::Null.to_string(), "");
        assert_eq!(Cell::Float(1.5).to_string(), "1.5");
        assert_eq!(serde_json::to_value(Cell::Null).unwrap(), serde_json::Value::Null);
        assert_eq!(serde_json::to_value(Cell::Int(3)).unwrap(), serde_json::json!(3));
    }

    #[test]
    fn test_label_rank() {
        let kind = ColumnKind::Category {
            labels: vec!["sixties".into(), "seventies".into()],
        };
        assert_eq!(kind.label_rank("seventies"), Some(1));
        assert_eq!(kind.label_rank("eighties"), None);
        assert_eq!(ColumnKind::Text.label_rank("x"), None);
    }
}

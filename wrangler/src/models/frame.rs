//! Conversion between typed cells and polars series.
//!
//! Integer columns become `Int64`, float columns `Float64`, and every text
//! kind (including categories) `String`. Nulls map to polars nulls both ways.

use polars::prelude::*;

use super::{Cell, ColumnKind};

/// Build a series named `name` from the cells of one column.
pub(crate) fn to_series(name: &str, kind: &ColumnKind, cells: &[Cell]) -> Series {
    let name = PlSmallStr::from(name);
    match kind {
        ColumnKind::Integer => Series::new(name, cells.iter().map(Cell::as_i64).collect::<Vec<_>>()),
        ColumnKind::Float => Series::new(name, cells.iter().map(Cell::as_f64).collect::<Vec<_>>()),
        ColumnKind::Text | ColumnKind::MultiText | ColumnKind::Category { .. } => {
            Series::new(name, cells.iter().map(Cell::as_str).collect::<Vec<_>>())
        }
    }
}

/// Read a series back as cells of `kind`.
pub(crate) fn to_cells(kind: &ColumnKind, series: &Series) -> PolarsResult<Vec<Cell>> {
    let cells = match kind {
        ColumnKind::Integer => series
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Int))
            .collect(),
        ColumnKind::Float => series
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Float))
            .collect(),
        ColumnKind::Text | ColumnKind::MultiText | ColumnKind::Category { .. } => series
            .str()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::text))
            .collect(),
    };
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_dtypes_follow_kind() {
        let ints = to_series("budget", &ColumnKind::Integer, &[Cell::Int(1), Cell::Null]);
        assert_eq!(ints.dtype(), &DataType::Int64);
        assert_eq!(ints.null_count(), 1);

        let labels = ColumnKind::Category {
            labels: vec!["sixties".into()],
        };
        let text = to_series("decades", &labels, &[Cell::text("sixties")]);
        assert_eq!(text.dtype(), &DataType::String);
        assert_eq!(text.name().as_str(), "decades");
    }

    #[test]
    fn test_cells_survive_series() {
        let cells = vec![Cell::Float(0.5), Cell::Null, Cell::Float(-2.0)];
        let series = to_series("popularity", &ColumnKind::Float, &cells);
        assert_eq!(to_cells(&ColumnKind::Float, &series).unwrap(), cells);

        let cells = vec![Cell::text(" "), Cell::Null, Cell::text("")];
        let series = to_series("cast", &ColumnKind::MultiText, &cells);
        assert_eq!(to_cells(&ColumnKind::MultiText, &series).unwrap(), cells);
    }

    #[test]
    fn test_kind_mismatch_is_error() {
        let series = to_series("title", &ColumnKind::Text, &[Cell::text("Heat")]);
        assert!(to_cells(&ColumnKind::Integer, &series).is_err());
    }
}

//! Columnar table.

use polars::prelude::{Column, DataFrame, IntoLazy, PolarsResult, Series, UniqueKeepStrategy};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::io::Write;

use super::frame::{to_cells, to_series};
use super::{Cell, ColumnDef, Schema};
use crate::error::{InvariantViolationError, PipelineResult, SchemaResult};

/// Ordered rows sharing one [`Schema`], stored one vector per column.
///
/// Row identity is positional and only meaningful within one instance.
/// Every transformation returns a new table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    columns: Vec<Vec<Cell>>,
    rows: usize,
}

impl Table {
    /// A table with the given schema and no rows.
    pub fn empty(schema: Schema) -> Self {
        let columns = vec![Vec::new(); schema.len()];
        Self { schema, columns, rows: 0 }
    }

    /// Build a table from row-major data. Every row must have one cell per column.
    pub fn from_rows(schema: Schema, rows: Vec<Vec<Cell>>) -> Result<Self, InvariantViolationError> {
        let mut table = Self::empty(schema);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub(crate) fn push_row(&mut self, row: Vec<Cell>) -> Result<(), InvariantViolationError> {
        if row.len() != self.schema.len() {
            return Err(InvariantViolationError {
                stage: "table",
                column: String::new(),
                row: self.rows,
                message: format!("row has {} cells, schema has {} columns", row.len(), self.schema.len()),
            });
        }
        for (column, cell) in self.columns.iter_mut().zip(row) {
            column.push(cell);
        }
        self.rows += 1;
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Cells of column `name`, in row order.
    pub fn column(&self, name: &str) -> SchemaResult<&[Cell]> {
        let idx = self.schema.require(name)?;
        Ok(&self.columns[idx])
    }

    pub fn column_at(&self, idx: usize) -> Option<&[Cell]> {
        self.columns.get(idx).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.schema.index_of(name)?;
        self.columns[idx].get(row)
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.rows).then_some(Row { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.rows).map(move |index| Row { table: self, index })
    }

    // -------------------------------------------------------------------------
    // Reshaping
    // -------------------------------------------------------------------------

    /// Projection onto `names`, in the given order.
    pub fn select(&self, names: &[&str]) -> SchemaResult<Table> {
        let mut defs = Vec::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let idx = self.schema.require(name)?;
            defs.push(self.schema.columns()[idx].clone());
            columns.push(self.columns[idx].clone());
        }
        Ok(Table {
            schema: Schema::new(defs)?,
            columns,
            rows: self.rows,
        })
    }

    /// Remove the named columns; names not in the schema are ignored.
    /// Returns the table and the names actually removed.
    pub fn drop_columns(mut self, names: &[String]) -> (Table, Vec<String>) {
        let mut dropped = Vec::new();
        for name in names {
            if let Some(idx) = self.schema.index_of(name) {
                self.schema.remove(idx);
                self.columns.remove(idx);
                dropped.push(name.clone());
            }
        }
        (self, dropped)
    }

    /// Remove one column and hand back its cells.
    pub(crate) fn take_column(mut self, name: &str) -> SchemaResult<(Table, ColumnDef, Vec<Cell>)> {
        let idx = self.schema.require(name)?;
        let def = self.schema.remove(idx);
        let cells = self.columns.remove(idx);
        Ok((self, def, cells))
    }

    /// Append a column. `cells` must have one entry per row.
    pub fn with_column(mut self, def: ColumnDef, cells: Vec<Cell>) -> PipelineResult<Table> {
        if cells.len() != self.rows {
            return Err(InvariantViolationError {
                stage: "table",
                column: def.name,
                row: cells.len(),
                message: format!("column has {} cells, table has {} rows", cells.len(), self.rows),
            }
            .into());
        }
        self.schema.push(def)?;
        self.columns.push(cells);
        Ok(self)
    }

    /// Rows at `indices`, in that order (indices may repeat).
    /// Out-of-range indices are skipped.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let indices: Vec<usize> = indices.iter().copied().filter(|&i| i < self.rows).collect();
        let columns = self
            .columns
            .iter()
            .map(|col| indices.iter().map(|&i| col[i].clone()).collect())
            .collect();
        Table {
            schema: self.schema.clone(),
            columns,
            rows: indices.len(),
        }
    }

    /// Rows not equal (on all columns) to an earlier row, in table order.
    pub fn unique_rows(&self) -> PipelineResult<Table> {
        if self.schema.is_empty() {
            return Ok(self.clone());
        }
        let frame = self
            .to_frame()?
            .lazy()
            .unique_stable(None, UniqueKeepStrategy::First)
            .collect()?;
        Table::from_frame(self.schema.clone(), &frame)
    }

    /// Rows without a null field, in table order.
    pub fn complete_rows(&self) -> PipelineResult<Table> {
        if self.schema.is_empty() {
            return Ok(self.clone());
        }
        let frame = self.to_frame()?.lazy().drop_nulls(None).collect()?;
        Table::from_frame(self.schema.clone(), &frame)
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Null count per column, in schema order.
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.schema
            .columns()
            .iter()
            .zip(&self.columns)
            .map(|(def, col)| (def.name.clone(), col.iter().filter(|c| c.is_null()).count()))
            .collect()
    }

    pub fn total_nulls(&self) -> usize {
        self.columns
            .iter()
            .map(|col| col.iter().filter(|c| c.is_null()).count())
            .sum()
    }

    /// Rows equal to an earlier row.
    pub fn duplicate_count(&self) -> PipelineResult<usize> {
        Ok(self.rows - self.unique_rows()?.row_count())
    }

    /// Number of distinct non-null values in a column.
    pub fn unique_count(&self, name: &str) -> PipelineResult<usize> {
        Ok(self.series(name)?.drop_nulls().n_unique()?)
    }

    // -------------------------------------------------------------------------
    // Dataframe bridge
    // -------------------------------------------------------------------------

    /// Column `name` as a polars series.
    pub fn series(&self, name: &str) -> SchemaResult<Series> {
        let idx = self.schema.require(name)?;
        Ok(to_series(name, &self.schema.columns()[idx].kind, &self.columns[idx]))
    }

    /// The whole table as a polars frame, one series per column.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<Column> = self
            .schema
            .columns()
            .iter()
            .zip(&self.columns)
            .map(|(def, cells)| to_series(&def.name, &def.kind, cells).into())
            .collect();
        DataFrame::new(columns)
    }

    /// Read `frame` back under `schema`. Every schema column must be in the
    /// frame with the dtype its kind maps to; extra frame columns are ignored.
    pub fn from_frame(schema: Schema, frame: &DataFrame) -> PipelineResult<Table> {
        let mut columns = Vec::with_capacity(schema.len());
        for def in schema.columns() {
            let series = frame.column(&def.name)?.as_materialized_series();
            columns.push(to_cells(&def.kind, series)?);
        }
        Ok(Table {
            schema,
            columns,
            rows: frame.height(),
        })
    }

    // -------------------------------------------------------------------------
    // Output
    // -------------------------------------------------------------------------

    /// Write the table as CSV with a header row. Nulls are written as empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.schema.names())?;
        for row in self.rows() {
            wtr.write_record(row.cells().map(|c| c.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Serialized as an array of `{column: value}` objects.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows))?;
        for row in self.rows() {
            seq.serialize_element(&row)?;
        }
        seq.end()
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, name: &str) -> Option<&'a Cell> {
        self.table.cell(self.index, name)
    }

    /// Cells in schema order.
    pub fn cells(&self) -> impl Iterator<Item = &'a Cell> + 'a {
        let table = self.table;
        let index = self.index;
        table.columns.iter().map(move |col| &col[index])
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.table.column_count()))?;
        for (def, cell) in self.table.schema.columns().iter().zip(self.cells()) {
            map.serialize_entry(&def.name, cell)?;
        }
        map.end()
    }
}

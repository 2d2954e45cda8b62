//! A named table with typed columns and row-major cells, written as CSV.

use std::{fmt, io::Write};

use ndarray::Array2;

use crate::error::{Result, TableError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    UInt16,
    UInt8,
    Float32,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
}

impl Column {
    pub fn new(name: &str, dtype: ColumnType) -> Column {
        Column { name: name.to_owned(), dtype }
    }

    pub fn float(name: &str) -> Column {
        Column::new(name, ColumnType::Float32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    UInt(u64),
    /// A one byte character code such as `b'Y'`
    Code(u8),
    Float(f32),
    Text(String),
}

impl Cell {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Cell::UInt(v) => Some(*v as f32),
            Cell::Code(v) => Some(*v as f32),
            Cell::Float(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::UInt(v) => write!(f, "{}", v),
            Cell::Code(v) => write!(f, "{}", *v as char),
            Cell::Float(v) if v.is_nan() => f.write_str("nan"),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Column headers plus row-major cells. A table with no rows and no
/// columns is the empty result of a run that could not be tabulated.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    columns: Vec<Column>,
    cells: Vec<Cell>,
}

impl Table {
    pub fn new(name: &str, columns: Vec<Column>) -> Table {
        Table { name: name.to_owned(), columns, cells: Vec::new() }
    }

    pub fn empty(name: &str) -> Table {
        Table::new(name, Vec::new())
    }

    /// Build a float table from a dense `rows x columns` matrix
    pub fn from_matrix(name: &str, headers: Vec<String>, data: &Array2<f32>) -> Result<Table> {
        if data.ncols() != headers.len() {
            return Err(TableError::InvalidColumnShape { expected: headers.len(), actual: data.ncols() });
        }
        let columns = headers.iter().map(|h| Column::float(h)).collect();
        let mut table = Table::new(name, columns);
        table.cells = data.iter().map(|&v| Cell::Float(v)).collect();

        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(TableError::InvalidColumnShape { expected: self.columns.len(), actual: row.len() });
        }
        self.cells.extend(row);

        Ok(())
    }

    /// Rows are only stored as cells, so a table without columns has none
    pub fn row_count(&self) -> usize {
        match self.columns.len() {
            0 => 0,
            n => self.cells.len() / n,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn row(&self, i: usize) -> &[Cell] {
        let n = self.columns.len();
        &self.cells[i * n..(i + 1) * n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        // chunks_exact panics on 0, and a table without columns has no cells
        self.cells.chunks_exact(self.columns.len().max(1))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let j = self.column_index(column)?;
        self.cells.get(row * self.columns.len() + j)
    }

    /// Numeric values of one column, `None` for unknown or text columns
    pub fn float_column(&self, column: &str) -> Option<Vec<f32>> {
        let j = self.column_index(column)?;
        self.rows().map(|row| row[j].as_f32()).collect()
    }

    /// Write a header line followed by one line per row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        if !self.columns.is_empty() {
            wtr.write_record(self.headers())?;
        }
        for row in self.rows() {
            wtr.write_record(row.iter().map(|c| c.to_string()))?;
        }
        wtr.flush()?;

        Ok(())
    }
}

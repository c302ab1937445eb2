use chrono::NaiveDateTime;
use serde::Serialize;
use std::borrow::Cow;

use crate::config::ColumnNames;
use crate::error::{Result, SamplerError};

/// A single spreadsheet value, passed through the pipeline with its type intact
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Build a text cell, mapping blank strings to `Empty`
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Canonical string used for grouping, matching and deduplication.
    ///
    /// Integral numbers render without a fractional part so that a code typed as
    /// `123` in one sheet and read back as `123.0` compares equal.
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            Cell::Empty => Cow::Borrowed(""),
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(format_number(*n)),
            Cell::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Cell::DateTime(dt) => Cow::Owned(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// In-memory table: ordered headers plus rows of exactly `headers.len()` cells
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from string rows; handy for fixtures and CSV-like sources
    pub fn from_strings(headers: &[&str], rows: &[Vec<&str>]) -> Self {
        let mut table = Table::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|v| Cell::from(*v)).collect());
        }
        table
    }

    /// Append a row, padding short rows with `Empty` and dropping cells past the last header
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// New table with the same headers and the rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Keep only rows for which `keep` returns true, preserving order
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Write a derived column, replacing an existing column of the same name in place
    /// or appending a new one. `values` must have one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(SamplerError::Internal(format!(
                "derived column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }
}

/// Positions of the four columns the pipeline reads, resolved once per table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub user_profile: usize,
    pub changed_using: usize,
    pub module: usize,
    pub external_code: usize,
}

impl ColumnMap {
    /// Resolve the configured header names against `table`
    pub fn resolve(table: &Table, names: &ColumnNames) -> Result<Self> {
        let find = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| SamplerError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            user_profile: find(&names.user_profile)?,
            changed_using: find(&names.changed_using)?,
            module: find(&names.module)?,
            external_code: find(&names.external_code)?,
        })
    }

    pub fn user_profile<'a>(&self, row: &'a [Cell]) -> Cow<'a, str> {
        row[self.user_profile].key()
    }

    pub fn changed_using<'a>(&self, row: &'a [Cell]) -> Cow<'a, str> {
        row[self.changed_using].key()
    }

    pub fn module<'a>(&self, row: &'a [Cell]) -> Cow<'a, str> {
        row[self.module].key()
    }

    pub fn external_code<'a>(&self, row: &'a [Cell]) -> Cow<'a, str> {
        row[self.external_code].key()
    }
}

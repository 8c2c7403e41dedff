//! Rectangular tables with typed columns.
//!
//! Tables are stored as "split" JSON:
//!
//! ```text
//! {"columns": ["station", "time"], "index": [0, 1], "data": [["PAS", "2019-07-06T03:20:00Z"], ...]}
//! ```
//!
//! Cells of timestamp columns are plain RFC 3339 strings; the names of those
//! columns travel next to the table so the strings can be parsed back. Every
//! other cell uses the tagged value encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::value::{format_timestamp, parse_timestamp, Value};
use crate::util::{Error, Result};

/// Column type tag computed when a table is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// At least one cell and every non-null cell is a timestamp
    Timestamp,
    /// Anything else
    General,
}

impl ColumnKind {
    pub fn of(values: &[Value]) -> Self {
        let mut non_null = values.iter().filter(|v| !v.is_null()).peekable();
        if non_null.peek().is_some() && non_null.all(|v| v.as_timestamp().is_some()) {
            Self::Timestamp
        } else {
            Self::General
        }
    }
}

/// A named column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// An ordered set of equally long columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataFrame {
    columns: Vec<Column>,
}

#[derive(Serialize, Deserialize)]
struct SplitTable {
    columns: Vec<String>,
    index: Vec<u64>,
    data: Vec<Vec<Json>>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, values)` pairs.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Result<Self> {
        let mut frame = Self::new();
        for (name, values) in columns {
            frame.push_column(name, values)?;
        }
        Ok(frame)
    }

    /// Append a column; it must match the existing row count and be uniquely named.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.column(&name).is_some() {
            return Err(Error::InvalidArgument(format!("duplicate column {:?}", name)));
        }
        if let Some(first) = self.columns.first() {
            if first.values.len() != values.len() {
                return Err(Error::InvalidArgument(format!(
                    "column {:?} has {} rows, table has {}",
                    name,
                    values.len(),
                    first.values.len()
                )));
            }
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.values.as_slice())
    }

    /// One row as a slice of cells, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// Names of timestamp columns, in column order.
    pub fn time_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| ColumnKind::of(&c.values) == ColumnKind::Timestamp)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Check every cell against the dictionary value rules.
    pub fn validate(&self) -> Result<()> {
        for column in &self.columns {
            for (row, value) in column.values.iter().enumerate() {
                value.validate(&format!("{}[{}]", column.name, row))?;
            }
        }
        Ok(())
    }

    /// Encode as (table JSON, time column name JSON). Call [`DataFrame::validate`] first.
    pub(crate) fn encode(&self) -> Result<(Vec<u8>, String)> {
        let kinds: Vec<ColumnKind> = self.columns.iter().map(|c| ColumnKind::of(&c.values)).collect();
        let mut data = Vec::with_capacity(self.num_rows());
        for row in 0..self.num_rows() {
            let mut cells = Vec::with_capacity(self.columns.len());
            for (column, kind) in self.columns.iter().zip(&kinds) {
                let cell = &column.values[row];
                cells.push(match (kind, cell) {
                    (ColumnKind::Timestamp, Value::Timestamp(ts)) => Json::String(format_timestamp(ts)),
                    _ => cell.to_json()?,
                });
            }
            data.push(cells);
        }

        let table = SplitTable {
            columns: self.columns.iter().map(|c| c.name.clone()).collect(),
            index: (0..self.num_rows() as u64).collect(),
            data,
        };
        let time_columns = serde_json::to_string(&self.time_columns())?;
        Ok((serde_json::to_vec(&table)?, time_columns))
    }

    /// Decode what [`DataFrame::encode`] wrote.
    pub(crate) fn decode(table: &[u8], time_columns: &str) -> Result<Self> {
        let table: SplitTable = serde_json::from_slice(table)?;
        let time_columns: Vec<String> = serde_json::from_str(time_columns)?;

        let mut columns: Vec<Column> = table
            .columns
            .into_iter()
            .map(|name| Column { name, values: Vec::with_capacity(table.index.len()) })
            .collect();
        let is_time: Vec<bool> = columns.iter().map(|c| time_columns.contains(&c.name)).collect();

        for (row, cells) in table.data.into_iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(Error::corrupt(format!(
                    "table row {} has {} cells for {} columns",
                    row,
                    cells.len(),
                    columns.len()
                )));
            }
            for ((column, time), cell) in columns.iter_mut().zip(&is_time).zip(cells) {
                let value = match (time, cell) {
                    (true, Json::String(s)) => Value::Timestamp(parse_timestamp(&s)?),
                    (true, Json::Null) => Value::Null,
                    (true, other) => {
                        return Err(Error::corrupt(format!(
                            "time column {:?} holds {}",
                            column.name, other
                        )));
                    }
                    (false, cell) => Value::from_tagged_json(cell)?,
                };
                column.values.push(value);
            }
        }

        let mut frame = Self::new();
        for column in columns {
            frame.push_column(column.name, column.values)?;
        }
        Ok(frame)
    }
}

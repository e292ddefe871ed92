//! Labelled tables stored as CSV with a header row and an index column

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;

/// A small labelled table: an index column plus named value columns.
///
/// Cells are JSON values. On read, cells are inferred as integer, float,
/// boolean, empty (null) or string, in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    index_name: String,
    columns: Vec<String>,
    index: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given column names.
    #[must_use]
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Name the index column (written as the first header field).
    #[must_use]
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the cell count differs from the column count.
    pub fn push_row(&mut self, index: impl Into<String>, cells: Vec<Value>) -> Result<()> {
        if cells.len() != self.columns.len() {
            return Err(Error::Decode(format!(
                "row has {} cells, table has {} columns",
                cells.len(),
                self.columns.len()
            )));
        }
        self.index.push(index.into());
        self.rows.push(cells);
        Ok(())
    }

    /// Index column name.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row labels.
    #[must_use]
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Cell at `(row, column name)`.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)
    }

    /// A column as floats; non-numeric cells are `None`.
    #[must_use]
    pub fn column_f64(&self, column: &str) -> Option<Vec<Option<f64>>> {
        let col = self.columns.iter().position(|c| c == column)?;
        Some(self.rows.iter().map(|row| row[col].as_f64()).collect())
    }

    /// Write as CSV: header `[index_name, columns...]`, then one line per row.
    ///
    /// # Errors
    ///
    /// Returns error if the writer fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(std::iter::once(self.index_name.as_str()).chain(self.columns.iter().map(String::as_str)))?;
        for (label, row) in self.index.iter().zip(&self.rows) {
            let fields: Vec<String> = std::iter::once(label.clone())
                .chain(row.iter().map(render_cell))
                .collect();
            wtr.write_record(&fields)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Read CSV, taking the first column as the index.
    ///
    /// # Errors
    ///
    /// Returns error on a missing header or rows of the wrong width.
    pub fn read_csv(bytes: &[u8]) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(bytes);
        let headers = rdr.headers()?.clone();
        let mut fields = headers.iter();
        let index_name = fields
            .next()
            .ok_or_else(|| Error::Decode("table CSV has no header".to_string()))?;
        let mut table = Self::new(fields).with_index_name(index_name);

        for record in rdr.records() {
            let record = record?;
            let mut cells = record.iter();
            let label = cells.next().unwrap_or_default().to_string();
            table.push_row(label, cells.map(infer_cell).collect())?;
        }
        Ok(table)
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn infer_cell(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        // NaN and infinities have no JSON number form
        return serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number);
    }
    match field {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::String(field.to_string()),
    }
}

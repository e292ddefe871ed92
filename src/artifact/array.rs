//! Numeric arrays stored as header-less comma-separated rows

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Row-major 2-D array of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericArray {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl NumericArray {
    /// Create an array from row-major data.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(Error::Decode(format!(
                "array shape {rows}x{cols} does not match {} values",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Create an array from equal-length rows.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != cols) {
            return Err(Error::Decode(format!(
                "row {bad} has {} values, expected {cols}",
                rows[bad].len()
            )));
        }
        let n = rows.len();
        Ok(Self {
            rows: n,
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// A single-column array, one value per row.
    #[must_use]
    pub fn column(values: Vec<f64>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values,
        }
    }

    /// `(rows, cols)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major values.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Value at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col).copied()
        } else {
            None
        }
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Write as CSV: no header, one line per row.
    ///
    /// # Errors
    ///
    /// Returns error if the writer fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        for row in self.rows() {
            wtr.write_record(row.iter().map(ToString::to_string))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Read CSV written by [`NumericArray::write_csv`].
    ///
    /// # Errors
    ///
    /// Returns error on ragged rows or non-numeric fields.
    pub fn read_csv(bytes: &[u8]) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|_| {
                        Error::Decode(format!("line {}: '{field}' is not a number", line + 1))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_checks() {
        assert!(NumericArray::new(2, 2, vec![1.0; 4]).is_ok());
        assert!(NumericArray::new(2, 2, vec![1.0; 3]).is_err());
        assert!(NumericArray::from_rows(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_csv_layout() {
        let array = NumericArray::from_rows(vec![vec![1.0, 2.5], vec![-3.0, 0.125]]).unwrap();
        let mut out = Vec::new();
        array.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "1,2.5\n-3,0.125\n");
        assert_eq!(NumericArray::read_csv(&out).unwrap(), array);
    }

    #[test]
    fn test_read_scientific_notation() {
        let array = NumericArray::read_csv(b"1.000000000000000000e+00, 2e-3\n").unwrap();
        assert_eq!(array.shape(), (1, 2));
        assert_eq!(array.get(0, 1), Some(0.002));
    }

    #[test]
    fn test_non_numeric_rejected() {
        assert!(matches!(
            NumericArray::read_csv(b"1,abc\n"),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_column_vector() {
        let array = NumericArray::column(vec![1.0, 2.0, 3.0]);
        assert_eq!(array.shape(), (3, 1));
        assert_eq!(array.rows().count(), 3);
    }
}

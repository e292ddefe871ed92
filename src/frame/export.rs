//! Arrow export of frames, plus Parquet read/write

use super::aggregate::SeedAveragedFrame;
use super::{MetricCell, RunFrame};
use crate::Result;
use arrow::array::{ArrayRef, Float64Array, ListBuilder, StringArray, StringBuilder};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

fn batch(columns: Vec<(String, ArrayRef)>) -> Result<RecordBatch> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
        .collect();
    let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, array)| array).collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

impl RunFrame {
    /// Convert to an Arrow record batch.
    ///
    /// Columns: `id`, `status`, every `config.*` column as UTF-8 and every
    /// `metrics.*` column as Float64. Metric series have no scalar value and
    /// are exported as null.
    ///
    /// # Errors
    ///
    /// Returns an Arrow error if the batch cannot be assembled.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let rows = self.rows();
        let ids = StringArray::from_iter_values(rows.iter().map(|row| row.id()));
        let statuses = StringArray::from_iter_values(rows.iter().map(|row| row.status().as_str()));
        let mut columns: Vec<(String, ArrayRef)> = Vec::new();
        columns.push(("id".to_string(), Arc::new(ids) as ArrayRef));
        columns.push(("status".to_string(), Arc::new(statuses) as ArrayRef));

        for column in self.config_columns() {
            let values: StringArray = rows
                .iter()
                .map(|row| row.config_cell(&column).map(ToString::to_string))
                .collect();
            columns.push((column, Arc::new(values) as ArrayRef));
        }
        for column in self.metric_columns() {
            let values: Float64Array = rows
                .iter()
                .map(|row| row.metric(&column).and_then(MetricCell::as_scalar))
                .collect();
            columns.push((column, Arc::new(values) as ArrayRef));
        }

        batch(columns)
    }
}

impl SeedAveragedFrame {
    /// Convert to an Arrow record batch.
    ///
    /// Columns: grouping `config.*` columns as UTF-8, then for every metric
    /// `<metric>.mean`, `<metric>.std` (Float64) and `<metric>.latex_string`
    /// (UTF-8), then `run_ids` as a list of UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an Arrow error if the batch cannot be assembled.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let rows = self.rows();
        let mut columns: Vec<(String, ArrayRef)> = Vec::new();

        for column in self.config_columns() {
            let values: StringArray = rows
                .iter()
                .map(|row| row.config().get(column).map(ToString::to_string))
                .collect();
            columns.push((column.clone(), Arc::new(values) as ArrayRef));
        }

        for metric in self.metric_columns() {
            let means: Float64Array = rows
                .iter()
                .map(|row| row.metric(metric).map(|s| s.mean))
                .collect();
            let stds: Float64Array = rows
                .iter()
                .map(|row| row.metric(metric).map(|s| s.std))
                .collect();
            let latex: StringArray = rows
                .iter()
                .map(|row| row.metric(metric).map(|s| s.latex_string.clone()))
                .collect();
            columns.push((format!("{metric}.mean"), Arc::new(means) as ArrayRef));
            columns.push((format!("{metric}.std"), Arc::new(stds) as ArrayRef));
            columns.push((format!("{metric}.latex_string"), Arc::new(latex) as ArrayRef));
        }

        let mut run_ids = ListBuilder::new(StringBuilder::new());
        for row in rows {
            for id in row.run_ids() {
                run_ids.values().append_value(id);
            }
            run_ids.append(true);
        }
        columns.push(("run_ids".to_string(), Arc::new(run_ids.finish()) as ArrayRef));

        batch(columns)
    }
}

/// Write a record batch to a Parquet file.
///
/// # Errors
///
/// Returns error if the file cannot be created or written.
#[cfg(feature = "parquet")]
pub fn write_parquet<P: AsRef<std::path::Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    use parquet::arrow::ArrowWriter;

    let file = std::fs::File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    tracing::debug!(path = %path.as_ref().display(), rows = batch.num_rows(), "wrote parquet");
    Ok(())
}

/// Read every record batch from a Parquet file.
///
/// # Errors
///
/// Returns error if the file cannot be opened or parsed.
#[cfg(feature = "parquet")]
pub fn read_parquet<P: AsRef<std::path::Path>>(path: P) -> Result<Vec<RecordBatch>> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = std::fs::File::open(path.as_ref())?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

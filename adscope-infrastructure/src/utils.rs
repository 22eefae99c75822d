use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

pub fn days_to_date(days: i32) -> Result<NaiveDate> {
    days.checked_add(UNIX_EPOCH_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| anyhow!("date32 value {} out of range", days))
}

pub fn date32_array(dates: impl Iterator<Item = NaiveDate>) -> ArrayRef {
    Arc::new(Date32Array::from_iter_values(dates.map(date_to_days)))
}

pub fn int64_array(values: impl Iterator<Item = i64>) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(values))
}

pub fn float64_array(values: impl Iterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(values))
}

pub fn compression_from_name(name: &str) -> Compression {
    match name {
        "snappy" => Compression::SNAPPY,
        _ => Compression::UNCOMPRESSED,
    }
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Writes one record batch to `path`, replacing any existing file.
pub fn write_parquet(path: &Path, batch: &RecordBatch, compression: Compression) -> Result<()> {
    ensure_parent_dir(path)?;
    let props = WriterProperties::builder()
        .set_compression(compression)
        .build();
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("failed to create parquet writer")?;
    writer
        .write(batch)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("failed to finalize {}", path.display()))?;
    Ok(())
}

/// Reads every record batch of a parquet file after checking that the
/// `required` columns exist.
pub fn read_parquet(path: &Path, required: &[&str]) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("{} is not a parquet file", path.display()))?;
    let schema = builder.schema().clone();
    for name in required {
        if schema.column_with_name(name).is_none() {
            return Err(anyhow!("{} is missing column {}", path.display(), name));
        }
    }
    let reader = builder.build()?;
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok((schema, batches))
}

fn column_cast(batch: &RecordBatch, name: &str, to: &DataType) -> Result<ArrayRef> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("missing column {}", name))?;
    if array.null_count() > 0 {
        return Err(anyhow!("column {} contains nulls", name));
    }
    cast(array, to)
        .with_context(|| format!("column {} cannot be read as {}", name, to))
}

pub fn int64_column(batch: &RecordBatch, name: &str) -> Result<Vec<i64>> {
    let array = column_cast(batch, name, &DataType::Int64)?;
    let values = array
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| anyhow!("column {} is not Int64", name))?;
    Ok(values.values().to_vec())
}

pub fn float64_column(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let array = column_cast(batch, name, &DataType::Float64)?;
    let values = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| anyhow!("column {} is not Float64", name))?;
    Ok(values.values().to_vec())
}

/// Date, datetime and timestamp columns are truncated to their calendar date.
pub fn date_column(batch: &RecordBatch, name: &str) -> Result<Vec<NaiveDate>> {
    let array = column_cast(batch, name, &DataType::Date32)?;
    let values = array
        .as_any()
        .downcast_ref::<Date32Array>()
        .ok_or_else(|| anyhow!("column {} is not Date32", name))?;
    values
        .values()
        .iter()
        .map(|days| days_to_date(*days))
        .collect()
}

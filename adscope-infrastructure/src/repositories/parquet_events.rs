use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use arrow::array::ArrayRef;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::basic::Compression;
use tracing::info;

use adscope_domain::{EventRecord, EventRepository};

use crate::utils::{
    date32_array, date_column, float64_array, float64_column, int64_array, int64_column,
    read_parquet, write_parquet,
};

const EVENT_COLUMNS: [&str; 7] = [
    "event_date",
    "campaign_id",
    "impressions",
    "clicks",
    "conversions",
    "revenue",
    "label_injected_anomaly",
];

/// Raw event table stored as a single parquet file.
pub struct ParquetEventRepository {
    path: PathBuf,
    compression: Compression,
}

impl ParquetEventRepository {
    pub fn new(path: impl Into<PathBuf>, compression: Compression) -> Self {
        Self {
            path: path.into(),
            compression,
        }
    }

    fn to_record_batch(events: &[EventRecord]) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("event_date", DataType::Date32, false),
            Field::new("campaign_id", DataType::Int64, false),
            Field::new("impressions", DataType::Int64, false),
            Field::new("clicks", DataType::Int64, false),
            Field::new("conversions", DataType::Int64, false),
            Field::new("revenue", DataType::Float64, false),
            Field::new("label_injected_anomaly", DataType::Int64, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            date32_array(events.iter().map(|e| e.event_date)),
            int64_array(events.iter().map(|e| e.campaign_id)),
            int64_array(events.iter().map(|e| e.impressions)),
            int64_array(events.iter().map(|e| e.clicks)),
            int64_array(events.iter().map(|e| e.conversions)),
            float64_array(events.iter().map(|e| e.revenue)),
            int64_array(events.iter().map(|e| i64::from(e.label_injected_anomaly))),
        ];
        RecordBatch::try_new(schema, columns)
            .context("failed to build event record batch")
    }

    fn from_record_batch(batch: &RecordBatch, out: &mut Vec<EventRecord>) -> Result<()> {
        let dates = date_column(batch, "event_date")?;
        let campaigns = int64_column(batch, "campaign_id")?;
        let impressions = int64_column(batch, "impressions")?;
        let clicks = int64_column(batch, "clicks")?;
        let conversions = int64_column(batch, "conversions")?;
        let revenue = float64_column(batch, "revenue")?;
        let labels = int64_column(batch, "label_injected_anomaly")?;

        out.reserve(batch.num_rows());
        for i in 0..batch.num_rows() {
            let label = match labels[i] {
                0 => 0,
                1 => 1,
                other => {
                    return Err(anyhow!(
                        "label_injected_anomaly must be 0 or 1, got {}",
                        other
                    ))
                }
            };
            out.push(EventRecord {
                event_date: dates[i],
                campaign_id: campaigns[i],
                impressions: impressions[i],
                clicks: clicks[i],
                conversions: conversions[i],
                revenue: revenue[i],
                label_injected_anomaly: label,
            });
        }
        Ok(())
    }
}

impl EventRepository for ParquetEventRepository {
    fn save_events(&self, events: &[EventRecord]) -> Result<()> {
        let batch = Self::to_record_batch(events)?;
        write_parquet(&self.path, &batch, self.compression)?;
        info!(path = %self.path.display(), rows = events.len(), "wrote raw events");
        Ok(())
    }

    fn load_events(&self) -> Result<Vec<EventRecord>> {
        let (_, batches) = read_parquet(&self.path, &EVENT_COLUMNS)?;
        let mut events = Vec::new();
        for batch in &batches {
            Self::from_record_batch(batch, &mut events)
                .with_context(|| format!("invalid event file {}", self.path.display()))?;
        }
        info!(path = %self.path.display(), rows = events.len(), "read raw events");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{
        Date32Array, Float64Array, Int32Array, Int64Array, TimestampMillisecondArray,
    };
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_events() -> Vec<EventRecord> {
        let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
        vec![
            EventRecord {
                event_date: day(1),
                campaign_id: 7,
                impressions: 120,
                clicks: 11,
                conversions: 0,
                revenue: 31.5,
                label_injected_anomaly: 0,
            },
            EventRecord {
                event_date: day(2),
                campaign_id: 1999,
                impressions: 98,
                clicks: 140,
                conversions: 1,
                revenue: 402.25,
                label_injected_anomaly: 1,
            },
        ]
    }

    #[test]
    fn saves_and_loads_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data/raw/events.parquet");
        let repo = ParquetEventRepository::new(&path, Compression::SNAPPY);
        repo.save_events(&sample_events()).unwrap();
        assert!(path.exists());
        assert_eq!(repo.load_events().unwrap(), sample_events());
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.parquet");
        let err = ParquetEventRepository::new(&path, Compression::SNAPPY)
            .load_events()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("absent.parquet"));
    }

    #[test]
    fn missing_column_names_the_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("event_date", DataType::Date32, false),
            Field::new("campaign_id", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Date32Array::from(vec![19_800])),
                Arc::new(Int64Array::from(vec![3])),
            ],
        )
        .unwrap();
        write_parquet(&path, &batch, Compression::UNCOMPRESSED).unwrap();

        let err = ParquetEventRepository::new(&path, Compression::SNAPPY)
            .load_events()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("missing column impressions"));
    }

    #[test]
    fn timestamps_and_narrow_ints_are_normalized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foreign.parquet");
        // 2024-05-01T13:45:00Z
        let millis = 1_714_571_100_000_i64;
        let schema = Arc::new(Schema::new(vec![
            Field::new(
                "event_date",
                DataType::Timestamp(arrow::datatypes::TimeUnit::Millisecond, None),
                false,
            ),
            Field::new("campaign_id", DataType::Int32, false),
            Field::new("impressions", DataType::Int32, false),
            Field::new("clicks", DataType::Int32, false),
            Field::new("conversions", DataType::Int32, false),
            Field::new("revenue", DataType::Float64, false),
            Field::new("label_injected_anomaly", DataType::Int32, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampMillisecondArray::from(vec![millis])),
                Arc::new(Int32Array::from(vec![5])),
                Arc::new(Int32Array::from(vec![100])),
                Arc::new(Int32Array::from(vec![9])),
                Arc::new(Int32Array::from(vec![1])),
                Arc::new(Float64Array::from(vec![12.5])),
                Arc::new(Int32Array::from(vec![0])),
            ],
        )
        .unwrap();
        write_parquet(&path, &batch, Compression::UNCOMPRESSED).unwrap();

        let events = ParquetEventRepository::new(&path, Compression::SNAPPY)
            .load_events()
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].event_date,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
        assert_eq!((events[0].campaign_id, events[0].clicks), (5, 9));
    }

    #[test]
    fn non_binary_label_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.parquet");
        let repo = ParquetEventRepository::new(&path, Compression::SNAPPY);
        let mut batch_events = sample_events();
        batch_events.truncate(1);
        let mut batch = ParquetEventRepository::to_record_batch(&batch_events).unwrap();
        let mut columns = batch.columns().to_vec();
        columns[6] = Arc::new(Int64Array::from(vec![3]));
        batch = RecordBatch::try_new(batch.schema(), columns).unwrap();
        write_parquet(&path, &batch, Compression::SNAPPY).unwrap();

        let err = repo.load_events().unwrap_err();
        assert!(format!("{:#}", err).contains("must be 0 or 1"));
    }
}

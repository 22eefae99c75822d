use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::ArrayRef;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::basic::Compression;
use tracing::info;

use adscope_domain::{CampaignDayRow, DailyRevenueRow, GoldRepository, MetricsReport, StoragePaths};

use crate::utils::{date32_array, ensure_parent_dir, float64_array, int64_array, write_parquet};

/// Pipeline outputs: two parquet tables and the metrics JSON.
pub struct FileGoldRepository {
    campaign_path: PathBuf,
    daily_path: PathBuf,
    metrics_path: PathBuf,
    compression: Compression,
}

impl FileGoldRepository {
    pub fn new(paths: &StoragePaths, compression: Compression) -> Self {
        Self {
            campaign_path: PathBuf::from(&paths.campaign_output),
            daily_path: PathBuf::from(&paths.daily_output),
            metrics_path: PathBuf::from(&paths.metrics_output),
            compression,
        }
    }
}

fn campaign_batch(rows: &[CampaignDayRow]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("campaign_id", DataType::Int64, false),
        Field::new("event_date", DataType::Date32, false),
        Field::new("impressions", DataType::Int64, false),
        Field::new("clicks", DataType::Int64, false),
        Field::new("conversions", DataType::Int64, false),
        Field::new("revenue", DataType::Float64, false),
        Field::new("label_injected_anomaly", DataType::Int64, false),
        Field::new("iso_score", DataType::Float64, false),
        Field::new("ocsvm_score", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        int64_array(rows.iter().map(|r| r.campaign_id)),
        date32_array(rows.iter().map(|r| r.event_date)),
        int64_array(rows.iter().map(|r| r.impressions)),
        int64_array(rows.iter().map(|r| r.clicks)),
        int64_array(rows.iter().map(|r| r.conversions)),
        float64_array(rows.iter().map(|r| r.revenue)),
        int64_array(rows.iter().map(|r| i64::from(r.label_injected_anomaly))),
        float64_array(rows.iter().map(|r| r.iso_score)),
        float64_array(rows.iter().map(|r| r.ocsvm_score)),
    ];
    RecordBatch::try_new(schema, columns)
        .context("failed to build campaign-day record batch")
}

fn daily_batch(rows: &[DailyRevenueRow]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_date", DataType::Date32, false),
        Field::new("revenue", DataType::Float64, false),
        Field::new("residual", DataType::Float64, false),
        Field::new("ts_anomaly", DataType::Int64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        date32_array(rows.iter().map(|r| r.event_date)),
        float64_array(rows.iter().map(|r| r.revenue)),
        float64_array(rows.iter().map(|r| r.residual)),
        int64_array(rows.iter().map(|r| i64::from(r.ts_anomaly))),
    ];
    RecordBatch::try_new(schema, columns)
        .context("failed to build daily record batch")
}

impl GoldRepository for FileGoldRepository {
    fn save_campaign_days(&self, rows: &[CampaignDayRow]) -> Result<()> {
        let batch = campaign_batch(rows)?;
        write_parquet(&self.campaign_path, &batch, self.compression)?;
        info!(path = %self.campaign_path.display(), rows = rows.len(), "wrote campaign-day scores");
        Ok(())
    }

    fn save_daily_revenue(&self, rows: &[DailyRevenueRow]) -> Result<()> {
        let batch = daily_batch(rows)?;
        write_parquet(&self.daily_path, &batch, self.compression)?;
        info!(path = %self.daily_path.display(), rows = rows.len(), "wrote daily residuals");
        Ok(())
    }

    fn save_metrics(&self, report: &MetricsReport) -> Result<()> {
        ensure_parent_dir(&self.metrics_path)?;
        let content = serde_json::to_string_pretty(report)?;
        fs::write(&self.metrics_path, content)
            .with_context(|| format!("failed to write {}", self.metrics_path.display()))?;
        info!(path = %self.metrics_path.display(), "wrote metrics");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{date_column, float64_column, int64_column, read_parquet};
    use adscope_domain::ModelScores;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn repo(dir: &TempDir) -> FileGoldRepository {
        let root = dir.path().to_string_lossy().to_string();
        let paths = StoragePaths {
            raw_events: format!("{root}/data/raw/events.parquet"),
            campaign_output: format!("{root}/data/gold/campaign_daily_anomalies.parquet"),
            daily_output: format!("{root}/data/gold/daily_ts_anomalies.parquet"),
            metrics_output: format!("{root}/runs/metrics.json"),
        };
        FileGoldRepository::new(&paths, Compression::SNAPPY)
    }

    #[test]
    fn campaign_table_keeps_column_order() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let row = CampaignDayRow {
            campaign_id: 4,
            event_date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
            impressions: 500,
            clicks: 48,
            conversions: 2,
            revenue: 160.0,
            label_injected_anomaly: 1,
            iso_score: 0.61,
            ocsvm_score: -0.2,
        };
        repo.save_campaign_days(&[row.clone()]).unwrap();

        let (schema, batches) = read_parquet(&repo.campaign_path, &[]).unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            [
                "campaign_id",
                "event_date",
                "impressions",
                "clicks",
                "conversions",
                "revenue",
                "label_injected_anomaly",
                "iso_score",
                "ocsvm_score"
            ]
        );
        assert_eq!(int64_column(&batches[0], "clicks").unwrap(), vec![48]);
        assert_eq!(
            float64_column(&batches[0], "iso_score").unwrap(),
            vec![0.61]
        );
        assert_eq!(
            date_column(&batches[0], "event_date").unwrap(),
            vec![row.event_date]
        );
    }

    #[test]
    fn daily_table_round_trips_flags() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let rows: Vec<DailyRevenueRow> = (1..=3)
            .map(|d| DailyRevenueRow {
                event_date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                revenue: 100.0 * d as f64,
                residual: d as f64 - 2.0,
                ts_anomaly: u8::from(d == 3),
            })
            .collect();
        repo.save_daily_revenue(&rows).unwrap();

        let (_, batches) = read_parquet(&repo.daily_path, &["ts_anomaly"]).unwrap();
        assert_eq!(
            int64_column(&batches[0], "ts_anomaly").unwrap(),
            vec![0, 0, 1]
        );
        assert_eq!(
            float64_column(&batches[0], "residual").unwrap(),
            vec![-1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn metrics_json_has_both_models() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let report = MetricsReport {
            isolation_forest: ModelScores {
                roc_auc: 0.75,
                pr_auc: 0.5,
            },
            oneclass_svm: ModelScores {
                roc_auc: 0.625,
                pr_auc: 0.25,
            },
        };
        repo.save_metrics(&report).unwrap();

        let content = std::fs::read_to_string(&repo.metrics_path).unwrap();
        assert!(content.starts_with("{\n  \"isolation_forest\": {\n    \"roc_auc\": 0.75"));
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["isolation_forest", "oneclass_svm"]);
        let parsed: MetricsReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, report);
    }
}

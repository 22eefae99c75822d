// Daily revenue aggregate with decomposition residuals

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRevenueRow {
    pub event_date: NaiveDate,
    pub revenue: f64,
    pub residual: f64,
    pub ts_anomaly: u8,
}

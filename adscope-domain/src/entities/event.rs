// Event entity
// One simulated impression-day entry of the raw dataset

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_date: NaiveDate,
    pub campaign_id: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub revenue: f64,
    pub label_injected_anomaly: u8,
}

impl EventRecord {
    pub fn is_injected(&self) -> bool {
        self.label_injected_anomaly == 1
    }
}

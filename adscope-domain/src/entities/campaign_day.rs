// Campaign-day aggregate
// One row per (campaign_id, event_date) with model scores attached

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::EventRecord;

/// Column order of the feature matrix handed to the outlier models.
pub const FEATURE_COLUMNS: [&str; 4] = ["impressions", "clicks", "conversions", "revenue"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDayRow {
    pub campaign_id: i64,
    pub event_date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub revenue: f64,
    pub label_injected_anomaly: u8,
    pub iso_score: f64,
    pub ocsvm_score: f64,
}

impl CampaignDayRow {
    pub fn features(&self) -> [f64; 4] {
        [
            self.impressions as f64,
            self.clicks as f64,
            self.conversions as f64,
            self.revenue,
        ]
    }
}

impl From<&CampaignDayRow> for EventRecord {
    fn from(row: &CampaignDayRow) -> Self {
        Self {
            event_date: row.event_date,
            campaign_id: row.campaign_id,
            impressions: row.impressions,
            clicks: row.clicks,
            conversions: row.conversions,
            revenue: row.revenue,
            label_injected_anomaly: row.label_injected_anomaly,
        }
    }
}

use crate::entities::{CampaignDayRow, DailyRevenueRow, EventRecord, MetricsReport};

pub trait EventRepository: Send + Sync {
    fn save_events(&self, events: &[EventRecord]) -> anyhow::Result<()>;
    fn load_events(&self) -> anyhow::Result<Vec<EventRecord>>;
}

pub trait GoldRepository: Send + Sync {
    fn save_campaign_days(&self, rows: &[CampaignDayRow]) -> anyhow::Result<()>;
    fn save_daily_revenue(&self, rows: &[DailyRevenueRow]) -> anyhow::Result<()>;
    fn save_metrics(&self, report: &MetricsReport) -> anyhow::Result<()>;
}

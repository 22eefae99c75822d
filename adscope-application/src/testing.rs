// In-memory repositories for command tests

use std::sync::{Arc, Mutex};

use adscope_domain::ports::{EventRepository, GoldRepository};
use adscope_domain::{
    CampaignDayRow, DailyRevenueRow, EventRecord, GeneratorConfig, MetricsReport, PipelineConfig,
};
use chrono::NaiveDate;

use crate::{AppState, Metrics};

#[derive(Default)]
pub struct MemoryEvents {
    events: Mutex<Vec<EventRecord>>,
}

impl MemoryEvents {
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.events.lock().unwrap().clone()
    }
}

impl EventRepository for MemoryEvents {
    fn save_events(&self, events: &[EventRecord]) -> anyhow::Result<()> {
        *self.events.lock().unwrap() = events.to_vec();
        Ok(())
    }

    fn load_events(&self) -> anyhow::Result<Vec<EventRecord>> {
        Ok(self.snapshot())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    CampaignDays,
    DailyRevenue,
    Metrics,
}

#[derive(Default)]
pub struct MemoryGold {
    writes: Mutex<Vec<Write>>,
    campaign_days: Mutex<Vec<CampaignDayRow>>,
    daily: Mutex<Vec<DailyRevenueRow>>,
    metrics: Mutex<Option<MetricsReport>>,
}

impl MemoryGold {
    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn campaign_days(&self) -> Vec<CampaignDayRow> {
        self.campaign_days.lock().unwrap().clone()
    }

    pub fn daily_revenue(&self) -> Vec<DailyRevenueRow> {
        self.daily.lock().unwrap().clone()
    }

    pub fn metrics(&self) -> Option<MetricsReport> {
        *self.metrics.lock().unwrap()
    }
}

impl GoldRepository for MemoryGold {
    fn save_campaign_days(&self, rows: &[CampaignDayRow]) -> anyhow::Result<()> {
        *self.campaign_days.lock().unwrap() = rows.to_vec();
        self.writes.lock().unwrap().push(Write::CampaignDays);
        Ok(())
    }

    fn save_daily_revenue(&self, rows: &[DailyRevenueRow]) -> anyhow::Result<()> {
        *self.daily.lock().unwrap() = rows.to_vec();
        self.writes.lock().unwrap().push(Write::DailyRevenue);
        Ok(())
    }

    fn save_metrics(&self, report: &MetricsReport) -> anyhow::Result<()> {
        *self.metrics.lock().unwrap() = Some(*report);
        self.writes.lock().unwrap().push(Write::Metrics);
        Ok(())
    }
}

/// Four weeks, twenty campaigns, fixed end date.
pub fn small_generator(rows: usize) -> GeneratorConfig {
    GeneratorConfig {
        rows,
        days: 28,
        end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
        campaign_id_min: 1,
        campaign_id_max: 21,
        ..GeneratorConfig::default()
    }
}

pub fn memory_state(generator: GeneratorConfig) -> (AppState, Arc<MemoryEvents>, Arc<MemoryGold>) {
    let events = Arc::new(MemoryEvents::default());
    let gold = Arc::new(MemoryGold::default());
    let state = AppState {
        generator,
        pipeline: PipelineConfig::default(),
        event_repo: events.clone(),
        gold_repo: gold.clone(),
        metrics: Arc::new(Metrics::default()),
    };
    (state, events, gold)
}

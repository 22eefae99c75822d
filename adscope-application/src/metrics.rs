use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one process run, printed as a summary line at exit.
#[derive(Debug, Default)]
pub struct Metrics {
    events_generated: AtomicU64,
    anomalies_injected: AtomicU64,
    events_loaded: AtomicU64,
    campaign_days: AtomicU64,
    predicted_outliers: AtomicU64,
    ts_anomalies: AtomicU64,
    files_written: AtomicU64,
}

impl Metrics {
    pub fn record_generated(&self, events: usize, injected: usize) {
        self.events_generated
            .fetch_add(events as u64, Ordering::Relaxed);
        self.anomalies_injected
            .fetch_add(injected as u64, Ordering::Relaxed);
    }

    pub fn record_loaded(&self, events: usize) {
        self.events_loaded
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn record_campaign_days(&self, rows: usize, predicted_outliers: usize) {
        self.campaign_days.fetch_add(rows as u64, Ordering::Relaxed);
        self.predicted_outliers
            .fetch_add(predicted_outliers as u64, Ordering::Relaxed);
    }

    pub fn record_ts_anomalies(&self, count: usize) {
        self.ts_anomalies.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_file_written(&self) {
        self.files_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files_written(&self) -> u64 {
        self.files_written.load(Ordering::Relaxed)
    }

    pub fn render_summary(&self) -> String {
        format!(
            "events_generated={} anomalies_injected={} events_loaded={} campaign_days={} \
predicted_outliers={} ts_anomalies={} files_written={}",
            self.events_generated.load(Ordering::Relaxed),
            self.anomalies_injected.load(Ordering::Relaxed),
            self.events_loaded.load(Ordering::Relaxed),
            self.campaign_days.load(Ordering::Relaxed),
            self.predicted_outliers.load(Ordering::Relaxed),
            self.ts_anomalies.load(Ordering::Relaxed),
            self.files_written.load(Ordering::Relaxed),
        )
    }
}

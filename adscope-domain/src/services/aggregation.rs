use std::collections::BTreeMap;

use chrono::NaiveDate;
use ndarray::Array2;

use crate::entities::{CampaignDayRow, EventRecord, FEATURE_COLUMNS};

/// Groups events by `(campaign_id, event_date)`, summing the measures and
/// keeping the max label. Rows come out sorted by the group key; scores are
/// left at zero for the detectors to fill.
pub fn aggregate_campaign_days<'a, I>(events: I) -> Vec<CampaignDayRow>
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut groups: BTreeMap<(i64, NaiveDate), CampaignDayRow> = BTreeMap::new();
    for event in events {
        let row = groups
            .entry((event.campaign_id, event.event_date))
            .or_insert_with(|| CampaignDayRow {
                campaign_id: event.campaign_id,
                event_date: event.event_date,
                impressions: 0,
                clicks: 0,
                conversions: 0,
                revenue: 0.0,
                label_injected_anomaly: 0,
                iso_score: 0.0,
                ocsvm_score: 0.0,
            });
        row.impressions += event.impressions;
        row.clicks += event.clicks;
        row.conversions += event.conversions;
        row.revenue += event.revenue;
        row.label_injected_anomaly = row.label_injected_anomaly.max(event.label_injected_anomaly);
    }
    groups.into_values().collect()
}

/// Total revenue per date, ascending. Only dates present in the events appear.
pub fn aggregate_daily_revenue<'a, I>(events: I) -> Vec<(NaiveDate, f64)>
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for event in events {
        *days.entry(event.event_date).or_insert(0.0) += event.revenue;
    }
    days.into_iter().collect()
}

/// `n_rows x 4` matrix in `FEATURE_COLUMNS` order.
pub fn feature_matrix(rows: &[CampaignDayRow]) -> Array2<f64> {
    let mut matrix = Array2::zeros((rows.len(), FEATURE_COLUMNS.len()));
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.features().into_iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }
    matrix
}

pub fn ground_truth(rows: &[CampaignDayRow]) -> Vec<u8> {
    rows.iter().map(|row| row.label_injected_anomaly).collect()
}

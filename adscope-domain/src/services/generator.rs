use rand::distributions::{Bernoulli, Distribution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Gamma, Poisson};
use thiserror::Error;

use crate::entities::{EventRecord, GeneratorConfig};
use crate::utils::{today_local, trailing_dates};

/// Longest supported date window, about a century.
pub const MAX_DAYS: u32 = 36_500;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),
}

/// Draws the synthetic event table and injects ground-truth anomalies.
///
/// Columns are drawn one after another from a single seeded `StdRng`, so the
/// output only depends on the config (seed, row count, window and end date).
pub struct EventGenerator {
    config: GeneratorConfig,
    rng: StdRng,
}

impl EventGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        validate(&config)?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self { config, rng })
    }

    /// Base table, and the injected rows labeled.
    pub fn generate(&mut self) -> Result<Vec<EventRecord>, GeneratorError> {
        let mut events = self.generate_base()?;
        self.inject_anomalies(&mut events);
        Ok(events)
    }

    pub fn generate_base(&mut self) -> Result<Vec<EventRecord>, GeneratorError> {
        let n = self.config.rows;
        let end = self.config.end_date.unwrap_or_else(today_local);
        let Some(dates) = trailing_dates(end, self.config.days) else {
            return Err(GeneratorError::InvalidConfig(format!(
                "{} days ending {} leave the calendar range",
                self.config.days, end
            )));
        };

        let impressions_dist = Poisson::new(self.config.impressions_mean)
            .map_err(|err| GeneratorError::InvalidConfig(format!("impressions_mean: {err}")))?;
        let clicks_dist = Poisson::new(self.config.clicks_mean)
            .map_err(|err| GeneratorError::InvalidConfig(format!("clicks_mean: {err}")))?;
        let conversions_dist = Bernoulli::new(self.config.conversion_rate)
            .map_err(|err| GeneratorError::InvalidConfig(format!("conversion_rate: {err}")))?;
        let revenue_dist = Gamma::new(self.config.revenue_shape, self.config.revenue_scale)
            .map_err(|err| GeneratorError::InvalidConfig(format!("revenue gamma: {err}")))?;

        let rng = &mut self.rng;
        let event_dates: Vec<_> = (0..n)
            .map(|_| dates[rng.gen_range(0..dates.len())])
            .collect();
        let campaign_ids: Vec<i64> = (0..n)
            .map(|_| rng.gen_range(self.config.campaign_id_min..self.config.campaign_id_max))
            .collect();
        let impressions: Vec<i64> = (0..n)
            .map(|_| impressions_dist.sample(rng) as i64)
            .collect();
        let clicks: Vec<i64> = (0..n).map(|_| clicks_dist.sample(rng) as i64).collect();
        let conversions: Vec<i64> = (0..n)
            .map(|_| i64::from(conversions_dist.sample(rng)))
            .collect();
        let revenue: Vec<f64> = (0..n).map(|_| revenue_dist.sample(rng)).collect();

        Ok((0..n)
            .map(|i| EventRecord {
                event_date: event_dates[i],
                campaign_id: campaign_ids[i],
                impressions: impressions[i],
                clicks: clicks[i],
                conversions: conversions[i],
                revenue: revenue[i],
                label_injected_anomaly: 0,
            })
            .collect())
    }

    /// Inflates `floor(anomaly_rate * n)` distinct rows and labels them.
    /// Returns the sampled row indices in sampling order.
    pub fn inject_anomalies(&mut self, events: &mut [EventRecord]) -> Vec<usize> {
        let amount = anomaly_count(events.len(), self.config.anomaly_rate);
        let picked = rand::seq::index::sample(&mut self.rng, events.len(), amount);
        let indices = picked.into_vec();
        for &idx in &indices {
            let event = &mut events[idx];
            event.clicks = event.clicks.saturating_mul(self.config.click_multiplier);
            event.revenue *= self.config.revenue_multiplier;
            event.label_injected_anomaly = 1;
        }
        indices
    }
}

pub fn anomaly_count(rows: usize, rate: f64) -> usize {
    ((rows as f64) * rate).floor() as usize
}

fn validate(config: &GeneratorConfig) -> Result<(), GeneratorError> {
    let fail = |msg: &str| Err(GeneratorError::InvalidConfig(msg.to_string()));
    if config.rows == 0 {
        return fail("rows must be greater than 0");
    }
    if config.days == 0 || config.days > MAX_DAYS {
        return fail("days must be within 1..=36500");
    }
    if config.campaign_id_min >= config.campaign_id_max {
        return fail("campaign id range is empty");
    }
    if !(config.impressions_mean > 0.0 && config.clicks_mean > 0.0) {
        return fail("poisson means must be positive");
    }
    if !(config.revenue_shape > 0.0 && config.revenue_scale > 0.0) {
        return fail("revenue shape and scale must be positive");
    }
    if !(0.0..=1.0).contains(&config.conversion_rate) {
        return fail("conversion_rate must be within [0, 1]");
    }
    if !(0.0..=1.0).contains(&config.anomaly_rate) {
        return fail("anomaly_rate must be within [0, 1]");
    }
    if config.click_multiplier < 1 || config.revenue_multiplier < 1.0 {
        return fail("anomaly multipliers must be at least 1");
    }
    Ok(())
}

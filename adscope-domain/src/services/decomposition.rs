//! Seasonal-trend decomposition by loess (Cleveland et al., 1990).
//!
//! Window and iteration defaults follow statsmodels' `STL`: seasonal window 7,
//! degree 1 everywhere, jumps of 1, and for the robust variant 2 inner and 15
//! outer iterations with bisquare robustness weights.

use chrono::NaiveDate;
use thiserror::Error;

use crate::entities::{DailyRevenueRow, DecompositionParams};
use crate::utils::sample_std;

#[derive(Debug, Error)]
pub enum DecompositionError {
    #[error("series of length {len} is shorter than two periods of {period}")]
    TooShort { len: usize, period: usize },
    #[error("invalid decomposition window: {0}")]
    InvalidWindow(String),
    #[error("series contains non-finite values")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StlParams {
    pub period: usize,
    pub seasonal: usize,
    pub trend: usize,
    pub low_pass: usize,
    pub seasonal_deg: usize,
    pub trend_deg: usize,
    pub low_pass_deg: usize,
    pub inner_iter: usize,
    pub outer_iter: usize,
}

impl StlParams {
    pub fn new(period: usize, robust: bool) -> Self {
        let seasonal = 7;
        let mut trend = (1.5 * period as f64 / (1.0 - 1.5 / seasonal as f64)).ceil() as usize;
        if trend % 2 == 0 {
            trend += 1;
        }
        let mut low_pass = period + 1;
        if low_pass % 2 == 0 {
            low_pass += 1;
        }
        let (inner_iter, outer_iter) = if robust { (2, 15) } else { (5, 0) };
        Self {
            period,
            seasonal,
            trend,
            low_pass,
            seasonal_deg: 1,
            trend_deg: 1,
            low_pass_deg: 1,
            inner_iter,
            outer_iter,
        }
    }

    fn validate(&self) -> Result<(), DecompositionError> {
        let invalid = |msg: String| Err(DecompositionError::InvalidWindow(msg));
        if self.period < 2 {
            return invalid("period must be at least 2".to_string());
        }
        if self.seasonal < 3 || self.seasonal % 2 == 0 {
            return invalid(format!("seasonal window {} must be odd and >= 3", self.seasonal));
        }
        if self.trend <= self.period || self.trend % 2 == 0 {
            return invalid(format!("trend window {} must be odd and > period", self.trend));
        }
        if self.low_pass <= self.period || self.low_pass % 2 == 0 {
            return invalid(format!("low-pass window {} must be odd and > period", self.low_pass));
        }
        let degrees = [self.seasonal_deg, self.trend_deg, self.low_pass_deg];
        if degrees.iter().any(|d| *d > 1) {
            return invalid("loess degrees must be 0 or 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StlResult {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    pub weights: Vec<f64>,
}

pub fn stl(y: &[f64], params: &StlParams) -> Result<StlResult, DecompositionError> {
    params.validate()?;
    let n = y.len();
    if n < 2 * params.period {
        return Err(DecompositionError::TooShort {
            len: n,
            period: params.period,
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(DecompositionError::NonFinite);
    }

    let mut trend = vec![0.0; n];
    let mut seasonal = vec![0.0; n];
    let mut weights = vec![1.0; n];
    let mut use_weights = false;
    let mut outer = 0;
    loop {
        let rw = use_weights.then_some(weights.as_slice());
        inner_loop(y, params, rw, &mut seasonal, &mut trend);
        outer += 1;
        if outer > params.outer_iter {
            break;
        }
        let fit: Vec<f64> = trend.iter().zip(&seasonal).map(|(t, s)| t + s).collect();
        weights = robustness_weights(y, &fit);
        use_weights = true;
    }
    if params.outer_iter == 0 {
        weights.fill(1.0);
    }

    let residual = y
        .iter()
        .zip(trend.iter().zip(&seasonal))
        .map(|(v, (t, s))| v - t - s)
        .collect();
    Ok(StlResult {
        trend,
        seasonal,
        residual,
        weights,
    })
}

fn inner_loop(
    y: &[f64],
    p: &StlParams,
    rw: Option<&[f64]>,
    seasonal: &mut [f64],
    trend: &mut [f64],
) {
    let n = y.len();
    let np = p.period;
    let mut work = vec![0.0; n + 2 * np];
    for _ in 0..p.inner_iter {
        let detrended: Vec<f64> = y.iter().zip(trend.iter()).map(|(v, t)| v - t).collect();
        let cycle = subseries_smooth(&detrended, np, p.seasonal, p.seasonal_deg, rw);
        let filtered = low_pass_filter(&cycle, np);
        let mut low = vec![0.0; n];
        loess_smooth(
            &filtered,
            p.low_pass,
            p.low_pass_deg,
            None,
            &mut low,
            &mut work,
        );
        for i in 0..n {
            seasonal[i] = cycle[np + i] - low[i];
        }
        let deseasoned: Vec<f64> = y.iter().zip(seasonal.iter()).map(|(v, s)| v - s).collect();
        loess_smooth(&deseasoned, p.trend, p.trend_deg, rw, trend, &mut work);
    }
}

/// Local fit at position `xs` over the 1-based window `[nleft, nright]`.
/// Returns `None` when every weight in the window is zero.
#[allow(clippy::too_many_arguments)]
fn loess_estimate(
    y: &[f64],
    len: usize,
    deg: usize,
    xs: f64,
    nleft: usize,
    nright: usize,
    w: &mut [f64],
    rw: Option<&[f64]>,
) -> Option<f64> {
    let n = y.len();
    let range = n as f64 - 1.0;
    let mut h = (xs - nleft as f64).max(nright as f64 - xs);
    if len > n {
        h += ((len - n) / 2) as f64;
    }
    let h9 = 0.999 * h;
    let h1 = 0.001 * h;

    let mut total = 0.0;
    for j in nleft..=nright {
        w[j - 1] = 0.0;
        let r = (j as f64 - xs).abs();
        if r <= h9 {
            w[j - 1] = if r <= h1 {
                1.0
            } else {
                (1.0 - (r / h).powi(3)).powi(3)
            };
            if let Some(rw) = rw {
                w[j - 1] *= rw[j - 1];
            }
            total += w[j - 1];
        }
    }
    if total <= 0.0 {
        return None;
    }
    for j in nleft..=nright {
        w[j - 1] /= total;
    }

    if h > 0.0 && deg > 0 {
        let center: f64 = (nleft..=nright).map(|j| w[j - 1] * j as f64).sum();
        let spread: f64 = (nleft..=nright)
            .map(|j| w[j - 1] * (j as f64 - center).powi(2))
            .sum();
        if spread.sqrt() > 0.001 * range {
            let slope = (xs - center) / spread;
            for j in nleft..=nright {
                w[j - 1] *= slope * (j as f64 - center) + 1.0;
            }
        }
    }
    Some((nleft..=nright).map(|j| w[j - 1] * y[j - 1]).sum())
}

fn loess_smooth(
    y: &[f64],
    len: usize,
    deg: usize,
    rw: Option<&[f64]>,
    out: &mut [f64],
    work: &mut [f64],
) {
    let n = y.len();
    if n < 2 {
        out[0] = y[0];
        return;
    }
    if len >= n {
        for i in 1..=n {
            let fit = loess_estimate(y, len, deg, i as f64, 1, n, work, rw);
            out[i - 1] = fit.unwrap_or(y[i - 1]);
        }
        return;
    }
    let half = (len + 1) / 2;
    let (mut nleft, mut nright) = (1, len);
    for i in 1..=n {
        if i > half && nright != n {
            nleft += 1;
            nright += 1;
        }
        let fit = loess_estimate(y, len, deg, i as f64, nleft, nright, work, rw);
        out[i - 1] = fit.unwrap_or(y[i - 1]);
    }
}

/// Smooths every cycle-subseries and extends it one period on each side.
/// The result has `n + 2 * period` values.
fn subseries_smooth(y: &[f64], np: usize, ns: usize, deg: usize, rw: Option<&[f64]>) -> Vec<f64> {
    let n = y.len();
    let mut cycle = vec![0.0; n + 2 * np];
    for j in 1..=np {
        let k = (n - j) / np + 1;
        let sub: Vec<f64> = (0..k).map(|i| y[i * np + j - 1]).collect();
        let sub_rw: Option<Vec<f64>> = rw.map(|rw| (0..k).map(|i| rw[i * np + j - 1]).collect());
        let sub_rw = sub_rw.as_deref();

        let mut smoothed = vec![0.0; k + 2];
        let mut work = vec![0.0; k];
        loess_smooth(&sub, ns, deg, sub_rw, &mut smoothed[1..=k], &mut work);

        let nright = ns.min(k);
        let first = loess_estimate(&sub, ns, deg, 0.0, 1, nright, &mut work, sub_rw);
        smoothed[0] = first.unwrap_or(smoothed[1]);
        let nleft = if k + 1 > ns { k + 1 - ns } else { 1 };
        let last = loess_estimate(&sub, ns, deg, (k + 1) as f64, nleft, k, &mut work, sub_rw);
        smoothed[k + 1] = last.unwrap_or(smoothed[k]);

        for (m, value) in smoothed.into_iter().enumerate() {
            cycle[m * np + j - 1] = value;
        }
    }
    cycle
}

fn moving_average(x: &[f64], len: usize) -> Vec<f64> {
    let newn = x.len() + 1 - len;
    let flen = len as f64;
    let mut out = Vec::with_capacity(newn);
    let mut v: f64 = x[..len].iter().sum();
    out.push(v / flen);
    for j in 1..newn {
        v = v - x[j - 1] + x[len + j - 1];
        out.push(v / flen);
    }
    out
}

fn low_pass_filter(x: &[f64], np: usize) -> Vec<f64> {
    let first = moving_average(x, np);
    let second = moving_average(&first, np);
    moving_average(&second, 3)
}

fn robustness_weights(y: &[f64], fit: &[f64]) -> Vec<f64> {
    let r: Vec<f64> = y.iter().zip(fit).map(|(v, f)| (v - f).abs()).collect();
    let mut sorted = r.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = r.len();
    let mid0 = n / 2 + 1;
    let mid1 = n - mid0 + 1;
    let cmad = 3.0 * (sorted[mid0 - 1] + sorted[mid1 - 1]);
    let c9 = 0.999 * cmad;
    let c1 = 0.001 * cmad;
    r.into_iter()
        .map(|r| {
            if r <= c1 {
                1.0
            } else if r <= c9 {
                (1.0 - (r / cmad).powi(2)).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

/// Decomposes a daily revenue series and flags days whose residual exceeds
/// `threshold_sigma` sample standard deviations of the whole residual series.
pub fn flag_daily_anomalies(
    daily: &[(NaiveDate, f64)],
    params: &DecompositionParams,
) -> Result<Vec<DailyRevenueRow>, DecompositionError> {
    let revenue: Vec<f64> = daily.iter().map(|(_, r)| *r).collect();
    let result = stl(&revenue, &StlParams::new(params.period, params.robust))?;
    let limit = params.threshold_sigma * sample_std(&result.residual);
    Ok(daily
        .iter()
        .zip(result.residual)
        .map(|(&(event_date, revenue), residual)| DailyRevenueRow {
            event_date,
            revenue,
            residual,
            ts_anomaly: u8::from(residual.abs() > limit),
        })
        .collect())
}

use chrono::{Duration, Local, NaiveDate};

pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// `days` consecutive dates ending at (and including) `end`, ascending.
/// `None` when the window runs past the earliest representable date.
pub fn trailing_dates(end: NaiveDate, days: u32) -> Option<Vec<NaiveDate>> {
    (0..i64::from(days))
        .rev()
        .map(|offset| end.checked_sub_signed(Duration::days(offset)))
        .collect()
}

/// Sample standard deviation (ddof = 1). Returns 0.0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

use anyhow::{anyhow, Result};

/// Accepts `(0, 0.5]`, or `(0, 1]` when `allow_one` is set.
pub fn validate_fraction(name: &str, value: f64, allow_one: bool) -> Result<()> {
    let upper = if allow_one { 1.0 } else { 0.5 };
    if !(value > 0.0 && value <= upper) {
        return Err(anyhow!("{} must be within (0, {}], got {}", name, upper, value));
    }
    Ok(())
}

pub fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(anyhow!("{} must be positive, got {}", name, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_bounds() {
        assert!(validate_fraction("contamination", 0.01, false).is_ok());
        assert!(validate_fraction("contamination", 0.5, false).is_ok());
        assert!(validate_fraction("contamination", 0.6, false).is_err());
        assert!(validate_fraction("nu", 1.0, true).is_ok());
        assert!(validate_fraction("nu", 0.0, true).is_err());
        assert!(validate_fraction("nu", f64::NAN, true).is_err());
    }

    #[test]
    fn positive_rejects_zero_and_infinity() {
        assert!(validate_positive("tol", 1e-3).is_ok());
        assert!(validate_positive("tol", 0.0).is_err());
        assert!(validate_positive("tol", f64::INFINITY).is_err());
    }
}

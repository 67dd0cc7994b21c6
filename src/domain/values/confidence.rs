use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite volatility score in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self, String> {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {value}"
            ));
        }
        Ok(Confidence(value))
    }

    /// Builds a score from whole hundredths, clamped to 100.
    pub fn from_points(points: u32) -> Self {
        Confidence(f64::from(points.min(100)) / 100.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = String;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Confidence::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_bounds() {
        assert!(Confidence::new(1.1).is_err());
        assert!(Confidence::new(-0.1).is_err());
        assert_eq!(Confidence::new(0.75).unwrap().value(), 0.75);
    }

    #[test]
    fn test_from_points_is_exact() {
        assert_eq!(Confidence::from_points(70).value(), 0.7);
        assert_eq!(Confidence::from_points(250).value(), 1.0);
    }
}

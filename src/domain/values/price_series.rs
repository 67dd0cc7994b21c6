use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One polling sample for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

/// Chronological price/volume window for one instrument, most recent last.
///
/// Stored as parallel arrays, the shape market-data collaborators hand over.
/// `timestamps` may be empty for synthetic series; otherwise all three arrays
/// have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub instrument: String,
    pub prices: Vec<f64>,
    pub volumes: Vec<f64>,
    #[serde(default)]
    pub timestamps: Vec<DateTime<Utc>>,
}

impl PriceSeries {
    pub fn new(
        instrument: impl Into<String>,
        prices: Vec<f64>,
        volumes: Vec<f64>,
        timestamps: Vec<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        let series = Self {
            instrument: instrument.into(),
            prices,
            volumes,
            timestamps,
        };
        series.validate()?;
        Ok(series)
    }

    pub fn from_samples(instrument: impl Into<String>, samples: &[Sample]) -> Self {
        Self {
            instrument: instrument.into(),
            prices: samples.iter().map(|s| s.price).collect(),
            volumes: samples.iter().map(|s| s.volume).collect(),
            timestamps: samples.iter().map(|s| s.timestamp).collect(),
        }
    }

    /// Checks the parallel-array shape. Series deserialized from JSON should
    /// pass through this before use.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.instrument.trim().is_empty() {
            return Err(DomainError::InvalidInput("instrument is empty".into()));
        }
        if self.prices.len() != self.volumes.len() {
            return Err(DomainError::InvalidInput(format!(
                "{}: {} prices but {} volumes",
                self.instrument,
                self.prices.len(),
                self.volumes.len()
            )));
        }
        if !self.timestamps.is_empty() && self.timestamps.len() != self.prices.len() {
            return Err(DomainError::InvalidInput(format!(
                "{}: {} timestamps for {} prices",
                self.instrument,
                self.timestamps.len(),
                self.prices.len()
            )));
        }
        if self.timestamps.windows(2).any(|w| w[0] > w[1]) {
            return Err(DomainError::InvalidInput(format!(
                "{}: timestamps are not chronological",
                self.instrument
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn latest_price(&self) -> Option<f64> {
        self.prices.last().copied()
    }
}

//! Classifier output.
//!
//! A [`Signal`] is created once by the volatility classifier and never
//! mutated afterwards: fields are private and only readable through
//! accessors. Construction enforces the price-level ordering for the
//! signal's direction, and deserialization goes through the same check.

use crate::domain::error::DomainError;
use crate::domain::values::confidence::Confidence;
use crate::domain::values::direction::Direction;
use crate::domain::values::indicator_set::IndicatorSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEFRAME_HINT: &str = "1-3 hours";

/// Entry, target and stop prices for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub entry: f64,
    pub target: f64,
    pub stop_loss: f64,
}

impl PriceLevels {
    /// BUY: stop < entry < target. SELL: target < entry < stop.
    pub fn is_ordered_for(&self, direction: Direction) -> bool {
        let finite = self.entry.is_finite() && self.target.is_finite() && self.stop_loss.is_finite();
        finite
            && match direction {
                Direction::Buy => self.stop_loss < self.entry && self.entry < self.target,
                Direction::Sell => self.target < self.entry && self.entry < self.stop_loss,
            }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SignalRecord")]
pub struct Signal {
    id: String,
    instrument: String,
    direction: Direction,
    entry_price: f64,
    target_price: f64,
    stop_loss: f64,
    expected_return_pct: f64,
    confidence: Confidence,
    indicators: IndicatorSet,
    created_at: DateTime<Utc>,
    timeframe_hint: String,
}

/// Unvalidated wire shape of a [`Signal`].
#[derive(Deserialize)]
struct SignalRecord {
    id: String,
    instrument: String,
    direction: Direction,
    entry_price: f64,
    target_price: f64,
    stop_loss: f64,
    expected_return_pct: f64,
    confidence: Confidence,
    indicators: IndicatorSet,
    created_at: DateTime<Utc>,
    timeframe_hint: String,
}

impl TryFrom<SignalRecord> for Signal {
    type Error = DomainError;
    fn try_from(r: SignalRecord) -> Result<Self, Self::Error> {
        let levels = PriceLevels {
            entry: r.entry_price,
            target: r.target_price,
            stop_loss: r.stop_loss,
        };
        check_levels(&r.instrument, r.direction, &levels)?;
        Ok(Signal {
            id: r.id,
            instrument: r.instrument,
            direction: r.direction,
            entry_price: r.entry_price,
            target_price: r.target_price,
            stop_loss: r.stop_loss,
            expected_return_pct: r.expected_return_pct,
            confidence: r.confidence,
            indicators: r.indicators,
            created_at: r.created_at,
            timeframe_hint: r.timeframe_hint,
        })
    }
}

fn check_levels(instrument: &str, direction: Direction, levels: &PriceLevels) -> Result<(), DomainError> {
    if levels.is_ordered_for(direction) {
        Ok(())
    } else {
        Err(DomainError::InvalidInput(format!(
            "{direction} signal for {instrument} has misordered levels: entry {:.4}, target {:.4}, stop {:.4}",
            levels.entry, levels.target, levels.stop_loss
        )))
    }
}

impl Signal {
    pub fn new(
        instrument: impl Into<String>,
        direction: Direction,
        levels: PriceLevels,
        expected_return_pct: f64,
        confidence: Confidence,
        indicators: IndicatorSet,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let instrument = instrument.into();
        check_levels(&instrument, direction, &levels)?;
        Ok(Self {
            id: Self::make_id(&instrument, direction, created_at),
            instrument,
            direction,
            entry_price: levels.entry,
            target_price: levels.target,
            stop_loss: levels.stop_loss,
            expected_return_pct,
            confidence,
            indicators,
            created_at,
            timeframe_hint: DEFAULT_TIMEFRAME_HINT.to_string(),
        })
    }

    pub fn with_timeframe_hint(mut self, hint: impl Into<String>) -> Self {
        self.timeframe_hint = hint.into();
        self
    }

    fn make_id(instrument: &str, direction: Direction, created_at: DateTime<Utc>) -> String {
        format!(
            "SIG-{instrument}-{direction}-{}",
            created_at.timestamp_millis()
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn target_price(&self) -> f64 {
        self.target_price
    }

    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    pub fn levels(&self) -> PriceLevels {
        PriceLevels {
            entry: self.entry_price,
            target: self.target_price,
            stop_loss: self.stop_loss,
        }
    }

    pub fn expected_return_pct(&self) -> f64 {
        self.expected_return_pct
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Indicator values the classifier decided on.
    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn timeframe_hint(&self) -> &str {
        &self.timeframe_hint
    }

    /// Plain-text alert body for notifiers.
    pub fn summary(&self) -> String {
        let roi_sign = match self.direction {
            Direction::Buy => "+",
            Direction::Sell => "-",
        };
        format!(
            "{} SIGNAL: {}\n\
             Entry Price: ${:.2}\n\
             Target Price: ${:.2}\n\
             Stop Loss: ${:.2}\n\
             Expected Return: {}{:.2}%\n\
             Confidence: {:.0}%\n\
             Time Frame: {}\n\
             Generated at: {}",
            self.direction,
            self.instrument,
            self.entry_price,
            self.target_price,
            self.stop_loss,
            roi_sign,
            self.expected_return_pct,
            (self.confidence.value() * 100.0).round(),
            self.timeframe_hint,
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
    }

    fn buy_levels() -> PriceLevels {
        PriceLevels { entry: 100.0, target: 101.5, stop_loss: 99.5 }
    }

    #[test]
    fn test_new_signal_has_composite_id() {
        let s = Signal::new(
            "AAPL",
            Direction::Buy,
            buy_levels(),
            1.5,
            Confidence::new(0.8).unwrap(),
            IndicatorSet::default(),
            at(),
        )
        .unwrap();
        assert_eq!(s.id(), format!("SIG-AAPL-BUY-{}", at().timestamp_millis()));
        assert_eq!(s.timeframe_hint(), DEFAULT_TIMEFRAME_HINT);
    }

    #[test]
    fn test_misordered_levels_rejected() {
        let err = Signal::new(
            "AAPL",
            Direction::Sell,
            buy_levels(),
            1.5,
            Confidence::new(0.8).unwrap(),
            IndicatorSet::default(),
            at(),
        );
        assert!(matches!(err, Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_deserialize_validates_levels() {
        let s = Signal::new(
            "MSFT",
            Direction::Buy,
            buy_levels(),
            1.5,
            Confidence::new(0.75).unwrap(),
            IndicatorSet::default(),
            at(),
        )
        .unwrap();
        let mut json = serde_json::to_value(&s).unwrap();
        let back: Signal = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, s);

        json["stop_loss"] = serde_json::json!(105.0);
        assert!(serde_json::from_value::<Signal>(json).is_err());
    }

    #[test]
    fn test_summary_mentions_levels() {
        let s = Signal::new(
            "MSFT",
            Direction::Buy,
            buy_levels(),
            1.5,
            Confidence::new(0.75).unwrap(),
            IndicatorSet::default(),
            at(),
        )
        .unwrap();
        let text = s.summary();
        assert!(text.starts_with("BUY SIGNAL: MSFT"));
        assert!(text.contains("Target Price: $101.50"));
        assert!(text.contains("Confidence: 75%"));
    }
}

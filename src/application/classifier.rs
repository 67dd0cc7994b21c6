//! Volatility classifier.
//!
//! Turns an [`IndicatorSet`] into zero or one [`Signal`]:
//!
//! 1. Composite score from four independent conditions (band proximity,
//!    RSI extreme, volume surge, price move), accumulated in whole points.
//! 2. Direction from band/RSI/momentum rules; conflicting or flat readings
//!    give no direction.
//! 3. Target and stop bounded by the Bollinger bands, expected return gated
//!    by `min_expected_roi`.
//!
//! Stateless: the same input always yields the same decision.

use crate::domain::entities::signal::{PriceLevels, Signal, DEFAULT_TIMEFRAME_HINT};
use crate::domain::values::confidence::Confidence;
use crate::domain::values::direction::Direction;
use crate::domain::values::indicator_set::IndicatorSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Price within 2% of a band counts as touching it.
pub const BAND_PROXIMITY: f64 = 0.02;

const BAND_POINTS: u32 = 30;
const RSI_POINTS: u32 = 25;
const VOLUME_POINTS: u32 = 25;
const VOLATILITY_POINTS: u32 = 20;

// Direction rule levels.
const RSI_OVERSOLD_LEVEL: f64 = 30.0;
const RSI_MIDLINE: f64 = 50.0;
const RSI_OVERBOUGHT_LEVEL: f64 = 70.0;

/// Expected return is quoted to 1e-4 percent.
const RETURN_QUANTUM: f64 = 1e4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Volume ratio (percent of average) above which volume counts as a surge.
    pub volume_threshold: f64,
    /// Absolute percent move between the last two samples.
    pub min_volatility_percent: f64,
    /// Minimum expected return in percent.
    pub min_expected_roi: f64,
    pub confidence_threshold: f64,
    pub stop_loss_percent: f64,
    pub timeframe_hint: String,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            volume_threshold: 150.0,
            min_volatility_percent: 1.0,
            min_expected_roi: 1.5,
            confidence_threshold: 0.7,
            stop_loss_percent: 0.5,
            timeframe_hint: DEFAULT_TIMEFRAME_HINT.to_string(),
        }
    }
}

/// Which score conditions fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub near_band: bool,
    pub rsi_extreme: bool,
    pub volume_surge: bool,
    pub volatile: bool,
}

impl ScoreBreakdown {
    pub fn points(&self) -> u32 {
        [
            (self.near_band, BAND_POINTS),
            (self.rsi_extreme, RSI_POINTS),
            (self.volume_surge, VOLUME_POINTS),
            (self.volatile, VOLATILITY_POINTS),
        ]
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, pts)| pts)
        .sum()
    }

    pub fn confidence(&self) -> Confidence {
        Confidence::from_points(self.points())
    }
}

fn near_upper(set: &IndicatorSet) -> bool {
    set.price >= set.upper_band * (1.0 - BAND_PROXIMITY)
}

fn near_lower(set: &IndicatorSet) -> bool {
    set.price <= set.lower_band * (1.0 + BAND_PROXIMITY)
}

/// Percent return from `entry` to `target` in the signal's favour, quoted to
/// [`RETURN_QUANTUM`].
pub fn expected_return_pct(direction: Direction, entry: f64, target: f64) -> f64 {
    let raw = match direction {
        Direction::Buy => (target - entry) / entry * 100.0,
        Direction::Sell => (entry - target) / entry * 100.0,
    };
    (raw * RETURN_QUANTUM).round() / RETURN_QUANTUM
}

#[derive(Debug, Clone, Default)]
pub struct VolatilityClassifier {
    thresholds: ClassifierThresholds,
}

impl VolatilityClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    pub fn score(&self, set: &IndicatorSet) -> ScoreBreakdown {
        let t = &self.thresholds;
        ScoreBreakdown {
            near_band: set.bands_available() && (near_upper(set) || near_lower(set)),
            rsi_extreme: set.rsi > t.rsi_overbought || set.rsi < t.rsi_oversold,
            volume_surge: set.volume_ratio > t.volume_threshold,
            volatile: set.price_change.abs() > t.min_volatility_percent,
        }
    }

    /// BUY is checked before SELL; neither matching means no direction.
    pub fn direction(&self, set: &IndicatorSet) -> Option<Direction> {
        let rsi = set.rsi;
        let oversold = near_lower(set) && rsi < RSI_OVERSOLD_LEVEL;
        let rising = set.price_change > 0.0 && rsi > RSI_MIDLINE && rsi < RSI_OVERBOUGHT_LEVEL;
        if oversold || rising {
            return Some(Direction::Buy);
        }
        let overbought = near_upper(set) && rsi > RSI_OVERBOUGHT_LEVEL;
        let falling = set.price_change < 0.0 && rsi < RSI_MIDLINE && rsi > RSI_OVERSOLD_LEVEL;
        if overbought || falling {
            return Some(Direction::Sell);
        }
        None
    }

    /// Target capped by the band on the profitable side, stop floored by the
    /// band on the adverse side.
    pub fn price_levels(&self, direction: Direction, set: &IndicatorSet) -> PriceLevels {
        let entry = set.price;
        let roi = self.thresholds.min_expected_roi / 100.0;
        let stop = self.thresholds.stop_loss_percent / 100.0;
        match direction {
            Direction::Buy => PriceLevels {
                entry,
                target: set.upper_band.min(entry * (1.0 + roi)),
                stop_loss: set.lower_band.max(entry * (1.0 - stop)),
            },
            Direction::Sell => PriceLevels {
                entry,
                target: set.lower_band.max(entry * (1.0 - roi)),
                stop_loss: set.upper_band.min(entry * (1.0 + stop)),
            },
        }
    }

    pub fn classify(
        &self,
        instrument: &str,
        set: &IndicatorSet,
        now: DateTime<Utc>,
    ) -> Option<Signal> {
        if !(set.price.is_finite() && set.price > 0.0) || !set.bands_available() {
            debug!(instrument, "insufficient history for bands, no signal");
            return None;
        }

        let breakdown = self.score(set);
        let confidence = breakdown.confidence();
        if confidence.value() < self.thresholds.confidence_threshold {
            debug!(instrument, score = confidence.value(), "score below threshold");
            return None;
        }

        let direction = match self.direction(set) {
            Some(d) => d,
            None => {
                debug!(instrument, rsi = set.rsi, "no clear direction");
                return None;
            }
        };

        let levels = self.price_levels(direction, set);
        let expected = expected_return_pct(direction, levels.entry, levels.target);
        if expected < self.thresholds.min_expected_roi {
            debug!(instrument, %direction, expected, "expected return below minimum");
            return None;
        }
        if !levels.is_ordered_for(direction) {
            debug!(
                instrument,
                %direction,
                entry = levels.entry,
                target = levels.target,
                stop = levels.stop_loss,
                "price beyond band, levels misordered"
            );
            return None;
        }

        Signal::new(instrument, direction, levels, expected, confidence, *set, now)
            .ok()
            .map(|s| s.with_timeframe_hint(self.thresholds.timeframe_hint.clone()))
    }
}

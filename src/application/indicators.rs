//! Indicator engine.
//!
//! Pure functions over a price/volume window. A window shorter than an
//! indicator's period is not an error: the indicator resolves to its neutral
//! value instead (RSI 50, moving average and bands 0, volume ratio 0).

use crate::domain::values::indicator_set::IndicatorSet;
use crate::domain::values::price_series::PriceSeries;
use serde::{Deserialize, Serialize};

pub const NEUTRAL_RSI: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub bollinger_period: usize,
    /// Band half-width in population standard deviations.
    pub bollinger_deviation: f64,
    pub rsi_period: usize,
    pub volume_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            bollinger_period: 20,
            bollinger_deviation: 2.0,
            rsi_period: 14,
            volume_period: 10,
        }
    }
}

/// Mean of the last `period` values, 0 when there are fewer.
pub fn sma(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return 0.0;
    }
    let window = &values[values.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

/// Population standard deviation of the last `period` values, 0 when there are fewer.
pub fn population_std_dev(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return 0.0;
    }
    let mean = sma(values, period);
    let window = &values[values.len() - period..];
    let sum_sq: f64 = window.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / period as f64).sqrt()
}

/// `(mean, upper, lower)` with `mean ± deviation × σ`. All zero on short windows.
pub fn bollinger_bands(values: &[f64], period: usize, deviation: f64) -> (f64, f64, f64) {
    if period == 0 || values.len() < period {
        return (0.0, 0.0, 0.0);
    }
    let mean = sma(values, period);
    let width = deviation * population_std_dev(values, period);
    (mean, mean + width, mean - width)
}

/// Simple (non-smoothed) RSI over the last `period` deltas.
///
/// Needs `period + 1` prices; returns [`NEUTRAL_RSI`] otherwise. A flat or
/// rising window with no losses is 100.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return NEUTRAL_RSI;
    }
    let start = prices.len() - period;
    let (gains, losses) = (start..prices.len()).fold((0.0, 0.0), |(g, l), i| {
        let change = prices[i] - prices[i - 1];
        if change >= 0.0 {
            (g + change, l)
        } else {
            (g, l - change)
        }
    });
    if losses == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + gains / losses)
}

/// Latest volume as a percentage of the mean of the last `period` volumes.
pub fn volume_ratio(volumes: &[f64], period: usize) -> f64 {
    let avg = sma(volumes, period);
    match volumes.last() {
        Some(latest) if avg > 0.0 => latest / avg * 100.0,
        _ => 0.0,
    }
}

/// Percent change between the two most recent prices.
pub fn price_change(prices: &[f64]) -> f64 {
    match prices {
        [.., previous, current] if *previous != 0.0 => (current - previous) / previous * 100.0,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn compute(&self, series: &PriceSeries) -> IndicatorSet {
        let p = &self.params;
        let (sma, upper_band, lower_band) =
            bollinger_bands(&series.prices, p.bollinger_period, p.bollinger_deviation);
        IndicatorSet {
            price: series.latest_price().unwrap_or_default(),
            sma,
            upper_band,
            lower_band,
            rsi: rsi(&series.prices, p.rsi_period),
            volume_ratio: volume_ratio(&series.volumes, p.volume_period),
            price_change: price_change(&series.prices),
        }
    }
}

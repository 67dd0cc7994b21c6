use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Indicator values computed for one instrument at one tick.
///
/// Serializes as a flat name → value map, which is also the shape stored in
/// a signal's audit snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub price: f64,
    pub sma: f64,
    pub upper_band: f64,
    pub lower_band: f64,
    pub rsi: f64,
    pub volume_ratio: f64,
    pub price_change: f64,
}

impl IndicatorSet {
    pub const NAMES: [&'static str; 7] = [
        "price",
        "sma",
        "upper_band",
        "lower_band",
        "rsi",
        "volume_ratio",
        "price_change",
    ];

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "price" => Some(self.price),
            "sma" => Some(self.sma),
            "upper_band" => Some(self.upper_band),
            "lower_band" => Some(self.lower_band),
            "rsi" => Some(self.rsi),
            "volume_ratio" => Some(self.volume_ratio),
            "price_change" => Some(self.price_change),
            _ => None,
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Self::NAMES
            .iter()
            .filter_map(|name| self.get(name).map(|v| (name.to_string(), v)))
            .collect()
    }

    /// Bands resolve to 0 when the window is shorter than the band period.
    pub fn bands_available(&self) -> bool {
        self.upper_band > 0.0 && self.lower_band > 0.0
    }
}

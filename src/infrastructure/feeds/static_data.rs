use crate::domain::ports::market_data::{FeedError, MarketDataProvider};
use crate::domain::values::price_series::PriceSeries;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// In-memory series per instrument, for dry runs and tests.
#[derive(Default)]
pub struct StaticMarketData {
    series: Mutex<HashMap<String, PriceSeries>>,
}

impl StaticMarketData {
    pub fn new(series: impl IntoIterator<Item = PriceSeries>) -> Self {
        let map = series
            .into_iter()
            .map(|s| (s.instrument.clone(), s))
            .collect();
        Self {
            series: Mutex::new(map),
        }
    }

    /// Replaces the series served for its instrument.
    pub fn set(&self, series: PriceSeries) {
        self.series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(series.instrument.clone(), series);
    }

    pub fn remove(&self, instrument: &str) -> Option<PriceSeries> {
        self.series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(instrument)
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_series(&self, instrument: &str) -> Result<PriceSeries, FeedError> {
        self.series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(instrument)
            .cloned()
            .ok_or_else(|| FeedError::Config(format!("No series for {instrument}")))
    }
}

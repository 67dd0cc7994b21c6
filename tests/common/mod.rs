//! Shared test helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hustler::config::Config;
use hustler::domain::entities::position::Position;
use hustler::domain::entities::signal::{PriceLevels, Signal};
use hustler::domain::error::DomainError;
use hustler::domain::ports::notifier::SignalNotifier;
use hustler::domain::ports::trade_store::{PositionFilter, TradeStore};
use hustler::domain::values::confidence::Confidence;
use hustler::domain::values::direction::Direction;
use hustler::domain::values::indicator_set::IndicatorSet;
use hustler::domain::values::price_series::PriceSeries;
use hustler::infrastructure::feeds::static_data::StaticMarketData;
use hustler::Hustler;
use std::sync::{Arc, Mutex};

/// Collects notifications instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    pub signals: Mutex<Vec<String>>,
    pub closed: Mutex<Vec<String>>,
}

#[async_trait]
impl SignalNotifier for RecordingNotifier {
    async fn notify_signal(&self, signal: &Signal) -> Result<(), DomainError> {
        self.signals.lock().unwrap().push(signal.id().to_string());
        Ok(())
    }

    async fn notify_closed(&self, position: &Position) -> Result<(), DomainError> {
        self.closed.lock().unwrap().push(position.instrument.clone());
        Ok(())
    }
}

/// Audit store that reads back nothing and rejects every write.
pub struct FailingStore;

impl TradeStore for FailingStore {
    fn record_signal(&self, _: &Signal) -> Result<(), DomainError> {
        Err(DomainError::Database("disk I/O error".into()))
    }

    fn save_position(&self, _: &Position) -> Result<(), DomainError> {
        Err(DomainError::Database("disk I/O error".into()))
    }

    fn get_position(&self, _: &str) -> Result<Option<Position>, DomainError> {
        Ok(None)
    }

    fn list_positions(&self, _: &PositionFilter) -> Result<Vec<Position>, DomainError> {
        Ok(vec![])
    }

    fn list_signals(&self, _: Option<&str>, _: Option<usize>) -> Result<Vec<Signal>, DomainError> {
        Ok(vec![])
    }
}

pub fn test_config(instruments: &[&str]) -> Config {
    Config {
        instruments: instruments.iter().map(|s| s.to_string()).collect(),
        db_path: ":memory:".into(),
        ..Config::default()
    }
}

pub fn setup_with(config: Config, series: Vec<PriceSeries>) -> (Hustler, Arc<StaticMarketData>, Arc<RecordingNotifier>) {
    let market = Arc::new(StaticMarketData::new(series));
    let notifier = Arc::new(RecordingNotifier::default());
    let hustler = Hustler::with_providers(config, market.clone(), notifier.clone()).unwrap();
    (hustler, market, notifier)
}

pub fn setup_with_store(config: Config, store: Arc<dyn TradeStore>) -> Hustler {
    let market = Arc::new(StaticMarketData::new(vec![]));
    Hustler::with_store(config, store, market, Arc::new(RecordingNotifier::default())).unwrap()
}

pub fn setup() -> Hustler {
    setup_with(test_config(&["AAPL"]), vec![]).0
}

/// 2024-01-08 is a Monday; New York is UTC-5 in January.
pub fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, hour, minute, 0).unwrap()
}

pub fn series(instrument: &str, prices: Vec<f64>, volumes: Vec<f64>) -> PriceSeries {
    PriceSeries::new(instrument, prices, volumes, vec![]).unwrap()
}

/// Oscillates 98/102 around 100, then closes with a 2% jump on rising volume.
/// Classifies as BUY at 102.
pub fn spike_series(instrument: &str) -> PriceSeries {
    let mut prices: Vec<f64> = (0..23).map(|i| if i % 2 == 0 { 98.0 } else { 102.0 }).collect();
    prices.extend([100.0, 102.0]);
    let mut volumes = vec![1000.0; 23];
    volumes.extend([2000.0, 3000.0]);
    series(instrument, prices, volumes)
}

/// Steady decline into the lower band with a volume surge. Classifies as BUY at 100.8.
pub fn falling_series(instrument: &str) -> PriceSeries {
    let prices = (0..25).map(|i| 120.0 - 0.8 * i as f64).collect();
    let mut volumes = vec![1000.0; 24];
    volumes.push(3000.0);
    series(instrument, prices, volumes)
}

/// Steady climb into the upper band with a volume surge. Classifies as SELL at 99.2.
pub fn rising_series(instrument: &str) -> PriceSeries {
    let prices = (0..25).map(|i| 80.0 + 0.8 * i as f64).collect();
    let mut volumes = vec![1000.0; 24];
    volumes.push(3000.0);
    series(instrument, prices, volumes)
}

/// Too short for bands: never classifies, but carries a live price.
pub fn quote(instrument: &str, price: f64) -> PriceSeries {
    series(instrument, vec![price, price], vec![1000.0, 1000.0])
}

pub fn make_signal(instrument: &str, direction: Direction, entry: f64, at: DateTime<Utc>) -> Signal {
    let levels = match direction {
        Direction::Buy => PriceLevels { entry, target: entry * 1.015, stop_loss: entry * 0.995 },
        Direction::Sell => PriceLevels { entry, target: entry * 0.985, stop_loss: entry * 1.005 },
    };
    Signal::new(
        instrument,
        direction,
        levels,
        1.5,
        Confidence::new(0.75).unwrap(),
        IndicatorSet::default(),
        at,
    )
    .unwrap()
}

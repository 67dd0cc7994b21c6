pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::analyze::{Analysis, AnalyzeUseCase};
use crate::application::monitor::{Collaborators, MarketMonitor, TickReport};
use crate::application::performance::{PerformanceMetrics, PerformanceTracker};
use crate::application::risk::RiskManager;
use crate::config::Config;
use crate::domain::entities::position::{Position, PositionStatus};
use crate::domain::entities::signal::Signal;
use crate::domain::error::DomainError;
use crate::domain::ports::market_data::MarketDataProvider;
use crate::domain::ports::notifier::SignalNotifier;
use crate::domain::ports::trade_store::{PositionFilter, TradeStore};
use crate::domain::values::outcome::ActionOutcome;
use crate::domain::values::price_series::PriceSeries;
use crate::domain::values::risk_state::{DailyRiskState, RiskReport};
use crate::infrastructure::feeds::yahoo::YahooMarketData;
use crate::infrastructure::notify::log_notifier::LogNotifier;
use crate::infrastructure::sqlite::migrations::run_migrations;
use crate::infrastructure::sqlite::trade_store::SqliteTradeStore;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Newest closed positions read back at startup to rebuild the day's
/// realized PnL.
const RESTORE_CLOSED_LIMIT: usize = 500;

pub struct Hustler {
    config: Config,
    store: Arc<dyn TradeStore>,
    analyzer: Arc<AnalyzeUseCase>,
    risk: Arc<RiskManager>,
    performance: Arc<PerformanceTracker>,
    monitor: MarketMonitor,
}

impl Hustler {
    /// Yahoo market data and log alerts.
    pub fn new(config: Config) -> Result<Self, DomainError> {
        let market_data = Arc::new(YahooMarketData::new(
            config.market_data.range.clone(),
            config.market_data.interval.clone(),
        ));
        Self::with_providers(config, market_data, Arc::new(LogNotifier))
    }

    /// SQLite audit store at `config.db_path`.
    pub fn with_providers(
        config: Config,
        market_data: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn SignalNotifier>,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        let conn = Connection::open(&config.db_path)?;
        run_migrations(&conn)?;
        let store: Arc<dyn TradeStore> = Arc::new(SqliteTradeStore::new(conn));
        Self::with_store(config, store, market_data, notifier)
    }

    /// Restores open positions and already-realized PnL from `store`, so a
    /// restart resumes the same book and the same daily halt.
    pub fn with_store(
        config: Config,
        store: Arc<dyn TradeStore>,
        market_data: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn SignalNotifier>,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        let risk = Arc::new(RiskManager::from_limits(&config.risk, config.trading_window()?));

        let open = store.list_positions(&PositionFilter {
            status: Some(PositionStatus::Open),
            ..Default::default()
        })?;
        let restored = risk.lifecycle().restore(open);
        let closed = store.list_positions(&PositionFilter {
            status: Some(PositionStatus::Closed),
            limit: Some(RESTORE_CLOSED_LIMIT),
            ..Default::default()
        })?;
        let carried = risk.restore_day(&closed);
        if restored > 0 || carried > 0 {
            info!(restored, carried, "trading state restored from store");
        }

        let analyzer = Arc::new(AnalyzeUseCase::new(config.indicators, config.thresholds.clone()));
        let performance = Arc::new(PerformanceTracker::with_retention(config.performance_retention()));
        let monitor = MarketMonitor::new(
            config.instruments.clone(),
            config.poll_interval(),
            analyzer.clone(),
            risk.clone(),
            Collaborators {
                market_data,
                store: store.clone(),
                notifier,
                performance: performance.clone(),
            },
        );

        Ok(Self {
            config,
            store,
            analyzer,
            risk,
            performance,
            monitor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // Signals

    pub fn analyze(&self, series: &PriceSeries, now: DateTime<Utc>) -> Result<Analysis, DomainError> {
        series.validate()?;
        Ok(self.analyzer.analyze(series, now))
    }

    pub fn signals(&self, instrument: Option<&str>, limit: Option<usize>) -> Result<Vec<Signal>, DomainError> {
        self.store.list_signals(instrument, limit)
    }

    // Positions and risk
    //
    // The in-memory book is authoritative once a transition happened: a
    // failed audit write is logged and the outcome is still returned.

    fn save(&self, position: &Position) {
        if let Err(e) = self.store.save_position(position) {
            warn!(position = %position.id, error = %e, "failed to save position");
        }
    }

    fn settle(&self, closed: &[Position]) {
        for position in closed {
            self.save(position);
            self.performance.position_closed(position);
        }
    }

    pub fn act_on_signal(&self, signal: &Signal, live_price: f64, now: DateTime<Utc>) -> ActionOutcome {
        let outcome = self.risk.act_on_signal(signal, live_price, now);
        match &outcome {
            ActionOutcome::Opened { position } => {
                self.save(position);
                self.performance.position_opened(position);
            }
            ActionOutcome::Closed { position } => self.settle(std::slice::from_ref(position)),
            _ => {}
        }
        outcome
    }

    pub fn scan(&self, live_prices: &HashMap<String, f64>, now: DateTime<Utc>) -> (Vec<Position>, RiskReport) {
        let (closed, report) = self.risk.scan(live_prices, now);
        self.settle(&closed);
        (closed, report)
    }

    pub fn flatten_all(&self, live_prices: &HashMap<String, f64>, now: DateTime<Utc>) -> Vec<Position> {
        let closed = self.risk.flatten_all(live_prices, now);
        self.settle(&closed);
        closed
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.risk.lifecycle().open_positions()
    }

    pub fn positions(&self, filter: &PositionFilter) -> Result<Vec<Position>, DomainError> {
        self.store.list_positions(filter)
    }

    pub fn risk_state(&self, now: DateTime<Utc>) -> DailyRiskState {
        self.risk.daily_state(now)
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.performance.metrics()
    }

    // Polling

    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        self.monitor.tick(now).await
    }

    pub async fn run(&self, stop: watch::Receiver<bool>) {
        self.monitor.run(stop).await
    }
}

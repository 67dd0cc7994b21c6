//! Polling orchestrator.
//!
//! One tick runs in a fixed order: fetch every series, classify the whole
//! batch, act on the signals, run the risk scan, then flatten if the window
//! is closing. Per-instrument failures are logged and never stop the tick.

use crate::application::analyze::AnalyzeUseCase;
use crate::application::performance::PerformanceTracker;
use crate::application::risk::RiskManager;
use crate::domain::entities::position::Position;
use crate::domain::entities::signal::Signal;
use crate::domain::ports::market_data::MarketDataProvider;
use crate::domain::ports::notifier::SignalNotifier;
use crate::domain::ports::trade_store::TradeStore;
use crate::domain::values::outcome::ActionOutcome;
use crate::domain::values::price_series::PriceSeries;
use crate::domain::values::risk_state::RiskReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub instrument: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    /// True when the tick fell outside the trading window.
    pub skipped: bool,
    pub signals: Vec<Signal>,
    pub outcomes: Vec<ActionOutcome>,
    /// Positions closed by the risk scan or the flatten step.
    pub closed: Vec<Position>,
    pub risk: Option<RiskReport>,
    pub halted: bool,
    pub flattened: bool,
    pub fetch_errors: Vec<FetchFailure>,
}

/// Outbound collaborators of the monitor.
pub struct Collaborators {
    pub market_data: Arc<dyn MarketDataProvider>,
    pub store: Arc<dyn TradeStore>,
    pub notifier: Arc<dyn SignalNotifier>,
    pub performance: Arc<PerformanceTracker>,
}

pub struct MarketMonitor {
    instruments: Vec<String>,
    poll_interval: Duration,
    analyzer: Arc<AnalyzeUseCase>,
    risk: Arc<RiskManager>,
    io: Collaborators,
}

impl MarketMonitor {
    pub fn new(
        instruments: Vec<String>,
        poll_interval: Duration,
        analyzer: Arc<AnalyzeUseCase>,
        risk: Arc<RiskManager>,
        io: Collaborators,
    ) -> Self {
        Self {
            instruments,
            poll_interval,
            analyzer,
            risk,
            io,
        }
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    async fn fetch_all(&self, report: &mut TickReport) -> Vec<PriceSeries> {
        let mut batch = Vec::with_capacity(self.instruments.len());
        for instrument in &self.instruments {
            let fetched = self
                .io
                .market_data
                .fetch_series(instrument)
                .await
                .map_err(|e| e.to_string())
                .and_then(|s| s.validate().map(|_| s).map_err(|e| e.to_string()));
            match fetched {
                Ok(series) => batch.push(series),
                Err(error) => {
                    warn!(instrument = %instrument, provider = self.io.market_data.name(), %error, "fetch failed");
                    report.fetch_errors.push(FetchFailure {
                        instrument: instrument.clone(),
                        error,
                    });
                }
            }
        }
        batch
    }

    async fn publish_signal(&self, signal: &Signal) {
        info!(
            instrument = signal.instrument(),
            direction = %signal.direction(),
            entry = signal.entry_price(),
            target = signal.target_price(),
            stop = signal.stop_loss(),
            confidence = signal.confidence().value(),
            "signal generated"
        );
        if let Err(e) = self.io.store.record_signal(signal) {
            warn!(signal = signal.id(), error = %e, "failed to record signal");
        }
        if let Err(e) = self.io.notifier.notify_signal(signal).await {
            warn!(signal = signal.id(), error = %e, "failed to notify signal");
        }
        self.io.performance.record_signal(signal);
    }

    fn save(&self, position: &Position) {
        if let Err(e) = self.io.store.save_position(position) {
            warn!(position = %position.id, error = %e, "failed to save position");
        }
    }

    async fn settle_closed(&self, position: &Position) {
        self.save(position);
        if let Err(e) = self.io.notifier.notify_closed(position).await {
            warn!(position = %position.id, error = %e, "failed to notify close");
        }
        self.io.performance.position_closed(position);
    }

    /// One full pass over the watch list at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport {
            at: now,
            ..TickReport::default()
        };

        if !self.risk.is_within_trading_window(now) {
            debug!(%now, "outside trading window, tick skipped");
            report.skipped = true;
            report.halted = self.risk.is_halted(now);
            return report;
        }

        let batch = self.fetch_all(&mut report).await;
        let prices: HashMap<String, f64> = batch
            .iter()
            .filter_map(|s| s.latest_price().map(|p| (s.instrument.clone(), p)))
            .collect();

        // Whole batch is classified before any position changes.
        let signals: Vec<Signal> = self
            .analyzer
            .analyze_batch(&batch, now)
            .into_iter()
            .filter_map(|a| a.signal)
            .collect();

        for signal in &signals {
            self.publish_signal(signal).await;
            let price = prices.get(signal.instrument()).copied().unwrap_or(signal.entry_price());
            let outcome = self.risk.act_on_signal(signal, price, now);
            match &outcome {
                ActionOutcome::Opened { position } => {
                    self.save(position);
                    self.io.performance.position_opened(position);
                }
                ActionOutcome::Closed { position } => self.settle_closed(position).await,
                noop => info!(instrument = noop.instrument(), reason = %noop.reason(), "signal not acted on"),
            }
            report.outcomes.push(outcome);
        }
        report.signals = signals;

        let (stopped, risk_report) = self.risk.scan(&prices, now);
        for position in &stopped {
            self.settle_closed(position).await;
        }
        report.closed.extend(stopped);
        report.halted = risk_report.state.halted;
        report.risk = Some(risk_report);

        if self.risk.should_flatten(now) {
            let flattened = self.risk.flatten_all(&prices, now);
            for position in &flattened {
                self.settle_closed(position).await;
            }
            let expired = self.io.performance.expire_unfilled(now);
            let pruned = self.io.performance.prune(now);
            debug!(closed = flattened.len(), expired, pruned, "end of day flatten");
            report.closed.extend(flattened);
            report.flattened = true;
        }

        report
    }

    /// Ticks on the poll interval until `stop` turns true or its sender is
    /// dropped. A tick in progress always completes.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            instruments = self.instruments.len(),
            interval_secs = self.poll_interval.as_secs(),
            "market monitor started"
        );
        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if !report.skipped {
                        info!(
                            signals = report.signals.len(),
                            closed = report.closed.len(),
                            halted = report.halted,
                            fetch_errors = report.fetch_errors.len(),
                            "tick complete"
                        );
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("market monitor stopped");
    }
}

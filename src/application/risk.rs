//! Risk gates around the lifecycle manager.
//!
//! The daily state lock is always taken before the lifecycle lock and held
//! while the lifecycle acts. A halt decided by a scan is therefore visible to
//! every signal that acts after it: the breaker always wins.
//!
//! Realized PnL from earlier runs can be carried in with
//! [`RiskManager::restore_day`], so a restart never clears a day's halt.

use crate::application::lifecycle::TradeLifecycleManager;
use crate::domain::entities::position::Position;
use crate::domain::entities::signal::Signal;
use crate::domain::values::outcome::ActionOutcome;
use crate::domain::values::risk_state::{DailyRiskState, RiskReport};
use crate::domain::values::trading_window::TradingWindow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    pub capital_per_instrument: f64,
    pub max_loss_per_trade: f64,
    pub max_daily_loss: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            capital_per_instrument: 1000.0,
            max_loss_per_trade: 50.0,
            max_daily_loss: 200.0,
        }
    }
}

#[derive(Debug)]
struct RiskBook {
    day: DailyRiskState,
    /// Realized PnL per trading day restored from closed positions, applied
    /// when that day becomes current.
    carried: BTreeMap<NaiveDate, f64>,
}

pub struct RiskManager {
    lifecycle: Arc<TradeLifecycleManager>,
    max_daily_loss: f64,
    window: TradingWindow,
    state: Mutex<RiskBook>,
}

impl RiskManager {
    pub fn new(lifecycle: Arc<TradeLifecycleManager>, max_daily_loss: f64, window: TradingWindow) -> Self {
        Self {
            lifecycle,
            max_daily_loss,
            window,
            // The first check of any real day rolls this over.
            state: Mutex::new(RiskBook {
                day: DailyRiskState::new(NaiveDate::MIN),
                carried: BTreeMap::new(),
            }),
        }
    }

    pub fn from_limits(limits: &RiskLimits, window: TradingWindow) -> Self {
        let lifecycle = TradeLifecycleManager::new(limits.capital_per_instrument, limits.max_loss_per_trade);
        Self::new(Arc::new(lifecycle), limits.max_daily_loss, window)
    }

    pub fn lifecycle(&self) -> &Arc<TradeLifecycleManager> {
        &self.lifecycle
    }

    pub fn window(&self) -> &TradingWindow {
        &self.window
    }

    pub fn max_daily_loss(&self) -> f64 {
        self.max_daily_loss
    }

    fn lock(&self) -> MutexGuard<'_, RiskBook> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the daily state, resetting it first if `now` is a later trading day.
    fn state_at(&self, now: DateTime<Utc>) -> MutexGuard<'_, RiskBook> {
        let mut book = self.lock();
        let previous = book.day.trading_day;
        let today = self.window.trading_day(now);
        if book.day.roll_over(today) {
            if previous != NaiveDate::MIN {
                info!(%previous, %today, "new trading day, daily risk state reset");
            }
            self.apply_carried(&mut book);
        }
        book
    }

    /// Folds carried PnL for the current day into the state and re-checks
    /// the breaker on realized PnL alone.
    fn apply_carried(&self, book: &mut RiskBook) {
        let today = book.day.trading_day;
        book.carried.retain(|day, _| *day >= today);
        let Some(pnl) = book.carried.remove(&today) else {
            return;
        };
        book.day.realized_pnl += pnl;
        if !book.day.halted && book.day.realized_pnl <= -self.max_daily_loss {
            book.day.halted = true;
            warn!(
                realized_pnl = book.day.realized_pnl,
                max_daily_loss = self.max_daily_loss,
                "restored realized loss exceeds daily limit, trading halted"
            );
        }
    }

    fn book_closes(state: &mut DailyRiskState, closed: &[Position]) {
        state.realized_pnl += closed.iter().filter_map(|p| p.realized_pnl).sum::<f64>();
    }

    /// Carries the realized PnL of already-closed positions (e.g. from the
    /// audit store at startup) into the trading day each was closed on.
    /// Positions without a close time or PnL are ignored. Returns how many
    /// positions were counted.
    pub fn restore_day(&self, closed: &[Position]) -> usize {
        let mut book = self.lock();
        let mut counted = 0;
        for position in closed {
            let (Some(closed_at), Some(pnl)) = (position.closed_at, position.realized_pnl) else {
                continue;
            };
            *book.carried.entry(self.window.trading_day(closed_at)).or_default() += pnl;
            counted += 1;
        }
        self.apply_carried(&mut book);
        counted
    }

    /// Acts on a signal unless the day is halted.
    pub fn act_on_signal(&self, signal: &Signal, live_price: f64, now: DateTime<Utc>) -> ActionOutcome {
        let mut book = self.state_at(now);
        if book.day.halted {
            return ActionOutcome::Halted {
                instrument: signal.instrument().to_string(),
            };
        }
        let outcome = self.lifecycle.act_on_signal(signal, live_price, now);
        if let ActionOutcome::Closed { position } = &outcome {
            Self::book_closes(&mut book.day, std::slice::from_ref(position));
        }
        outcome
    }

    /// Per-trade stop followed by the day-loss breaker.
    ///
    /// The breaker trips once realized plus unrealized PnL is at or below
    /// `-max_daily_loss`. It never closes positions by itself.
    pub fn scan(&self, live_prices: &HashMap<String, f64>, now: DateTime<Utc>) -> (Vec<Position>, RiskReport) {
        let mut book = self.state_at(now);
        let state = &mut book.day;
        let closed = self.lifecycle.scan_stop_loss(live_prices, now);
        Self::book_closes(state, &closed);

        let unrealized_pnl = self.lifecycle.unrealized_pnl(live_prices);
        let aggregate_pnl = state.realized_pnl + unrealized_pnl;
        let newly_halted = !state.halted && aggregate_pnl <= -self.max_daily_loss;
        if newly_halted {
            state.halted = true;
            warn!(
                aggregate_pnl,
                max_daily_loss = self.max_daily_loss,
                "daily loss limit reached, trading halted until next day"
            );
        }

        let report = RiskReport {
            state: *state,
            unrealized_pnl,
            aggregate_pnl,
            max_daily_loss: self.max_daily_loss,
            newly_halted,
        };
        (closed, report)
    }

    pub fn flatten_all(&self, live_prices: &HashMap<String, f64>, now: DateTime<Utc>) -> Vec<Position> {
        let mut book = self.state_at(now);
        let closed = self.lifecycle.flatten_all(live_prices, now);
        Self::book_closes(&mut book.day, &closed);
        if !closed.is_empty() {
            info!(count = closed.len(), realized_pnl = book.day.realized_pnl, "positions flattened");
        }
        closed
    }

    /// Copy of the daily state as of `now`.
    pub fn daily_state(&self, now: DateTime<Utc>) -> DailyRiskState {
        self.state_at(now).day
    }

    pub fn is_halted(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now).day.halted
    }

    pub fn is_within_trading_window(&self, now: DateTime<Utc>) -> bool {
        self.window.is_within(now)
    }

    pub fn should_flatten(&self, now: DateTime<Utc>) -> bool {
        self.window.should_flatten(now)
    }
}

//! Trade lifecycle: at most one open position per instrument.
//!
//! Every state change happens under a single lock on the position book.
//! Callers only ever see copies of positions. The audit store keeps the full
//! history; the book only remembers the most recent closes.

use crate::domain::entities::position::{CloseReason, Position};
use crate::domain::entities::signal::Signal;
use crate::domain::values::direction::Direction;
use crate::domain::values::outcome::ActionOutcome;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Closed positions kept in memory.
pub const CLOSED_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Default)]
struct PositionBook {
    open: HashMap<String, Position>,
    closed: VecDeque<Position>,
}

impl PositionBook {
    fn close(
        &mut self,
        instrument: &str,
        price: f64,
        reason: CloseReason,
        detail: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Position> {
        let mut position = self.open.remove(instrument)?;
        position.close(price, reason, detail, now);
        if self.closed.len() == CLOSED_HISTORY_LIMIT {
            self.closed.pop_front();
        }
        self.closed.push_back(position.clone());
        Some(position)
    }

    /// Open instruments in name order, so batch closes are deterministic.
    fn open_instruments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.open.keys().cloned().collect();
        names.sort();
        names
    }
}

fn usable_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

pub struct TradeLifecycleManager {
    capital_per_instrument: f64,
    max_loss_per_trade: f64,
    book: Mutex<PositionBook>,
}

impl TradeLifecycleManager {
    pub fn new(capital_per_instrument: f64, max_loss_per_trade: f64) -> Self {
        Self {
            capital_per_instrument,
            max_loss_per_trade,
            book: Mutex::new(PositionBook::default()),
        }
    }

    pub fn capital_per_instrument(&self) -> f64 {
        self.capital_per_instrument
    }

    pub fn max_loss_per_trade(&self) -> f64 {
        self.max_loss_per_trade
    }

    fn book(&self) -> MutexGuard<'_, PositionBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-seeds open positions, e.g. from the audit store at startup.
    /// Closed or duplicate entries are ignored.
    pub fn restore(&self, positions: Vec<Position>) -> usize {
        let mut book = self.book();
        let mut restored = 0;
        for position in positions.into_iter().filter(Position::is_open) {
            if book.open.contains_key(&position.instrument) {
                warn!(instrument = %position.instrument, id = %position.id, "duplicate open position ignored");
                continue;
            }
            book.open.insert(position.instrument.clone(), position);
            restored += 1;
        }
        restored
    }

    /// Applies one signal at the given live price.
    ///
    /// Opens a long on BUY when flat, closes on a signal opposing the open
    /// position, and reports everything else as a no-op.
    pub fn act_on_signal(&self, signal: &Signal, live_price: f64, now: DateTime<Utc>) -> ActionOutcome {
        let instrument = signal.instrument();
        if !usable_price(live_price) {
            return ActionOutcome::InvalidPrice {
                instrument: instrument.to_string(),
                price: live_price,
            };
        }

        let mut book = self.book();
        match book.open.get(instrument).map(|p| p.direction) {
            Some(held) if held == signal.direction() => ActionOutcome::AlreadyOpen {
                instrument: instrument.to_string(),
            },
            Some(_) => match book.close(instrument, live_price, CloseReason::OpposingSignal, None, now) {
                Some(position) => {
                    info!(
                        instrument,
                        pnl = position.realized_pnl.unwrap_or_default(),
                        "position closed on opposing signal"
                    );
                    ActionOutcome::Closed { position }
                }
                None => ActionOutcome::NoPosition {
                    instrument: instrument.to_string(),
                },
            },
            // Long-only: a SELL never opens a short.
            None if signal.direction() == Direction::Sell => ActionOutcome::NoPosition {
                instrument: instrument.to_string(),
            },
            None => {
                let quantity = (self.capital_per_instrument / live_price).floor();
                if quantity < 1.0 {
                    return ActionOutcome::InsufficientCapital {
                        instrument: instrument.to_string(),
                        price: live_price,
                        capital: self.capital_per_instrument,
                    };
                }
                let position = Position::open(
                    instrument.to_string(),
                    signal.direction(),
                    quantity as u64,
                    live_price,
                    Some(signal.id().to_string()),
                    now,
                );
                info!(instrument, quantity = position.quantity, price = live_price, "position opened");
                book.open.insert(instrument.to_string(), position.clone());
                ActionOutcome::Opened { position }
            }
        }
    }

    /// Closes every open position whose unrealized loss strictly exceeds
    /// `max_loss_per_trade`. Instruments without a usable price are skipped.
    pub fn scan_stop_loss(&self, live_prices: &HashMap<String, f64>, now: DateTime<Utc>) -> Vec<Position> {
        let mut book = self.book();
        let mut closed = Vec::new();
        for instrument in book.open_instruments() {
            let Some(&price) = live_prices.get(&instrument).filter(|p| usable_price(**p)) else {
                continue;
            };
            let loss = book.open.get(&instrument).map(|p| -p.pnl_at(price)).unwrap_or_default();
            if loss <= self.max_loss_per_trade {
                continue;
            }
            let detail = format!(
                "Stop loss triggered: loss of ${loss:.2} exceeds max loss of ${:.2}",
                self.max_loss_per_trade
            );
            warn!(instrument = %instrument, loss, "stop loss triggered");
            if let Some(position) = book.close(&instrument, price, CloseReason::StopLoss, Some(detail), now) {
                closed.push(position);
            }
        }
        closed
    }

    /// Closes every open position that has a usable live price.
    pub fn flatten_all(&self, live_prices: &HashMap<String, f64>, now: DateTime<Utc>) -> Vec<Position> {
        let mut book = self.book();
        let mut closed = Vec::new();
        for instrument in book.open_instruments() {
            match live_prices.get(&instrument).copied().filter(|p| usable_price(*p)) {
                Some(price) => {
                    if let Some(position) = book.close(&instrument, price, CloseReason::EodFlatten, None, now) {
                        closed.push(position);
                    }
                }
                None => warn!(instrument = %instrument, "no live price, position left open at flatten"),
            }
        }
        closed
    }

    /// Copies of all open positions, ordered by instrument.
    pub fn open_positions(&self) -> Vec<Position> {
        let book = self.book();
        book.open_instruments()
            .iter()
            .filter_map(|i| book.open.get(i).cloned())
            .collect()
    }

    pub fn open_position(&self, instrument: &str) -> Option<Position> {
        self.book().open.get(instrument).cloned()
    }

    /// Copies of the most recent closes, oldest first, at most
    /// [`CLOSED_HISTORY_LIMIT`].
    pub fn closed_positions(&self) -> Vec<Position> {
        self.book().closed.iter().cloned().collect()
    }

    /// Sum of unrealized PnL over open positions with a usable price.
    pub fn unrealized_pnl(&self, live_prices: &HashMap<String, f64>) -> f64 {
        self.book()
            .open
            .values()
            .filter_map(|p| {
                live_prices
                    .get(&p.instrument)
                    .filter(|price| usable_price(**price))
                    .map(|price| p.pnl_at(*price))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::position::PositionStatus;
    use crate::domain::entities::signal::PriceLevels;
    use crate::domain::values::confidence::Confidence;
    use crate::domain::values::indicator_set::IndicatorSet;

    fn signal(instrument: &str, direction: Direction, entry: f64) -> Signal {
        let levels = match direction {
            Direction::Buy => PriceLevels { entry, target: entry * 1.02, stop_loss: entry * 0.99 },
            Direction::Sell => PriceLevels { entry, target: entry * 0.98, stop_loss: entry * 1.01 },
        };
        Signal::new(
            instrument,
            direction,
            levels,
            2.0,
            Confidence::new(0.8).unwrap(),
            IndicatorSet::default(),
            Utc::now(),
        )
        .unwrap()
    }

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_buy_opens_sized_position() {
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        let outcome = lm.act_on_signal(&signal("AAPL", Direction::Buy, 150.0), 150.0, Utc::now());
        let position = outcome.position().expect("opened");
        assert_eq!(position.quantity, 6);
        assert_eq!(position.direction, Direction::Buy);
        assert_eq!(position.status, PositionStatus::Open);
        assert!(position.signal_id.as_deref().unwrap().starts_with("SIG-AAPL-BUY-"));
    }

    #[test]
    fn test_insufficient_capital() {
        let lm = TradeLifecycleManager::new(100.0, 50.0);
        let outcome = lm.act_on_signal(&signal("BRK", Direction::Buy, 500.0), 500.0, Utc::now());
        assert!(matches!(outcome, ActionOutcome::InsufficientCapital { .. }));
        assert!(lm.open_positions().is_empty());
    }

    #[test]
    fn test_invalid_live_price() {
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        let outcome = lm.act_on_signal(&signal("AAPL", Direction::Buy, 100.0), f64::NAN, Utc::now());
        assert!(matches!(outcome, ActionOutcome::InvalidPrice { .. }));
    }

    #[test]
    fn test_sell_closes_long() {
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        lm.act_on_signal(&signal("AAPL", Direction::Buy, 100.0), 100.0, Utc::now());
        let outcome = lm.act_on_signal(&signal("AAPL", Direction::Sell, 104.0), 104.0, Utc::now());
        let closed = outcome.position().expect("closed");
        assert_eq!(closed.realized_pnl, Some(40.0));
        assert_eq!(closed.close_reason, Some(CloseReason::OpposingSignal));
        assert!(lm.open_positions().is_empty());
        assert_eq!(lm.closed_positions().len(), 1);
    }

    #[test]
    fn test_stop_loss_is_strict() {
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        lm.act_on_signal(&signal("AAPL", Direction::Buy, 100.0), 100.0, Utc::now());
        assert!(lm.scan_stop_loss(&prices(&[("AAPL", 95.0)]), Utc::now()).is_empty());
        let closed = lm.scan_stop_loss(&prices(&[("AAPL", 94.0)]), Utc::now());
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].realized_pnl, Some(-60.0));
        assert!(closed[0].close_detail.as_deref().unwrap().contains("$60.00"));
    }

    #[test]
    fn test_flatten_skips_missing_prices() {
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        lm.act_on_signal(&signal("AAPL", Direction::Buy, 100.0), 100.0, Utc::now());
        lm.act_on_signal(&signal("MSFT", Direction::Buy, 200.0), 200.0, Utc::now());
        let closed = lm.flatten_all(&prices(&[("MSFT", 201.0)]), Utc::now());
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].instrument, "MSFT");
        assert_eq!(closed[0].close_reason, Some(CloseReason::EodFlatten));
        assert_eq!(lm.open_positions().len(), 1);
    }

    #[test]
    fn test_open_positions_are_copies() {
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        lm.act_on_signal(&signal("AAPL", Direction::Buy, 100.0), 100.0, Utc::now());
        let mut copy = lm.open_positions();
        copy[0].quantity = 999;
        assert_eq!(lm.open_position("AAPL").unwrap().quantity, 10);
    }

    #[test]
    fn test_restore_ignores_closed_and_duplicates() {
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        let open = Position::open("AAPL".into(), Direction::Buy, 10, 100.0, None, Utc::now());
        let dup = Position::open("AAPL".into(), Direction::Buy, 5, 101.0, None, Utc::now());
        let mut closed = Position::open("MSFT".into(), Direction::Buy, 5, 200.0, None, Utc::now());
        closed.close(210.0, CloseReason::OpposingSignal, None, Utc::now());
        assert_eq!(lm.restore(vec![open, dup, closed]), 1);
        assert_eq!(lm.open_position("AAPL").unwrap().quantity, 10);
    }

    #[test]
    fn test_closed_history_is_bounded() {
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        for round in 0..CLOSED_HISTORY_LIMIT + 5 {
            let price = 100.0 + round as f64;
            lm.act_on_signal(&signal("AAPL", Direction::Buy, price), price, Utc::now());
            lm.act_on_signal(&signal("AAPL", Direction::Sell, price), price + 1.0, Utc::now());
        }
        let closed = lm.closed_positions();
        assert_eq!(closed.len(), CLOSED_HISTORY_LIMIT);
        // The five oldest closes were dropped.
        assert_eq!(closed[0].entry_price, 105.0);
        assert_eq!(closed.last().unwrap().entry_price, 100.0 + (CLOSED_HISTORY_LIMIT + 4) as f64);
    }

    #[test]
    fn test_transitions_use_caller_clock() {
        use chrono::TimeZone;
        let lm = TradeLifecycleManager::new(1000.0, 50.0);
        let opened = Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap();
        let stopped = Utc.with_ymd_and_hms(2024, 1, 8, 16, 0, 0).unwrap();
        lm.act_on_signal(&signal("AAPL", Direction::Buy, 100.0), 100.0, opened);
        let closed = lm.scan_stop_loss(&prices(&[("AAPL", 90.0)]), stopped);
        assert_eq!(closed[0].opened_at, opened);
        assert_eq!(closed[0].closed_at, Some(stopped));
    }
}

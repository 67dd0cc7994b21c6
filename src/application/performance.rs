//! Signal outcome tracking.
//!
//! Each emitted signal starts ACTIVE. When a position opened from it closes,
//! the signal settles as SUCCESS (positive realized PnL) or FAILURE. Signals
//! that never produced a position expire at the end of the day. Settled and
//! expired results are pruned once they are older than the retention, so
//! metrics cover a rolling window.

use crate::domain::entities::position::Position;
use crate::domain::entities::signal::Signal;
use crate::domain::values::direction::Direction;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Active,
    Success,
    Failure,
    Expired,
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStatus::Active => write!(f, "ACTIVE"),
            SignalStatus::Success => write!(f, "SUCCESS"),
            SignalStatus::Failure => write!(f, "FAILURE"),
            SignalStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalResult {
    pub signal_id: String,
    pub instrument: String,
    pub direction: Direction,
    pub expected_return_pct: f64,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub status: SignalStatus,
    pub position_id: Option<String>,
    pub actual_return_pct: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Counts and returns for one slice of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub pending: usize,
    pub expired: usize,
    /// Percent of settled signals that succeeded.
    pub success_rate: f64,
    pub average_return_pct: f64,
    pub total_realized_pnl: f64,
}

impl Tally {
    fn from_results<'a>(results: impl Iterator<Item = &'a SignalResult>) -> Self {
        let mut tally = Tally::default();
        let mut return_sum = 0.0;
        let mut returns = 0usize;
        for r in results {
            tally.total += 1;
            match r.status {
                SignalStatus::Active => tally.pending += 1,
                SignalStatus::Success => tally.successes += 1,
                SignalStatus::Failure => tally.failures += 1,
                SignalStatus::Expired => tally.expired += 1,
            }
            if let Some(ret) = r.actual_return_pct {
                return_sum += ret;
                returns += 1;
            }
            tally.total_realized_pnl += r.realized_pnl.unwrap_or_default();
        }
        let settled = tally.successes + tally.failures;
        if settled > 0 {
            tally.success_rate = tally.successes as f64 / settled as f64 * 100.0;
        }
        if returns > 0 {
            tally.average_return_pct = return_sum / returns as f64;
        }
        tally
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceMetrics {
    pub overall: Tally,
    pub by_instrument: BTreeMap<String, Tally>,
    /// Keyed by the signal's UTC date, `YYYY-MM-DD`.
    pub by_day: BTreeMap<String, Tally>,
}

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

pub struct PerformanceTracker {
    retention: Duration,
    results: Mutex<HashMap<String, SignalResult>>,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::with_retention(Duration::days(i64::from(DEFAULT_RETENTION_DAYS)))
    }
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention,
            results: Mutex::new(HashMap::new()),
        }
    }

    fn results(&self) -> MutexGuard<'_, HashMap<String, SignalResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_signal(&self, signal: &Signal) {
        let result = SignalResult {
            signal_id: signal.id().to_string(),
            instrument: signal.instrument().to_string(),
            direction: signal.direction(),
            expected_return_pct: signal.expected_return_pct(),
            confidence: signal.confidence().value(),
            created_at: signal.created_at(),
            status: SignalStatus::Active,
            position_id: None,
            actual_return_pct: None,
            realized_pnl: None,
            settled_at: None,
        };
        self.results().insert(result.signal_id.clone(), result);
    }

    /// Links an opened position to the signal it came from.
    pub fn position_opened(&self, position: &Position) {
        let Some(signal_id) = position.signal_id.as_deref() else {
            return;
        };
        if let Some(r) = self.results().get_mut(signal_id) {
            r.position_id = Some(position.id.clone());
        }
    }

    /// Settles the originating signal of a closed position. Returns the new
    /// status, or `None` if the signal is unknown or already settled.
    pub fn position_closed(&self, position: &Position) -> Option<SignalStatus> {
        let signal_id = position.signal_id.as_deref()?;
        let pnl = position.realized_pnl?;
        let mut results = self.results();
        let r = results.get_mut(signal_id)?;
        if r.status != SignalStatus::Active {
            return None;
        }
        r.status = if pnl > 0.0 { SignalStatus::Success } else { SignalStatus::Failure };
        r.position_id = Some(position.id.clone());
        r.realized_pnl = Some(pnl);
        r.actual_return_pct = position.return_pct();
        r.settled_at = Some(position.closed_at.unwrap_or_else(Utc::now));
        Some(r.status)
    }

    /// Expires active signals that never opened a position.
    pub fn expire_unfilled(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for r in self.results().values_mut() {
            if r.status == SignalStatus::Active && r.position_id.is_none() {
                r.status = SignalStatus::Expired;
                r.settled_at = Some(now);
                expired += 1;
            }
        }
        expired
    }

    /// Drops settled and expired results settled before `now - retention`.
    /// Active results are always kept. Returns how many were dropped.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut results = self.results();
        let before = results.len();
        results.retain(|_, r| {
            r.status == SignalStatus::Active || r.settled_at.map_or(true, |at| at >= cutoff)
        });
        before - results.len()
    }

    pub fn len(&self) -> usize {
        self.results().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results().is_empty()
    }

    pub fn get(&self, signal_id: &str) -> Option<SignalResult> {
        self.results().get(signal_id).cloned()
    }

    /// All results, newest first.
    pub fn results_snapshot(&self) -> Vec<SignalResult> {
        let mut all: Vec<SignalResult> = self.results().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.signal_id.cmp(&b.signal_id)));
        all
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        let results = self.results_snapshot();
        let mut by_instrument: BTreeMap<String, Vec<&SignalResult>> = BTreeMap::new();
        let mut by_day: BTreeMap<String, Vec<&SignalResult>> = BTreeMap::new();
        for r in &results {
            by_instrument.entry(r.instrument.clone()).or_default().push(r);
            by_day
                .entry(r.created_at.format("%Y-%m-%d").to_string())
                .or_default()
                .push(r);
        }
        PerformanceMetrics {
            overall: Tally::from_results(results.iter()),
            by_instrument: by_instrument
                .into_iter()
                .map(|(k, v)| (k, Tally::from_results(v.into_iter())))
                .collect(),
            by_day: by_day
                .into_iter()
                .map(|(k, v)| (k, Tally::from_results(v.into_iter())))
                .collect(),
        }
    }
}

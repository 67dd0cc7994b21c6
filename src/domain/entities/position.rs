use crate::domain::values::direction::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "OPEN"),
            PositionStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

impl FromStr for PositionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(PositionStatus::Open),
            "CLOSED" => Ok(PositionStatus::Closed),
            _ => Err(format!("Unknown position status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseReason {
    OpposingSignal,
    StopLoss,
    EodFlatten,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::OpposingSignal => "opposing-signal",
            CloseReason::StopLoss => "stop-loss",
            CloseReason::EodFlatten => "eod-flatten",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloseReason {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opposing-signal" => Ok(CloseReason::OpposingSignal),
            "stop-loss" => Ok(CloseReason::StopLoss),
            "eod-flatten" => Ok(CloseReason::EodFlatten),
            _ => Err(format!("Unknown close reason: {s}")),
        }
    }
}

/// Capital committed to one instrument.
///
/// Closed positions are kept for audit; closing only fills in the exit
/// fields and flips `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub instrument: String,
    pub direction: Direction,
    pub quantity: u64,
    pub entry_price: f64,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<CloseReason>,
    /// Free-form detail, e.g. the loss amount for a stop-loss close.
    pub close_detail: Option<String>,
    pub exit_price: Option<f64>,
    pub realized_pnl: Option<f64>,
    /// Signal the position was opened from, if any.
    pub signal_id: Option<String>,
}

impl Position {
    pub fn open(
        instrument: String,
        direction: Direction,
        quantity: u64,
        entry_price: f64,
        signal_id: Option<String>,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            instrument,
            direction,
            quantity,
            entry_price,
            status: PositionStatus::Open,
            opened_at,
            closed_at: None,
            close_reason: None,
            close_detail: None,
            exit_price: None,
            realized_pnl: None,
            signal_id,
        }
    }

    /// `(price - entry) * qty` for longs, `(entry - price) * qty` for shorts.
    pub fn pnl_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity as f64 * self.direction.sign()
    }

    pub fn cost_basis(&self) -> f64 {
        self.entry_price * self.quantity as f64
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Realized return on the cost basis, in percent.
    pub fn return_pct(&self) -> Option<f64> {
        let basis = self.cost_basis();
        match self.realized_pnl {
            Some(pnl) if basis > 0.0 => Some(pnl / basis * 100.0),
            _ => None,
        }
    }

    pub(crate) fn close(
        &mut self,
        exit_price: f64,
        reason: CloseReason,
        detail: Option<String>,
        closed_at: DateTime<Utc>,
    ) -> f64 {
        let pnl = self.pnl_at(exit_price);
        self.status = PositionStatus::Closed;
        self.exit_price = Some(exit_price);
        self.realized_pnl = Some(pnl);
        self.close_reason = Some(reason);
        self.close_detail = detail;
        self.closed_at = Some(closed_at);
        pnl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_pnl() {
        let mut p = Position::open("AAPL".into(), Direction::Buy, 10, 100.0, None, Utc::now());
        assert_eq!(p.pnl_at(94.0), -60.0);
        let at = Utc::now();
        let pnl = p.close(104.0, CloseReason::OpposingSignal, None, at);
        assert_eq!(pnl, 40.0);
        assert_eq!(p.status, PositionStatus::Closed);
        assert_eq!(p.realized_pnl, Some(40.0));
        assert!((p.return_pct().unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(p.closed_at, Some(at));
    }

    #[test]
    fn test_short_pnl() {
        let mut p = Position::open("TSLA".into(), Direction::Sell, 5, 200.0, None, Utc::now());
        assert_eq!(p.pnl_at(190.0), 50.0);
        assert_eq!(p.close(210.0, CloseReason::StopLoss, None, Utc::now()), -50.0);
    }

    #[test]
    fn test_close_reason_strings() {
        assert_eq!(CloseReason::StopLoss.to_string(), "stop-loss");
        assert_eq!(CloseReason::EodFlatten.to_string(), "eod-flatten");
        assert_eq!("opposing-signal".parse::<CloseReason>().unwrap(), CloseReason::OpposingSignal);
        assert_eq!(
            serde_json::to_string(&CloseReason::EodFlatten).unwrap(),
            "\"eod-flatten\""
        );
    }
}

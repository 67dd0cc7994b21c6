use chrono::NaiveDate;
use serde::Serialize;

/// Realized PnL and breaker flag for one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyRiskState {
    pub trading_day: NaiveDate,
    pub realized_pnl: f64,
    pub halted: bool,
}

impl DailyRiskState {
    pub fn new(trading_day: NaiveDate) -> Self {
        Self {
            trading_day,
            realized_pnl: 0.0,
            halted: false,
        }
    }

    /// Resets the day when `today` is past `trading_day`. Returns whether a
    /// reset happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if today > self.trading_day {
            *self = Self::new(today);
            true
        } else {
            false
        }
    }
}

/// Outcome of one risk scan.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub state: DailyRiskState,
    pub unrealized_pnl: f64,
    /// Realized plus unrealized PnL for the day.
    pub aggregate_pnl: f64,
    pub max_daily_loss: f64,
    /// True when this scan tripped the breaker.
    pub newly_halted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_over_only_forward() {
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let d2 = d1.succ_opt().unwrap();
        let mut state = DailyRiskState::new(d2);
        state.realized_pnl = -120.0;
        state.halted = true;
        assert!(!state.roll_over(d1));
        assert!(!state.roll_over(d2));
        assert_eq!(state.realized_pnl, -120.0);

        let d3 = d2.succ_opt().unwrap();
        assert!(state.roll_over(d3));
        assert_eq!(state.realized_pnl, 0.0);
        assert!(!state.halted);
        assert_eq!(state.trading_day, d3);
    }
}

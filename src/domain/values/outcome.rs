use crate::domain::entities::position::Position;
use serde::Serialize;

/// Result of acting on one signal.
///
/// Everything except `Opened` and `Closed` is a reported no-op: the batch
/// carries on with the next instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Opened { position: Position },
    Closed { position: Position },
    AlreadyOpen { instrument: String },
    NoPosition { instrument: String },
    InsufficientCapital { instrument: String, price: f64, capital: f64 },
    InvalidPrice { instrument: String, price: f64 },
    Halted { instrument: String },
}

impl ActionOutcome {
    pub fn instrument(&self) -> &str {
        match self {
            ActionOutcome::Opened { position } | ActionOutcome::Closed { position } => {
                &position.instrument
            }
            ActionOutcome::AlreadyOpen { instrument }
            | ActionOutcome::NoPosition { instrument }
            | ActionOutcome::InsufficientCapital { instrument, .. }
            | ActionOutcome::InvalidPrice { instrument, .. }
            | ActionOutcome::Halted { instrument } => instrument,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            ActionOutcome::Opened { position } | ActionOutcome::Closed { position } => Some(position),
            _ => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.position().is_none()
    }

    pub fn reason(&self) -> String {
        match self {
            ActionOutcome::Opened { position } => format!(
                "opened {} {} x{} @ ${:.2}",
                position.direction, position.instrument, position.quantity, position.entry_price
            ),
            ActionOutcome::Closed { position } => format!(
                "closed {} @ ${:.2}, pnl ${:.2}",
                position.instrument,
                position.exit_price.unwrap_or_default(),
                position.realized_pnl.unwrap_or_default()
            ),
            ActionOutcome::AlreadyOpen { instrument } => {
                format!("position already open for {instrument}")
            }
            ActionOutcome::NoPosition { instrument } => {
                format!("no open position for {instrument}")
            }
            ActionOutcome::InsufficientCapital { instrument, price, capital } => format!(
                "insufficient capital to buy {instrument} at ${price:.2} with ${capital:.2}"
            ),
            ActionOutcome::InvalidPrice { instrument, price } => {
                format!("invalid live price {price} for {instrument}")
            }
            ActionOutcome::Halted { instrument } => {
                format!("trading halted for the day, ignoring signal for {instrument}")
            }
        }
    }
}

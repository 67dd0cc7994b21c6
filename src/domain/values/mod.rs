pub mod confidence;
pub mod direction;
pub mod indicator_set;
pub mod outcome;
pub mod price_series;
pub mod risk_state;
pub mod trading_window;

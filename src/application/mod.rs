pub mod analyze;
pub mod classifier;
pub mod indicators;
pub mod lifecycle;
pub mod monitor;
pub mod performance;
pub mod risk;

use crate::domain::entities::position::{Position, PositionStatus};
use crate::domain::entities::signal::Signal;
use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct PositionFilter {
    pub instrument: Option<String>,
    pub status: Option<PositionStatus>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Audit store for signals and positions. Rows are never deleted.
pub trait TradeStore: Send + Sync {
    fn record_signal(&self, signal: &Signal) -> Result<(), DomainError>;
    /// Insert or update by position id.
    fn save_position(&self, position: &Position) -> Result<(), DomainError>;
    fn get_position(&self, id: &str) -> Result<Option<Position>, DomainError>;
    fn list_positions(&self, filter: &PositionFilter) -> Result<Vec<Position>, DomainError>;
    fn list_signals(&self, instrument: Option<&str>, limit: Option<usize>) -> Result<Vec<Signal>, DomainError>;
}

use crate::domain::entities::position::Position;
use crate::domain::entities::signal::Signal;
use crate::domain::error::DomainError;
use async_trait::async_trait;

/// Downstream delivery of signals and closed positions (chat, email, logs).
#[async_trait]
pub trait SignalNotifier: Send + Sync {
    async fn notify_signal(&self, signal: &Signal) -> Result<(), DomainError>;

    async fn notify_closed(&self, position: &Position) -> Result<(), DomainError>;
}

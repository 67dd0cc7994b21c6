use crate::domain::entities::position::Position;
use crate::domain::entities::signal::Signal;
use crate::domain::error::DomainError;
use crate::domain::ports::notifier::SignalNotifier;
use async_trait::async_trait;
use tracing::info;

/// Writes alerts to the `hustler::alerts` tracing target.
pub struct LogNotifier;

#[async_trait]
impl SignalNotifier for LogNotifier {
    async fn notify_signal(&self, signal: &Signal) -> Result<(), DomainError> {
        info!(
            target: "hustler::alerts",
            id = signal.id(),
            instrument = signal.instrument(),
            "\n{}",
            signal.summary()
        );
        Ok(())
    }

    async fn notify_closed(&self, position: &Position) -> Result<(), DomainError> {
        info!(
            target: "hustler::alerts",
            id = %position.id,
            instrument = %position.instrument,
            reason = position.close_reason.map(|r| r.as_str()).unwrap_or("unknown"),
            exit_price = position.exit_price.unwrap_or_default(),
            pnl = position.realized_pnl.unwrap_or_default(),
            "position closed"
        );
        Ok(())
    }
}

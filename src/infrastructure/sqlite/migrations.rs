use crate::domain::error::DomainError;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS signals (
            id TEXT PRIMARY KEY,
            instrument TEXT NOT NULL,
            direction TEXT NOT NULL,
            entry_price REAL NOT NULL,
            target_price REAL NOT NULL,
            stop_loss REAL NOT NULL,
            expected_return_pct REAL NOT NULL,
            confidence REAL NOT NULL,
            indicators TEXT NOT NULL,
            timeframe_hint TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS positions (
            id TEXT PRIMARY KEY,
            instrument TEXT NOT NULL,
            direction TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            entry_price REAL NOT NULL,
            status TEXT NOT NULL,
            opened_at TEXT NOT NULL,
            closed_at TEXT,
            close_reason TEXT,
            close_detail TEXT,
            exit_price REAL,
            realized_pnl REAL,
            signal_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_signals_instrument ON signals(instrument);
        CREATE INDEX IF NOT EXISTS idx_signals_created ON signals(created_at);
        CREATE INDEX IF NOT EXISTS idx_positions_instrument ON positions(instrument);
        CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status);
        CREATE INDEX IF NOT EXISTS idx_positions_opened ON positions(opened_at);
        "
    ).map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}

use crate::domain::entities::position::Position;
use crate::domain::entities::signal::Signal;
use crate::domain::error::DomainError;
use crate::domain::ports::trade_store::{PositionFilter, TradeStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

const SIGNAL_COLUMNS: &str = "id, instrument, direction, entry_price, target_price, stop_loss, expected_return_pct, confidence, indicators, timeframe_hint, created_at";
const POSITION_COLUMNS: &str = "id, instrument, direction, quantity, entry_price, status, opened_at, closed_at, close_reason, close_detail, exit_price, realized_pnl, signal_id";

pub struct SqliteTradeStore {
    conn: Mutex<Connection>,
}

/// Raw `signals` row, validated when turned into a [`Signal`].
struct SignalRow {
    id: String,
    instrument: String,
    direction: String,
    entry_price: f64,
    target_price: f64,
    stop_loss: f64,
    expected_return_pct: f64,
    confidence: f64,
    indicators: String,
    timeframe_hint: String,
    created_at: String,
}

/// Raw `positions` row.
struct PositionRow {
    id: String,
    instrument: String,
    direction: String,
    quantity: i64,
    entry_price: f64,
    status: String,
    opened_at: String,
    closed_at: Option<String>,
    close_reason: Option<String>,
    close_detail: Option<String>,
    exit_price: Option<f64>,
    realized_pnl: Option<f64>,
    signal_id: Option<String>,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::Parse(format!("bad timestamp '{value}': {e}")))
}

impl TryFrom<SignalRow> for Signal {
    type Error = DomainError;
    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        let indicators: serde_json::Value = serde_json::from_str(&row.indicators)?;
        let record = serde_json::json!({
            "id": row.id,
            "instrument": row.instrument,
            "direction": row.direction,
            "entry_price": row.entry_price,
            "target_price": row.target_price,
            "stop_loss": row.stop_loss,
            "expected_return_pct": row.expected_return_pct,
            "confidence": row.confidence,
            "indicators": indicators,
            "created_at": row.created_at,
            "timeframe_hint": row.timeframe_hint,
        });
        Ok(serde_json::from_value(record)?)
    }
}

impl TryFrom<PositionRow> for Position {
    type Error = DomainError;
    fn try_from(row: PositionRow) -> Result<Self, Self::Error> {
        Ok(Position {
            direction: row.direction.parse().map_err(DomainError::Parse)?,
            quantity: u64::try_from(row.quantity)
                .map_err(|_| DomainError::Parse(format!("negative quantity {} for {}", row.quantity, row.id)))?,
            status: row.status.parse().map_err(DomainError::Parse)?,
            opened_at: parse_time(&row.opened_at)?,
            closed_at: row.closed_at.as_deref().map(parse_time).transpose()?,
            close_reason: row
                .close_reason
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(DomainError::Parse)?,
            id: row.id,
            instrument: row.instrument,
            entry_price: row.entry_price,
            close_detail: row.close_detail,
            exit_price: row.exit_price,
            realized_pnl: row.realized_pnl,
            signal_id: row.signal_id,
        })
    }
}

impl SqliteTradeStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn row_to_signal(row: &rusqlite::Row) -> Result<SignalRow, rusqlite::Error> {
        Ok(SignalRow {
            id: row.get(0)?,
            instrument: row.get(1)?,
            direction: row.get(2)?,
            entry_price: row.get(3)?,
            target_price: row.get(4)?,
            stop_loss: row.get(5)?,
            expected_return_pct: row.get(6)?,
            confidence: row.get(7)?,
            indicators: row.get(8)?,
            timeframe_hint: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn row_to_position(row: &rusqlite::Row) -> Result<PositionRow, rusqlite::Error> {
        Ok(PositionRow {
            id: row.get(0)?,
            instrument: row.get(1)?,
            direction: row.get(2)?,
            quantity: row.get(3)?,
            entry_price: row.get(4)?,
            status: row.get(5)?,
            opened_at: row.get(6)?,
            closed_at: row.get(7)?,
            close_reason: row.get(8)?,
            close_detail: row.get(9)?,
            exit_price: row.get(10)?,
            realized_pnl: row.get(11)?,
            signal_id: row.get(12)?,
        })
    }

    /// Skips rows that fail validation, logging each one.
    fn convert<R, T>(rows: Vec<R>, table: &str) -> Vec<T>
    where
        T: TryFrom<R, Error = DomainError>,
    {
        rows.into_iter()
            .filter_map(|r| match T::try_from(r) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(table, error = %e, "skipping unreadable row");
                    None
                }
            })
            .collect()
    }
}

impl TradeStore for SqliteTradeStore {
    fn record_signal(&self, signal: &Signal) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let indicators = serde_json::to_string(signal.indicators())?;
        conn.execute(
            &format!("INSERT OR IGNORE INTO signals ({SIGNAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            params![
                signal.id(),
                signal.instrument(),
                signal.direction().to_string(),
                signal.entry_price(),
                signal.target_price(),
                signal.stop_loss(),
                signal.expected_return_pct(),
                signal.confidence().value(),
                indicators,
                signal.timeframe_hint(),
                signal.created_at().to_rfc3339(),
            ],
        ).map_err(|e| DomainError::Database(format!("Failed to record signal: {e}")))?;
        Ok(())
    }

    fn save_position(&self, position: &Position) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let quantity = i64::try_from(position.quantity)
            .map_err(|_| DomainError::InvalidInput(format!("quantity too large: {}", position.quantity)))?;
        conn.execute(
            &format!(
                "INSERT INTO positions ({POSITION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    closed_at = excluded.closed_at,
                    close_reason = excluded.close_reason,
                    close_detail = excluded.close_detail,
                    exit_price = excluded.exit_price,
                    realized_pnl = excluded.realized_pnl"
            ),
            params![
                position.id,
                position.instrument,
                position.direction.to_string(),
                quantity,
                position.entry_price,
                position.status.to_string(),
                position.opened_at.to_rfc3339(),
                position.closed_at.map(|dt| dt.to_rfc3339()),
                position.close_reason.map(|r| r.to_string()),
                position.close_detail,
                position.exit_price,
                position.realized_pnl,
                position.signal_id,
            ],
        ).map_err(|e| DomainError::Database(format!("Failed to save position: {e}")))?;
        Ok(())
    }

    fn get_position(&self, id: &str) -> Result<Option<Position>, DomainError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {POSITION_COLUMNS} FROM positions WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], Self::row_to_position)?;
        let row = rows.next().transpose()?;
        row.map(Position::try_from).transpose()
    }

    fn list_positions(&self, filter: &PositionFilter) -> Result<Vec<Position>, DomainError> {
        let conn = self.conn()?;
        let mut sql = format!("SELECT {POSITION_COLUMNS} FROM positions WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(instrument) = &filter.instrument {
            sql.push_str(&format!(" AND instrument = ?{}", param_values.len() + 1));
            param_values.push(Box::new(instrument.clone()));
        }
        if let Some(status) = filter.status {
            sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.to_string()));
        }
        if let Some(since) = &filter.since {
            sql.push_str(&format!(" AND opened_at >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(since.to_rfc3339()));
        }
        sql.push_str(" ORDER BY opened_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::row_to_position)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::convert(rows, "positions"))
    }

    fn list_signals(&self, instrument: Option<&str>, limit: Option<usize>) -> Result<Vec<Signal>, DomainError> {
        let conn = self.conn()?;
        let mut sql = format!("SELECT {SIGNAL_COLUMNS} FROM signals WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(instrument) = instrument {
            sql.push_str(&format!(" AND instrument = ?{}", param_values.len() + 1));
            param_values.push(Box::new(instrument.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::row_to_signal)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::convert(rows, "signals"))
    }
}

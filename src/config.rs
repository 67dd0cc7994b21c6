//! TOML configuration.
//!
//! Every key has a default, so an empty file (or no file) is a valid
//! configuration. `validate` runs on every load and rejects anything the
//! core would otherwise have to second-guess at runtime.

use crate::application::classifier::ClassifierThresholds;
use crate::application::indicators::IndicatorParams;
use crate::application::performance::DEFAULT_RETENTION_DAYS;
use crate::application::risk::RiskLimits;
use crate::domain::error::DomainError;
use crate::domain::values::trading_window::TradingWindow;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_ENV: &str = "HUSTLER_CONFIG";
pub const DB_ENV: &str = "HUSTLER_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingWindowConfig {
    /// `HH:MM` local time.
    pub start: String,
    pub end: String,
    /// IANA zone name.
    pub time_zone: String,
    pub weekend: bool,
    pub flatten_margin_minutes: u32,
}

impl Default for TradingWindowConfig {
    fn default() -> Self {
        Self {
            start: "09:30".into(),
            end: "15:30".into(),
            time_zone: "America/New_York".into(),
            weekend: false,
            flatten_margin_minutes: 5,
        }
    }
}

impl TradingWindowConfig {
    pub fn to_window(&self) -> Result<TradingWindow, DomainError> {
        TradingWindow::parse(
            &self.start,
            &self.end,
            &self.time_zone,
            self.weekend,
            self.flatten_margin_minutes,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub range: String,
    pub interval: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            range: "1d".into(),
            interval: "5m".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub instruments: Vec<String>,
    pub poll_interval_secs: u64,
    pub log_level: String,
    pub db_path: String,
    /// Days settled signal results stay in the in-memory metrics.
    pub performance_retention_days: u32,
    pub indicators: IndicatorParams,
    pub thresholds: ClassifierThresholds,
    pub risk: RiskLimits,
    pub trading_window: TradingWindowConfig,
    pub market_data: MarketDataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instruments: ["AAPL", "MSFT", "GOOGL", "AMZN", "META"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            poll_interval_secs: 300,
            log_level: "info".into(),
            db_path: "./hustler.db".into(),
            performance_retention_days: DEFAULT_RETENTION_DAYS,
            indicators: IndicatorParams::default(),
            thresholds: ClassifierThresholds::default(),
            risk: RiskLimits::default(),
            trading_window: TradingWindowConfig::default(),
            market_data: MarketDataConfig::default(),
        }
    }
}

fn positive(name: &str, value: f64) -> Result<(), DomainError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DomainError::Config(format!("{name} must be positive, got {value}")))
    }
}

fn nonzero(name: &str, value: usize) -> Result<(), DomainError> {
    if value == 0 {
        Err(DomainError::Config(format!("{name} must be at least 1")))
    } else {
        Ok(())
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, DomainError> {
        let config: Config =
            toml::from_str(text).map_err(|e| DomainError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DomainError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Loads from `path`, else `$HUSTLER_CONFIG`, else defaults. `$HUSTLER_DB`
    /// overrides `db_path` in every case.
    pub fn resolve(path: Option<&Path>) -> Result<Self, DomainError> {
        let env_path = std::env::var(CONFIG_ENV).ok();
        let mut config = match path.or(env_path.as_deref().map(Path::new)) {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        if let Ok(db) = std::env::var(DB_ENV) {
            config.db_path = db;
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, DomainError> {
        toml::to_string_pretty(self).map_err(|e| DomainError::Config(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn performance_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.performance_retention_days))
    }

    pub fn trading_window(&self) -> Result<TradingWindow, DomainError> {
        self.trading_window.to_window()
    }

    pub fn tracing_level(&self) -> Result<tracing::Level, DomainError> {
        tracing::Level::from_str(self.log_level.trim())
            .map_err(|_| DomainError::Config(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.instruments.is_empty() {
            return Err(DomainError::Config("instruments must not be empty".into()));
        }
        if let Some(bad) = self.instruments.iter().find(|i| i.trim().is_empty()) {
            return Err(DomainError::Config(format!("blank instrument name {bad:?}")));
        }
        if self.poll_interval_secs == 0 {
            return Err(DomainError::Config("poll_interval_secs must be at least 1".into()));
        }
        if self.performance_retention_days == 0 {
            return Err(DomainError::Config("performance_retention_days must be at least 1".into()));
        }
        self.tracing_level()?;

        let ind = &self.indicators;
        nonzero("indicators.bollinger_period", ind.bollinger_period)?;
        nonzero("indicators.rsi_period", ind.rsi_period)?;
        nonzero("indicators.volume_period", ind.volume_period)?;
        positive("indicators.bollinger_deviation", ind.bollinger_deviation)?;

        let t = &self.thresholds;
        positive("thresholds.min_volatility_percent", t.min_volatility_percent)?;
        positive("thresholds.min_expected_roi", t.min_expected_roi)?;
        positive("thresholds.stop_loss_percent", t.stop_loss_percent)?;
        positive("thresholds.volume_threshold", t.volume_threshold)?;
        positive("thresholds.rsi_oversold", t.rsi_oversold)?;
        positive("thresholds.rsi_overbought", t.rsi_overbought)?;
        if t.rsi_oversold >= t.rsi_overbought || t.rsi_overbought > 100.0 {
            return Err(DomainError::Config(format!(
                "rsi thresholds must satisfy 0 < oversold < overbought <= 100, got {} / {}",
                t.rsi_oversold, t.rsi_overbought
            )));
        }
        if !(t.confidence_threshold > 0.0 && t.confidence_threshold <= 1.0) {
            return Err(DomainError::Config(format!(
                "thresholds.confidence_threshold must be in (0, 1], got {}",
                t.confidence_threshold
            )));
        }

        positive("risk.capital_per_instrument", self.risk.capital_per_instrument)?;
        positive("risk.max_loss_per_trade", self.risk.max_loss_per_trade)?;
        positive("risk.max_daily_loss", self.risk.max_daily_loss)?;

        self.trading_window()?;
        // At least one tick must land inside the flatten margin.
        let margin_secs = u64::from(self.trading_window.flatten_margin_minutes) * 60;
        if self.poll_interval_secs > margin_secs {
            return Err(DomainError::Config(format!(
                "poll_interval_secs ({}) must not exceed trading_window.flatten_margin_minutes ({} min), \
                 or no tick would fall inside the end-of-day flatten margin",
                self.poll_interval_secs, self.trading_window.flatten_margin_minutes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.instruments.len(), 5);
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.tracing_level().unwrap(), tracing::Level::INFO);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            instruments = ["TSLA"]

            [thresholds]
            min_expected_roi = 2.0

            [risk]
            max_daily_loss = 500.0
            "#,
        )
        .unwrap();
        assert_eq!(config.instruments, vec!["TSLA"]);
        assert_eq!(config.thresholds.min_expected_roi, 2.0);
        assert_eq!(config.thresholds.rsi_overbought, 70.0);
        assert_eq!(config.risk.max_daily_loss, 500.0);
        assert_eq!(config.risk.capital_per_instrument, 1000.0);
        assert_eq!(config.trading_window.time_zone, "America/New_York");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_toml("instruments = []").is_err());
        assert!(Config::from_toml("[indicators]\nrsi_period = 0").is_err());
        assert!(Config::from_toml("[thresholds]\nconfidence_threshold = 1.5").is_err());
        assert!(Config::from_toml("[thresholds]\nrsi_oversold = 80.0").is_err());
        assert!(Config::from_toml("[risk]\nmax_loss_per_trade = -1.0").is_err());
        assert!(Config::from_toml("[trading_window]\nstart = \"16:00\"").is_err());
        assert!(Config::from_toml("[trading_window]\ntime_zone = \"Nowhere/Land\"").is_err());
        assert!(Config::from_toml("log_level = \"loud\"").is_err());
        assert!(Config::from_toml("performance_retention_days = 0").is_err());
    }

    #[test]
    fn test_poll_interval_must_fit_flatten_margin() {
        let slow = Config::from_toml("poll_interval_secs = 600");
        assert!(matches!(slow, Err(DomainError::Config(msg)) if msg.contains("flatten_margin")));
        assert!(Config::from_toml("poll_interval_secs = 301").is_err());
        Config::from_toml("poll_interval_secs = 300").unwrap();
        Config::from_toml("poll_interval_secs = 600\n[trading_window]\nflatten_margin_minutes = 10").unwrap();
        assert!(Config::from_toml("[trading_window]\nflatten_margin_minutes = 0").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let text = Config::default().to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), Config::default());
    }
}

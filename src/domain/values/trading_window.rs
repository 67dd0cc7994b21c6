//! Daily trading session in a configured time zone.

use crate::domain::error::DomainError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradingWindow {
    start: NaiveTime,
    end: NaiveTime,
    #[serde(serialize_with = "serialize_tz")]
    time_zone: Tz,
    weekend: bool,
    flatten_margin_minutes: i64,
}

fn serialize_tz<S: serde::Serializer>(tz: &Tz, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(tz.name())
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime, DomainError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| DomainError::Config(format!("invalid time '{value}' (expected HH:MM): {e}")))
}

pub fn parse_time_zone(value: &str) -> Result<Tz, DomainError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|e| DomainError::Config(format!("unknown time zone '{value}': {e}")))
}

impl TradingWindow {
    pub fn new(
        start: NaiveTime,
        end: NaiveTime,
        time_zone: Tz,
        weekend: bool,
        flatten_margin_minutes: u32,
    ) -> Result<Self, DomainError> {
        if start >= end {
            return Err(DomainError::Config(format!(
                "trading window start {start} must be before end {end}"
            )));
        }
        let margin = i64::from(flatten_margin_minutes);
        if Duration::minutes(margin) > end - start {
            return Err(DomainError::Config(format!(
                "flatten margin of {margin} minutes is longer than the trading window"
            )));
        }
        Ok(Self {
            start,
            end,
            time_zone,
            weekend,
            flatten_margin_minutes: margin,
        })
    }

    pub fn parse(
        start: &str,
        end: &str,
        time_zone: &str,
        weekend: bool,
        flatten_margin_minutes: u32,
    ) -> Result<Self, DomainError> {
        Self::new(
            parse_hhmm(start)?,
            parse_hhmm(end)?,
            parse_time_zone(time_zone)?,
            weekend,
            flatten_margin_minutes,
        )
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// Calendar date of `now` in the window's zone.
    pub fn trading_day(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.time_zone).date_naive()
    }

    fn is_trading_day(&self, local: &DateTime<Tz>) -> bool {
        self.weekend || !matches!(local.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// `start <= local time < end` on a trading day.
    pub fn is_within(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.time_zone);
        let t = local.time();
        self.is_trading_day(&local) && t >= self.start && t < self.end
    }

    /// True during the last `flatten_margin_minutes` of the window.
    pub fn should_flatten(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.time_zone);
        let t = local.time();
        let flatten_from = self.end - Duration::minutes(self.flatten_margin_minutes);
        self.is_trading_day(&local) && t >= flatten_from && t < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ny_window() -> TradingWindow {
        TradingWindow::parse("09:30", "15:30", "America/New_York", false, 5).unwrap()
    }

    // 2024-01-08 is a Monday; New York is UTC-5 in January.
    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_within_window_on_weekday() {
        let w = ny_window();
        assert!(!w.is_within(utc(8, 14, 29)));
        assert!(w.is_within(utc(8, 14, 30)));
        assert!(w.is_within(utc(8, 20, 29)));
        assert!(!w.is_within(utc(8, 20, 30)));
    }

    #[test]
    fn test_weekend_excluded_unless_enabled() {
        let saturday_noon = utc(13, 17, 0);
        assert!(!ny_window().is_within(saturday_noon));
        let w = TradingWindow::parse("09:30", "15:30", "America/New_York", true, 5).unwrap();
        assert!(w.is_within(saturday_noon));
    }

    #[test]
    fn test_should_flatten_margin() {
        let w = ny_window();
        assert!(!w.should_flatten(utc(8, 20, 24)));
        assert!(w.should_flatten(utc(8, 20, 25)));
        assert!(w.should_flatten(utc(8, 20, 29)));
        assert!(!w.should_flatten(utc(8, 20, 30)));
        assert!(!w.should_flatten(utc(13, 20, 27)));
    }

    #[test]
    fn test_trading_day_uses_zone() {
        let w = ny_window();
        // 02:00 UTC on the 9th is still the 8th in New York.
        assert_eq!(
            w.trading_day(utc(9, 2, 0)),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_invalid_windows() {
        assert!(TradingWindow::parse("15:30", "09:30", "America/New_York", false, 5).is_err());
        assert!(TradingWindow::parse("9h30", "15:30", "America/New_York", false, 5).is_err());
        assert!(TradingWindow::parse("09:30", "15:30", "Mars/Olympus", false, 5).is_err());
        assert!(TradingWindow::parse("09:30", "09:40", "UTC", false, 15).is_err());
    }
}

//! Trading window gating.
//!
//! Decides whether a probe may run at a given instant, based on the
//! venue-local time of day and weekday. Venue-local time is a fixed UTC
//! offset (e.g. +08:00 for TWSE); the check is made at minute granularity,
//! so an end time of 13:30 admits 13:30:59.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike, Utc, Weekday};

use crate::error::{CoreError, Result};

/// Parse an `HH:MM` time of day.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| CoreError::InvalidTime(format!("{s:?}: {e}")))
}

/// Trading hours in venue-local time plus the weekdays they apply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingWindow {
    start: NaiveTime,
    end: NaiveTime,
    weekdays: Vec<Weekday>,
    offset: FixedOffset,
}

impl TradingWindow {
    /// Create a window. `start` must be strictly before `end`.
    pub fn new(
        start: NaiveTime,
        end: NaiveTime,
        weekdays: Vec<Weekday>,
        utc_offset_hours: i32,
    ) -> Result<Self> {
        if start >= end {
            return Err(CoreError::InvalidConfig(format!(
                "trading window start {start} must be before end {end}"
            )));
        }
        if weekdays.is_empty() {
            return Err(CoreError::InvalidConfig(
                "trading window needs at least one weekday".to_string(),
            ));
        }
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).ok_or_else(|| {
            CoreError::InvalidConfig(format!("UTC offset out of range: {utc_offset_hours}h"))
        })?;
        Ok(Self {
            start,
            end,
            weekdays,
            offset,
        })
    }

    /// Monday through Friday.
    #[must_use]
    pub fn business_days() -> Vec<Weekday> {
        vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]
    }

    /// Check whether the window is open right now.
    #[must_use]
    pub fn is_open_now(&self) -> bool {
        self.is_open_at(Utc::now())
    }

    /// Check whether the window is open at a given UTC instant.
    #[must_use]
    pub fn is_open_at(&self, dt: DateTime<Utc>) -> bool {
        let local = self.local_time(dt);
        if !self.weekdays.contains(&local.weekday()) {
            return false;
        }
        let minute = local
            .time()
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or_else(|| local.time());
        self.start <= minute && minute <= self.end
    }

    /// Convert a UTC instant to venue-local time.
    #[must_use]
    pub fn local_time(&self, dt: DateTime<Utc>) -> DateTime<FixedOffset> {
        dt.with_timezone(&self.offset)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, 0).unwrap()
    }

    /// TWSE regular session 09:00-13:30 at UTC+8, Monday to Friday.
    fn twse() -> TradingWindow {
        TradingWindow::new(
            parse_hhmm("09:00").unwrap(),
            parse_hhmm("13:30").unwrap(),
            TradingWindow::business_days(),
            8,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("09:05").unwrap(), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("0900").is_err());
    }

    #[test]
    fn test_open_during_local_session() {
        // 2026-02-09 is Monday; 02:00 UTC = 10:00 UTC+8
        assert!(twse().is_open_at(utc(2026, 2, 9, 2, 0)));
    }

    #[test]
    fn test_boundaries_are_inclusive_at_minute_granularity() {
        let window = twse();
        // 01:00 UTC = 09:00 local
        assert!(window.is_open_at(utc(2026, 2, 9, 1, 0)));
        // 05:30 UTC = 13:30 local, still open through 13:30:59
        assert!(window.is_open_at(utc(2026, 2, 9, 5, 30)));
        let late = Utc.with_ymd_and_hms(2026, 2, 9, 5, 30, 59).unwrap();
        assert!(window.is_open_at(late));
        // 05:31 UTC = 13:31 local
        assert!(!window.is_open_at(utc(2026, 2, 9, 5, 31)));
        // 00:59 UTC = 08:59 local
        assert!(!window.is_open_at(utc(2026, 2, 9, 0, 59)));
    }

    #[test]
    fn test_weekday_uses_local_date() {
        // Friday 2026-02-06 23:30 UTC is already Saturday 07:30 local
        let window = TradingWindow::new(
            parse_hhmm("07:00").unwrap(),
            parse_hhmm("08:00").unwrap(),
            TradingWindow::business_days(),
            8,
        )
        .unwrap();
        assert!(!window.is_open_at(utc(2026, 2, 6, 23, 30)));
        // Sunday 2026-02-08 23:30 UTC is Monday 07:30 local
        assert!(window.is_open_at(utc(2026, 2, 8, 23, 30)));
    }

    #[test]
    fn test_weekend_closed() {
        // 2026-02-07 is Saturday
        assert!(!twse().is_open_at(utc(2026, 2, 7, 2, 0)));
    }

    #[test]
    fn test_invalid_windows_rejected() {
        let nine = parse_hhmm("09:00").unwrap();
        assert!(TradingWindow::new(nine, nine, TradingWindow::business_days(), 8).is_err());
        assert!(TradingWindow::new(nine, parse_hhmm("10:00").unwrap(), vec![], 8).is_err());
        assert!(
            TradingWindow::new(nine, parse_hhmm("10:00").unwrap(), vec![Weekday::Mon], 30).is_err()
        );
    }
}

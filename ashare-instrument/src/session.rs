use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// A-share continuous trading sessions, in exchange-local (Beijing) time.
///
/// Morning 09:30-11:30, afternoon 13:00-15:00, Monday to Friday. Public holidays are not
/// modelled; callers that need an exact calendar should intersect with an external holiday list.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct TradingSession {
    pub morning_open: NaiveTime,
    pub morning_close: NaiveTime,
    pub afternoon_open: NaiveTime,
    pub afternoon_close: NaiveTime,
}

impl Default for TradingSession {
    fn default() -> Self {
        Self {
            morning_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            morning_close: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            afternoon_open: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            afternoon_close: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        }
    }
}

impl TradingSession {
    /// True if `when` falls inside one of the continuous sessions on a weekday.
    pub fn is_trading_time(&self, when: NaiveDateTime) -> bool {
        if !is_trading_day(when.date()) {
            return false;
        }

        let time = when.time();
        let in_morning = self.morning_open <= time && time <= self.morning_close;
        let in_afternoon = self.afternoon_open <= time && time <= self.afternoon_close;

        in_morning || in_afternoon
    }

    /// Timestamp of the session open on the given date.
    pub fn open(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.morning_open)
    }

    /// Timestamp of the session close on the given date.
    pub fn close(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.afternoon_close)
    }
}

/// True for Monday-Friday.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Weekday trading dates in `[start, end]`, inclusive.
pub fn trading_calendar(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        if is_trading_day(current) {
            days.push(current);
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

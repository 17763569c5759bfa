use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Time source for everything the engine decides by the clock (hold expiry,
/// check-in windows, late fees, payment-id prefixes). Injected so tests can
/// pin it.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// The venue's wall clock, derived from the configured UTC offset.
    fn now_local(&self, tz_offset_minutes: i32) -> NaiveDateTime {
        (self.now_utc() + Duration::minutes(tz_offset_minutes as i64)).naive_utc()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Day-of-week in the venue encoding: Monday = 2 .. Saturday = 7, Sunday = 8.
pub fn venue_weekday(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8 + 1
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .ok()
}

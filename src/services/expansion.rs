use chrono::{Duration, NaiveDate, NaiveTime};

use crate::services::clock::venue_weekday;

#[derive(Debug, PartialEq)]
pub enum ExpansionError {
    InvalidTimeWindow,
    InvalidRange,
    PastDate,
    InvalidDayOfWeek(u8),
    NoOccurrences,
}

impl std::fmt::Display for ExpansionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpansionError::InvalidTimeWindow => {
                write!(f, "start time must be before end time")
            }
            ExpansionError::InvalidRange => {
                write!(f, "invalid date range")
            }
            ExpansionError::PastDate => {
                write!(f, "booking dates must not be in the past")
            }
            ExpansionError::InvalidDayOfWeek(d) => {
                write!(f, "invalid day of week value: {d} (expected 2..=8)")
            }
            ExpansionError::NoOccurrences => {
                write!(f, "the requested schedule produces no sessions")
            }
        }
    }
}

/// Expands a booking request into the concrete dates it occupies.
///
/// An empty day mask is a walk-in: `start_date` must equal `end_date` and
/// exactly one date comes back. A non-empty mask (venue encoding, Monday = 2
/// .. Sunday = 8) selects the matching days of `start_date..=end_date`.
/// `today` is the venue-local date; anything starting before it is rejected.
pub fn expand_dates(
    start_date: NaiveDate,
    end_date: NaiveDate,
    days_of_week: &[u8],
    start_time: NaiveTime,
    end_time: NaiveTime,
    today: NaiveDate,
) -> Result<Vec<NaiveDate>, ExpansionError> {
    if start_time >= end_time {
        return Err(ExpansionError::InvalidTimeWindow);
    }
    if start_date > end_date {
        return Err(ExpansionError::InvalidRange);
    }
    if start_date < today {
        return Err(ExpansionError::PastDate);
    }

    if days_of_week.is_empty() {
        if start_date != end_date {
            return Err(ExpansionError::InvalidRange);
        }
        return Ok(vec![start_date]);
    }

    let mask = normalize_days(days_of_week)?;

    let mut dates = vec![];
    let mut date = start_date;
    while date <= end_date {
        if mask.contains(&venue_weekday(date)) {
            dates.push(date);
        }
        date += Duration::days(1);
    }

    if dates.is_empty() {
        return Err(ExpansionError::NoOccurrences);
    }
    Ok(dates)
}

/// Validates, dedupes and sorts a day mask.
pub fn normalize_days(days: &[u8]) -> Result<Vec<u8>, ExpansionError> {
    let mut mask = vec![];
    for &d in days {
        if !(2..=8).contains(&d) {
            return Err(ExpansionError::InvalidDayOfWeek(d));
        }
        if !mask.contains(&d) {
            mask.push(d);
        }
    }
    mask.sort_unstable();
    Ok(mask)
}

use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;

/// One collision between a proposed session and a live occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotConflict {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub occurrence_id: String,
}

impl std::fmt::Display for SlotConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}-{} is already booked",
            self.date, self.start_time, self.end_time
        )
    }
}

/// Scans every proposed date for occurrences that keep the slot busy
/// (Active or CheckedIn, half-open overlap). Returns all collisions so the
/// caller can reject the whole set at once.
///
/// Must run on the same locked connection that performs the insert, so no
/// concurrent create can slip between check and write.
pub fn find_conflicts(
    conn: &Connection,
    court_id: &str,
    dates: &[NaiveDate],
    start: NaiveTime,
    end: NaiveTime,
) -> anyhow::Result<Vec<SlotConflict>> {
    let mut conflicts = vec![];

    for date in dates {
        let blocking = queries::find_blocking_occurrences(conn, court_id, date, &start, &end)?;
        for occ in blocking {
            conflicts.push(SlotConflict {
                date: *date,
                start_time: occ.start_time,
                end_time: occ.end_time,
                occurrence_id: occ.id,
            });
        }
    }

    Ok(conflicts)
}

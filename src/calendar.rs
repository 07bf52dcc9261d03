// Calendar resolver — maps local civil dates onto the fixed 365-slot cycle.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::SLOT_COUNT;

/// One of the 365 fixed positions in the devotional calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarSlot {
    /// 1-based slot index in `1..=365`.
    pub index: u16,
    /// Whether the resolved date falls in a leap year.
    pub leap_year: bool,
}

/// Proleptic Gregorian leap-year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Map a local civil date onto the 365-slot cycle.
///
/// In a leap year Feb 29 and Mar 1 share a slot and every later date shifts
/// back by one, so Dec 31 always lands on slot 365. Total over all valid
/// dates; the clamp guards against degenerate inputs only.
pub fn resolve(date: NaiveDate) -> CalendarSlot {
    let mut day_of_year = date.ordinal() as i32;
    let leap = is_leap_year(date.year());
    if leap && date.month() >= 3 {
        day_of_year -= 1;
    }
    CalendarSlot {
        index: day_of_year.clamp(1, SLOT_COUNT as i32) as u16,
        leap_year: leap,
    }
}

/// Start of the next local day.
pub fn next_midnight(now: NaiveDateTime) -> NaiveDateTime {
    let tomorrow = now.date().succ_opt().unwrap_or_else(|| now.date());
    tomorrow.and_time(NaiveTime::MIN)
}

/// Whole seconds remaining until the next local midnight.
pub fn seconds_to_midnight(now: NaiveDateTime) -> i64 {
    (next_midnight(now) - now).num_seconds().max(0)
}

/// Format a second count as `HH:MM:SS`.
pub fn format_hms(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Long human-readable date line for the page header.
pub fn date_label(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

use std::fmt;

use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone)]
pub struct CalendarError {
    pub msg: String,
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Calendar Error: {}", self.msg)
    }
}

impl std::error::Error for CalendarError {}

/// Reasons a single VEVENT block does not turn into an [`EventRecord`].
///
/// These never abort a feed, the offending block is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    MalformedDateToken(String),
    MissingStartDate,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordError::MalformedDateToken(token) => {
                write!(f, "malformed date token '{}'", token)
            }
            RecordError::MissingStartDate => write!(f, "event has no DTSTART"),
        }
    }
}

/// A calendar month, identified by year and month number (1-12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        YearMonth { year, month }
    }

    pub fn following(&self) -> Self {
        if self.month == 12 {
            YearMonth::new(self.year + 1, 1)
        } else {
            YearMonth::new(self.year, self.month + 1)
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn number_of_days(&self) -> u32 {
        match (self.first_day(), self.following().first_day()) {
            (Some(first), Some(next)) => (next - first).num_days() as u32,
            _ => 0,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// The two months whose events are kept: the viewer's current month and the one after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub current: YearMonth,
    pub next: YearMonth,
}

impl MonthWindow {
    pub fn new(current: YearMonth) -> Self {
        MonthWindow {
            current,
            next: current.following(),
        }
    }

    pub fn containing(date: NaiveDate) -> Self {
        MonthWindow::new(YearMonth::new(date.year(), date.month()))
    }

    pub fn contains(&self, year: i32, month: u32) -> bool {
        let candidate = YearMonth::new(year, month);
        candidate == self.current || candidate == self.next
    }
}

/// Local start of a calendar entry as produced by the date normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStart {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub has_time: bool,
}

/// One event of the display window.
///
/// The field order defines the display sort order: date first, then all-day events
/// before timed ones, then time of day, and the title as a final tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub has_time: bool,
    pub hour: u32,
    pub minute: u32,
    pub title: String,
}

impl EventRecord {
    pub fn new(start: LocalStart, title: String) -> Self {
        EventRecord {
            year: start.year,
            month: start.month,
            day: start.day,
            has_time: start.has_time,
            hour: start.hour,
            minute: start.minute,
            title,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

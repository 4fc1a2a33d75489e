use chrono::prelude::*;
use chrono::Duration;

use crate::domain::{EventRecord, YearMonth};
use crate::month_events::{CurrentMonthIndex, MonthlyAggregator, NextMonthList};

/// One row of the event list under the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEntry {
    pub event: EventRecord,
    pub is_today: bool,
    pub description: String,
}

/// The events chosen for one render, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayWindow {
    pub entries: Vec<DisplayEntry>,
}

impl DisplayWindow {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Picks the events for the list under the calendar.
///
/// Events of the current month from `current_day` on come first. Only when they do not
/// fill `available_rows` are the next month's events appended. The list is cut to
/// `available_rows` in collection order and sorted afterwards, so a crowded month can
/// drop an earlier event that was collected later.
pub fn select_events(
    current: &CurrentMonthIndex,
    next: &NextMonthList,
    current_day: u32,
    available_rows: usize,
) -> Vec<EventRecord> {
    let mut selected: Vec<EventRecord> = current.events_from(current_day).cloned().collect();
    if selected.len() < available_rows {
        selected.extend(next.events().iter().cloned());
    }
    selected.truncate(available_rows);
    selected.sort();
    selected
}

/// "Today", "Tomorrow" or "In N days", followed by the start time for timed events.
pub fn describe_day(today: NaiveDate, event: &EventRecord) -> String {
    let delta = event
        .date()
        .map(|date| date.signed_duration_since(today).num_days())
        .unwrap_or_default();
    let day = match delta {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        n => format!("In {} days", n),
    };
    if event.has_time {
        format!("{} {:02}:{:02}", day, event.hour, event.minute)
    } else {
        day
    }
}

impl MonthlyAggregator {
    pub fn select_for_display(&self, current_day: u32, available_rows: usize) -> DisplayWindow {
        let current_month = self.window().current;
        let today = current_month
            .first_day()
            .map(|first| first + Duration::days(i64::from(current_day) - 1))
            .unwrap_or_default();
        let entries = select_events(
            self.current_month(),
            self.next_month(),
            current_day,
            available_rows,
        )
        .into_iter()
        .map(|event| DisplayEntry {
            is_today: event.year == current_month.year
                && event.month == current_month.month
                && event.day == current_day,
            description: describe_day(today, &event),
            event,
        })
        .collect();
        DisplayWindow { entries }
    }
}

/// Layout of a month as a week grid starting on Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthGrid {
    pub month: YearMonth,
    /// Weekday of the 1st, Sunday is 0.
    pub first_weekday: u32,
    pub number_of_days: u32,
}

impl MonthGrid {
    pub fn new(month: YearMonth) -> Self {
        MonthGrid {
            month,
            first_weekday: month
                .first_day()
                .map(|first| first.weekday().num_days_from_sunday())
                .unwrap_or_default(),
            number_of_days: month.number_of_days(),
        }
    }

    pub fn rows(&self) -> u32 {
        (self.first_weekday + self.number_of_days).saturating_sub(1) / 7 + 1
    }

    /// Row and column of a day, both zero based.
    pub fn cell(&self, day: u32) -> (u32, u32) {
        let offset = self.first_weekday + day - 1;
        (offset / 7, offset % 7)
    }

    /// Rows left for the event list once the grid is drawn.
    pub fn available_rows(&self, max_rows: u32) -> usize {
        max_rows.saturating_sub(self.rows()) as usize
    }
}

const CELL_WIDTH: usize = 5;
const DESCRIPTION_WIDTH: usize = 18;

/// Plain text rendering of the calendar page: the month grid with today in brackets and
/// a `*` on days that have events, the event list, then the date footer.
pub fn render_text(
    grid: &MonthGrid,
    current: &CurrentMonthIndex,
    current_day: u32,
    window: &DisplayWindow,
) -> String {
    let mut out = String::new();
    for name in ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"] {
        out.push_str(&format!("{:>width$}", name, width = CELL_WIDTH));
    }
    out.push('\n');
    let mut line = String::new();
    for day in 1..=grid.number_of_days {
        let (_, column) = grid.cell(day);
        if day == 1 {
            line.push_str(&" ".repeat(column as usize * CELL_WIDTH));
        }
        let marker = if current.has_events_on(day) { "*" } else { "" };
        let label = if day == current_day {
            format!("[{}]{}", day, marker)
        } else {
            format!("{}{}", day, marker)
        };
        line.push_str(&format!("{:>width$}", label, width = CELL_WIDTH));
        if column == 6 || day == grid.number_of_days {
            out.push_str(line.trim_end());
            out.push('\n');
            line.clear();
        }
    }
    let mut separator_drawn = false;
    for entry in &window.entries {
        out.push_str(&"-".repeat(CELL_WIDTH * 7));
        out.push('\n');
        if !separator_drawn && !entry.is_today {
            out.push_str(&"=".repeat(CELL_WIDTH * 7));
            out.push('\n');
            separator_drawn = true;
        }
        out.push_str(&format!(
            "{:<width$}{}\n",
            entry.description,
            entry.event.title,
            width = DESCRIPTION_WIDTH
        ));
    }
    out.push_str(&format!(
        "{}/{}/{}\n",
        grid.month.year, grid.month.month, current_day
    ));
    out
}

use std::io;

use ical::property::Property;
use log::{debug, warn};

use crate::chrono_ical::normalize_date_token;
use crate::domain::{CalendarError, EventRecord, MonthWindow, RecordError};
use crate::ical_util::{
    find_property_value, is_component_marker, parse_property, property_value, sanitise_string,
};
use crate::month_events::MonthlyAggregator;

const EVENT_COMPONENT: &str = "VEVENT";
const START_PROPERTY: &str = "DTSTART";
const TITLE_PROPERTY: &str = "SUMMARY";

/// Builds an event from the properties of one VEVENT block, BEGIN and END included.
///
/// The first DTSTART gives the start, the first SUMMARY the title. A missing title
/// becomes an empty one, a missing or broken start fails the event.
pub fn build_event(block: &[Property], timezone_hours: f64) -> Result<EventRecord, RecordError> {
    let start_token =
        find_property_value(block, START_PROPERTY).ok_or(RecordError::MissingStartDate)?;
    let start = normalize_date_token(start_token, timezone_hours)?;
    let title = find_property_value(block, TITLE_PROPERTY)
        .map(sanitise_string)
        .unwrap_or_default();
    Ok(EventRecord::new(start, title))
}

enum ParserState {
    Idle,
    InBlock(Vec<Property>),
}

/// Line driven VEVENT parser. Only the block currently being read is buffered, events
/// outside the month window are dropped as soon as their DTSTART line is seen.
pub struct FeedParser {
    window: MonthWindow,
    timezone_hours: f64,
    state: ParserState,
    events: Vec<EventRecord>,
}

impl FeedParser {
    pub fn new(window: MonthWindow, timezone_hours: f64) -> Self {
        FeedParser {
            window,
            timezone_hours,
            state: ParserState::Idle,
            events: Vec::new(),
        }
    }

    /// Feeds one logical line. Lines that are not properties are ignored.
    pub fn push_line(&mut self, line: &str) {
        let property = match parse_property(line) {
            Some(property) => property,
            None => return,
        };
        if is_component_marker(&property, "BEGIN", EVENT_COMPONENT) {
            if let ParserState::InBlock(_) = self.state {
                debug!("VEVENT started inside another VEVENT, discarding the first one");
            }
            self.state = ParserState::InBlock(Vec::new());
        } else if matches!(self.state, ParserState::InBlock(_))
            && property.name == START_PROPERTY
            && !self.start_in_window(&property)
        {
            self.state = ParserState::Idle;
            return;
        }

        let end_of_block = is_component_marker(&property, "END", EVENT_COMPONENT);
        if let ParserState::InBlock(block) = &mut self.state {
            block.push(property);
            if end_of_block {
                let block = std::mem::take(block);
                self.state = ParserState::Idle;
                self.finish_block(&block);
            }
        }
    }

    fn start_in_window(&self, property: &Property) -> bool {
        let token = property_value(property).unwrap_or_default();
        match normalize_date_token(token, self.timezone_hours) {
            Ok(start) if self.window.contains(start.year, start.month) => true,
            Ok(start) => {
                debug!(
                    "Skipping event starting {:04}-{:02}-{:02}, outside of {} and {}",
                    start.year, start.month, start.day, self.window.current, self.window.next
                );
                false
            }
            Err(e) => {
                warn!("Skipping event: {}", e);
                false
            }
        }
    }

    fn finish_block(&mut self, block: &[Property]) {
        match build_event(block, self.timezone_hours) {
            Ok(event) => self.events.push(event),
            Err(e) => warn!("Skipping event: {}", e),
        }
    }

    /// Returns the parsed events. A VEVENT that never ended is dropped.
    pub fn finish(self) -> Vec<EventRecord> {
        if let ParserState::InBlock(block) = self.state {
            debug!("Dropping incomplete VEVENT of {} properties at end of feed", block.len());
        }
        self.events
    }
}

/// Parses a whole feed. A read error fails the feed and nothing it produced is returned.
pub fn parse_feed<I>(
    lines: I,
    window: MonthWindow,
    timezone_hours: f64,
) -> Result<Vec<EventRecord>, CalendarError>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let mut parser = FeedParser::new(window, timezone_hours);
    for line in lines {
        let line = line.map_err(|e| CalendarError {
            msg: format!("Error reading calendar feed: {}", e),
        })?;
        parser.push_line(&line);
    }
    Ok(parser.finish())
}

/// Parses one feed of a render cycle into the cycle's aggregator. The events are only
/// added once the whole feed was read, a failed feed leaves the aggregator untouched.
pub fn parse_feed_into<I>(
    lines: I,
    aggregator: &mut MonthlyAggregator,
    timezone_hours: f64,
) -> Result<usize, CalendarError>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let events = parse_feed(lines, aggregator.window(), timezone_hours)?;
    let count = events.len();
    aggregator.extend(events);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::YearMonth;
    use crate::line_reader::{RawLines, UnfoldedLines};
    use std::io::Cursor;

    fn june() -> MonthWindow {
        MonthWindow::new(YearMonth::new(2024, 6))
    }

    fn parse(feed: &str, timezone_hours: f64) -> Vec<EventRecord> {
        parse_feed(RawLines::new(Cursor::new(feed)), june(), timezone_hours).unwrap()
    }

    fn vevent(dtstart: &str, summary: &str) -> String {
        format!(
            "BEGIN:VEVENT\r\nUID:{}\r\n{}\r\nSUMMARY:{}\r\nEND:VEVENT\r\n",
            summary, dtstart, summary
        )
    }

    #[test]
    fn minimal_feed() {
        let events = parse(
            "BEGIN:VEVENT\nDTSTART:20240615T090000Z\nSUMMARY:Meeting\nEND:VEVENT\n",
            0.0,
        );
        assert_eq!(1, events.len());
        let event = &events[0];
        assert_eq!((2024, 6, 15), (event.year, event.month, event.day));
        assert_eq!((9, 0), (event.hour, event.minute));
        assert!(event.has_time);
        assert_eq!("Meeting", event.title);
    }

    #[test]
    fn all_day_event() {
        let events = parse(&vevent("DTSTART;VALUE=DATE:20240620", "Holiday"), 9.0);
        assert_eq!(1, events.len());
        assert!(!events[0].has_time);
        assert_eq!(20, events[0].day);
    }

    #[test]
    fn every_block_in_the_window_becomes_one_event() {
        let mut feed = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n");
        for day in 1..=30 {
            feed.push_str(&vevent(&format!("DTSTART:202406{:02}T100000", day), &format!("june {}", day)));
        }
        for day in 1..=5 {
            feed.push_str(&vevent(&format!("DTSTART:202407{:02}", day), &format!("july {}", day)));
        }
        feed.push_str("END:VCALENDAR\r\n");
        let events = parse(&feed, 0.0);
        assert_eq!(35, events.len());
        assert_eq!("june 1", events[0].title);
        assert_eq!("july 5", events[34].title);
    }

    #[test]
    fn out_of_window_block_does_not_affect_the_next_one() {
        let feed = format!(
            "{}{}{}",
            vevent("DTSTART:20240515T090000Z", "May"),
            vevent("DTSTART:20240815T090000Z", "August"),
            vevent("DTSTART:20240702T090000Z", "July"),
        );
        let events = parse(&feed, 0.0);
        assert_eq!(1, events.len());
        assert_eq!("July", events[0].title);
        assert_eq!(7, events[0].month);
    }

    #[test]
    fn timezone_offset_can_move_an_event_into_the_window() {
        let events = parse(&vevent("DTSTART:20240531T230000Z", "Early"), 2.0);
        assert_eq!(1, events.len());
        assert_eq!((6, 1, 1), (events[0].month, events[0].day, events[0].hour));
    }

    #[test]
    fn timezone_offset_can_move_an_event_out_of_the_window() {
        let events = parse(&vevent("DTSTART:20240731T230000Z", "Late"), 2.0);
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_start_date_skips_only_that_event() {
        let feed = format!(
            "{}{}",
            vevent("DTSTART:2024-06-15", "Broken"),
            vevent("DTSTART:20240616", "Fine"),
        );
        let events = parse(&feed, 0.0);
        assert_eq!(1, events.len());
        assert_eq!("Fine", events[0].title);
    }

    #[test]
    fn block_without_start_date_is_skipped() {
        let feed = format!(
            "BEGIN:VEVENT\r\nSUMMARY:No start\r\nEND:VEVENT\r\n{}",
            vevent("DTSTART:20240616", "Fine")
        );
        let events = parse(&feed, 0.0);
        assert_eq!(1, events.len());
        assert_eq!("Fine", events[0].title);
    }

    #[test]
    fn missing_title_becomes_empty() {
        let events = parse("BEGIN:VEVENT\nDTSTART:20240616\nEND:VEVENT\n", 0.0);
        assert_eq!(1, events.len());
        assert_eq!("", events[0].title);
    }

    #[test]
    fn incomplete_block_is_dropped_at_end_of_feed() {
        let feed = format!(
            "{}BEGIN:VEVENT\r\nDTSTART:20240617\r\nSUMMARY:Cut off\r\n",
            vevent("DTSTART:20240616", "Fine")
        );
        let events = parse(&feed, 0.0);
        assert_eq!(1, events.len());
        assert_eq!("Fine", events[0].title);
    }

    #[test]
    fn timezone_definitions_outside_events_are_ignored() {
        let feed = format!(
            "BEGIN:VTIMEZONE\r\nTZID:Europe/Berlin\r\nBEGIN:STANDARD\r\nDTSTART:16010101T030000\r\nEND:STANDARD\r\nEND:VTIMEZONE\r\n{}",
            vevent("DTSTART;TZID=Europe/Berlin:20240616T100000", "Local")
        );
        let events = parse(&feed, 0.0);
        assert_eq!(1, events.len());
        assert_eq!(10, events[0].hour);
    }

    #[test]
    fn dtstamp_is_not_mistaken_for_the_start() {
        let feed = "BEGIN:VEVENT\nDTSTAMP:20200101T000000Z\nDTSTART:20240616\nSUMMARY:Stamped\nEND:VEVENT\n";
        assert_eq!(1, parse(feed, 0.0).len());
    }

    #[test]
    fn end_marker_outside_of_a_block_is_ignored() {
        let feed = format!("END:VEVENT\r\n{}END:VEVENT\r\n", vevent("DTSTART:20240616", "Once"));
        assert_eq!(1, parse(&feed, 0.0).len());
    }

    #[test]
    fn restarted_block_keeps_only_the_second_event() {
        let feed = "BEGIN:VEVENT\nSUMMARY:Lost\nBEGIN:VEVENT\nDTSTART:20240616\nSUMMARY:Kept\nEND:VEVENT\n";
        let events = parse(feed, 0.0);
        assert_eq!(1, events.len());
        assert_eq!("Kept", events[0].title);
    }

    #[test]
    fn escaped_title_is_sanitised() {
        let events = parse(&vevent("DTSTART:20240616", "Lunch\\, drinks"), 0.0);
        assert_eq!("Lunch, drinks", events[0].title);
    }

    #[test]
    fn folded_title_needs_unfolding() {
        let feed = "BEGIN:VEVENT\r\nDTSTART:20240616\r\nSUMMARY:Quarterly\r\n  planning\r\nEND:VEVENT\r\n";
        let raw = parse(feed, 0.0);
        assert_eq!("Quarterly", raw[0].title);
        let unfolded =
            parse_feed(UnfoldedLines::new(Cursor::new(feed)), june(), 0.0).unwrap();
        assert_eq!("Quarterly planning", unfolded[0].title);
    }

    #[test]
    fn read_error_fails_the_feed() {
        let lines = vec![
            Ok(String::from("BEGIN:VEVENT")),
            Ok(String::from("DTSTART:20240616")),
            Ok(String::from("END:VEVENT")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
        ];
        assert!(parse_feed(lines, june(), 0.0).is_err());
    }

    #[test]
    fn feeds_of_one_cycle_share_the_aggregator() {
        let mut aggregator = MonthlyAggregator::new(june());
        let work = format!(
            "{}{}{}",
            vevent("DTSTART:20240620T090000Z", "review"),
            vevent("DTSTART:20240705", "offsite"),
            vevent("DTSTART:20240610T090000Z", "retro"),
        );
        let family = format!(
            "{}{}",
            vevent("DTSTART:20240620", "birthday"),
            vevent("DTSTART:20240701T180000", "dinner"),
        );
        let added = parse_feed_into(RawLines::new(Cursor::new(work)), &mut aggregator, 0.0).unwrap();
        assert_eq!(3, added);
        let added =
            parse_feed_into(RawLines::new(Cursor::new(family)), &mut aggregator, 0.0).unwrap();
        assert_eq!(2, added);

        let day: Vec<&str> = aggregator
            .current_month()
            .events_on(20)
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(vec!["review", "birthday"], day);
        let next: Vec<&str> = aggregator
            .next_month()
            .events()
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(vec!["offsite", "dinner"], next);

        let window = aggregator.select_for_display(15, 3);
        let shown: Vec<&str> = window
            .entries
            .iter()
            .map(|entry| entry.event.title.as_str())
            .collect();
        assert_eq!(vec!["birthday", "review", "offsite"], shown);
    }

    #[test]
    fn failed_feed_leaves_earlier_feeds_in_place() {
        let mut aggregator = MonthlyAggregator::new(june());
        parse_feed_into(
            RawLines::new(Cursor::new(vevent("DTSTART:20240620", "kept"))),
            &mut aggregator,
            0.0,
        )
        .unwrap();
        let broken = vec![
            Ok(String::from("BEGIN:VEVENT")),
            Ok(String::from("DTSTART:20240621")),
            Ok(String::from("SUMMARY:lost")),
            Ok(String::from("END:VEVENT")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
        ];
        assert!(parse_feed_into(broken, &mut aggregator, 0.0).is_err());
        assert_eq!(1, aggregator.len());
        assert_eq!("kept", aggregator.current_month().events_on(20)[0].title);
        assert!(!aggregator.current_month().has_events_on(21));
    }

    #[test]
    fn build_event_reports_missing_start() {
        let block: Vec<Property> = ["BEGIN:VEVENT", "SUMMARY:x", "END:VEVENT"]
            .iter()
            .filter_map(|line| parse_property(line))
            .collect();
        assert_eq!(Err(RecordError::MissingStartDate), build_event(&block, 0.0));
    }
}

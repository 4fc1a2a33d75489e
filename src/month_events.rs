use log::debug;
use multimap::MultiMap;

use crate::domain::{EventRecord, MonthWindow, YearMonth};

const MAX_DAY_OF_MONTH: u32 = 31;

/// Events of the current month, bucketed by day of month. Days keep their events in
/// the order they were added.
#[derive(Debug, Clone)]
pub struct CurrentMonthIndex {
    month: YearMonth,
    events: MultiMap<u32, EventRecord>,
}

impl CurrentMonthIndex {
    fn new(month: YearMonth) -> Self {
        CurrentMonthIndex {
            month,
            events: MultiMap::new(),
        }
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn events_on(&self, day: u32) -> &[EventRecord] {
        self.events
            .get_vec(&day)
            .map(|events| events.as_slice())
            .unwrap_or(&[])
    }

    /// All events on `day` and later, in ascending day order.
    pub fn events_from(&self, day: u32) -> impl Iterator<Item = &EventRecord> + '_ {
        (day..=MAX_DAY_OF_MONTH).flat_map(move |d| self.events_on(d).iter())
    }

    pub fn has_events_on(&self, day: u32) -> bool {
        self.events.contains_key(&day)
    }

    pub fn len(&self) -> usize {
        self.events.iter_all().map(|(_, events)| events.len()).sum()
    }
}

/// Events of the following month, in feed order.
#[derive(Debug, Clone)]
pub struct NextMonthList {
    month: YearMonth,
    events: Vec<EventRecord>,
}

impl NextMonthList {
    fn new(month: YearMonth) -> Self {
        NextMonthList {
            month,
            events: Vec::new(),
        }
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Collects the events of all feeds fetched during one render cycle.
#[derive(Debug, Clone)]
pub struct MonthlyAggregator {
    window: MonthWindow,
    current: CurrentMonthIndex,
    next: NextMonthList,
}

impl MonthlyAggregator {
    pub fn new(window: MonthWindow) -> Self {
        MonthlyAggregator {
            window,
            current: CurrentMonthIndex::new(window.current),
            next: NextMonthList::new(window.next),
        }
    }

    pub fn window(&self) -> MonthWindow {
        self.window
    }

    /// Routes a record by its month alone: the current month goes into the day index,
    /// anything else is appended to the next month.
    pub fn add(&mut self, event: EventRecord) {
        if event.month == self.window.current.month {
            debug!("Adding '{}' on day {} of the current month", event.title, event.day);
            self.current.events.insert(event.day, event);
        } else {
            debug!("Adding '{}' to the next month", event.title);
            self.next.events.push(event);
        }
    }

    pub fn extend<I: IntoIterator<Item = EventRecord>>(&mut self, events: I) {
        for event in events {
            self.add(event);
        }
    }

    pub fn current_month(&self) -> &CurrentMonthIndex {
        &self.current
    }

    pub fn next_month(&self) -> &NextMonthList {
        &self.next
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.next.len()
    }
}

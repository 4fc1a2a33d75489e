use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use chrono::prelude::*;
use directories::ProjectDirs;
use log::{error, info};

use crate::domain::{CalendarError, MonthWindow};
use crate::display::{render_text, MonthGrid};
use crate::month_events::MonthlyAggregator;

mod chrono_ical;
mod display;
mod domain;
mod ical_util;
mod line_reader;
mod month_events;
mod papercal_ical;

/// Rows of the display, shared between the month grid and the event list
const DEFAULT_MAX_ROWS: u32 = 10;
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;
/// Largest UTC offset in use anywhere, in hours
const MAX_TIMEZONE_HOURS: f64 = 14.0;

#[derive(Debug, Clone, PartialEq)]
struct Config {
    feed_sources: Vec<String>,
    timezone_hours: f64,
    max_rows: u32,
    unfold_lines: bool,
    http_timeout_seconds: u64,
}

fn config_error(key: &str, val: &str, expected: &str) -> CalendarError {
    CalendarError {
        msg: format!("{} must be {}, got '{}'", key, expected, val),
    }
}

impl Config {
    fn from_env() -> Result<Config, CalendarError> {
        Config::from_lookup(|key| dotenvy::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Config, CalendarError> {
        let feed_sources: Vec<String> = lookup("PAPERCAL_ICAL_URL")
            .unwrap_or_default()
            .split(',')
            .map(|source| source.trim().to_string())
            .filter(|source| !source.is_empty())
            .collect();
        if feed_sources.is_empty() {
            return Err(CalendarError {
                msg: "Expecting a configuration property with name PAPERCAL_ICAL_URL".to_string(),
            });
        }
        let timezone_hours = match lookup("PAPERCAL_TIMEZONE") {
            Some(val) => match val.trim().parse::<f64>() {
                Ok(hours) if hours.is_finite() && hours.abs() <= MAX_TIMEZONE_HOURS => hours,
                _ => {
                    return Err(config_error(
                        "PAPERCAL_TIMEZONE",
                        &val,
                        "an offset in hours between -14 and 14",
                    ))
                }
            },
            None => 0.0,
        };
        let max_rows = match lookup("PAPERCAL_MAX_ROWS") {
            Some(val) => val
                .trim()
                .parse::<u32>()
                .map_err(|_| config_error("PAPERCAL_MAX_ROWS", &val, "a positive integer"))?,
            None => DEFAULT_MAX_ROWS,
        };
        let unfold_lines = match lookup("PAPERCAL_UNFOLD_LINES") {
            Some(val) => val
                .trim()
                .parse::<bool>()
                .map_err(|_| config_error("PAPERCAL_UNFOLD_LINES", &val, "a boolean"))?,
            None => false,
        };
        let http_timeout_seconds = match lookup("PAPERCAL_HTTP_TIMEOUT_SECONDS") {
            Some(val) => val.trim().parse::<u64>().map_err(|_| {
                config_error("PAPERCAL_HTTP_TIMEOUT_SECONDS", &val, "a number of seconds")
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECONDS,
        };
        Ok(Config {
            feed_sources,
            timezone_hours,
            max_rows,
            unfold_lines,
            http_timeout_seconds,
        })
    }
}

fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("net", "papercal", "papercal").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads `papercal_config.env` into the environment when it exists. Variables that are
/// already set in the environment win.
fn load_config() -> Result<(), CalendarError> {
    let config_file = match get_config_directory() {
        Some(dir) => dir.join("papercal_config.env"),
        None => return Ok(()),
    };
    if !config_file.exists() {
        info!(
            "No configuration file at {}, using the environment only",
            config_file.display()
        );
        return Ok(());
    }
    dotenvy::from_path(&config_file).map_err(|e| CalendarError {
        msg: format!(
            "Can not load configuration file {}: {}",
            config_file.display(),
            e
        ),
    })
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Opens a feed body as a stream. Non-success HTTP statuses are errors.
fn open_feed(source: &str, timeout_seconds: u64) -> Result<Box<dyn BufRead>, CalendarError> {
    if is_remote(source) {
        info!("Fetching calendar from {}", source);
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_seconds)))
            .build()
            .into();
        match agent.get(source).call() {
            Ok(response) => Ok(Box::new(BufReader::new(
                response.into_body().into_reader(),
            ))),
            Err(e) => Err(CalendarError {
                msg: format!("Error getting ical from url: {}", e),
            }),
        }
    } else {
        info!("Reading calendar from file {}", source);
        match File::open(source) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) => Err(CalendarError {
                msg: format!("Error opening calendar file {}: {}", source, e),
            }),
        }
    }
}

fn load_feed(
    source: &str,
    config: &Config,
    aggregator: &mut MonthlyAggregator,
) -> Result<usize, CalendarError> {
    let body = open_feed(source, config.http_timeout_seconds)?;
    papercal_ical::parse_feed_into(
        line_reader::logical_lines(body, config.unfold_lines),
        aggregator,
        config.timezone_hours,
    )
}

fn run() -> Result<(), CalendarError> {
    load_config()?;
    let config = Config::from_env()?;
    let offset_seconds = chrono_ical::offset_minutes(config.timezone_hours) * 60;
    let offset = FixedOffset::east_opt(offset_seconds as i32).ok_or_else(|| CalendarError {
        msg: format!("Timezone offset {} is out of range", config.timezone_hours),
    })?;
    let now = Utc::now().with_timezone(&offset);
    let today = now.date_naive();
    let window = MonthWindow::containing(today);
    info!(
        "Today is {}, showing events of {} and {}",
        today, window.current, window.next
    );

    let mut aggregator = MonthlyAggregator::new(window);
    for source in &config.feed_sources {
        let added = load_feed(source, &config, &mut aggregator)?;
        info!("Successfully got {} events from {}", added, source);
    }
    info!(
        "{} events in {}, {} events in {}",
        aggregator.current_month().len(),
        aggregator.current_month().month(),
        aggregator.next_month().len(),
        aggregator.next_month().month()
    );

    let grid = MonthGrid::new(window.current);
    let available_rows = grid.available_rows(config.max_rows);
    let display = aggregator.select_for_display(today.day(), available_rows);
    if display.is_empty() {
        info!("No upcoming events to show");
    } else {
        info!(
            "Showing {} of {} events in {} rows",
            display.len(),
            aggregator.len(),
            available_rows
        );
    }
    print!(
        "{}",
        render_text(&grid, aggregator.current_month(), today.day(), &display)
    );

    if let Some(tomorrow) = today.succ_opt() {
        info!("Next refresh at {} 00:00", tomorrow);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

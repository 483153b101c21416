//! Allowed start windows ("HH:mm-HH:mm", local time).

use chrono::{Local, NaiveTime, Timelike};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::ipc::WorkerLogger;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Source of the current time of day.
pub type Clock = Arc<dyn Fn() -> NaiveTime + Send + Sync>;

/// Wall-clock local time.
pub fn local_clock() -> Clock {
    Arc::new(|| Local::now().time())
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid window '{0}': expected HH:mm-HH:mm")]
pub struct WindowParseError(pub String);

/// A daily time window. The end is exclusive; an end before the start wraps midnight,
/// and equal bounds cover the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl AllowedWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn parse(raw: &str) -> Result<Self, WindowParseError> {
        let invalid = || WindowParseError(raw.to_string());
        let (start, end) = raw.split_once('-').ok_or_else(invalid)?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").map_err(|_| invalid())?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").map_err(|_| invalid())?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }

    /// Time from `now` until this window next opens (zero when already open).
    pub fn until_open(&self, now: NaiveTime) -> Duration {
        if self.contains(now) {
            return Duration::ZERO;
        }
        let now_secs = u64::from(now.num_seconds_from_midnight());
        let start_secs = u64::from(self.start.num_seconds_from_midnight());
        Duration::from_secs((start_secs + SECONDS_PER_DAY - now_secs) % SECONDS_PER_DAY)
    }
}

impl fmt::Display for AllowedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Parse every window, skipping (and reporting) the invalid ones.
pub fn parse_windows(raw: &[String]) -> (Vec<AllowedWindow>, Vec<WindowParseError>) {
    let mut windows = Vec::new();
    let mut errors = Vec::new();
    for entry in raw {
        match AllowedWindow::parse(entry) {
            Ok(w) => windows.push(w),
            Err(e) => errors.push(e),
        }
    }
    (windows, errors)
}

/// `None` when `now` is inside any window (or there are none), otherwise the
/// shortest wait until one opens.
pub fn time_until_allowed(windows: &[AllowedWindow], now: NaiveTime) -> Option<Duration> {
    if windows.is_empty() || windows.iter().any(|w| w.contains(now)) {
        return None;
    }
    windows.iter().map(|w| w.until_open(now)).min()
}

/// Block until `clock` falls inside one of `windows`.
pub async fn wait_for_window(windows: &[AllowedWindow], logger: &WorkerLogger, clock: &Clock) {
    while let Some(wait) = time_until_allowed(windows, clock()) {
        let list = windows
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        logger.info(
            false,
            "SCHEDULE",
            format!(
                "Outside allowed windows ({}), waiting {} minute(s)",
                list,
                wait.as_secs().div_ceil(60)
            ),
        );
        // Sub-minute precision: re-check right after the window opens
        tokio::time::sleep(wait + Duration::from_secs(1)).await;
    }
}

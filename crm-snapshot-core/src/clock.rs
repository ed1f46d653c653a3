//! Time source for a run and the fetch window derived from it.

use chrono::{DateTime, Duration, Utc};

/// Window length used when none is configured.
pub const DEFAULT_WINDOW_DAYS: i64 = 2;

const CRM_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Supplies the reference instant of a run.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The time range a run fetches records for, ending at the run's reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RunWindow {
    pub fn ending_at(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// Date stamp embedded in object names, e.g. `2024_03_07`.
    pub fn file_date(&self) -> String {
        self.end.format("%Y_%m_%d").to_string()
    }

    pub fn year(&self) -> String {
        self.end.format("%Y").to_string()
    }

    pub fn month(&self) -> String {
        self.end.format("%m").to_string()
    }

    /// Window start as the CRM expects it in filters.
    pub fn start_param(&self) -> String {
        self.start.format(CRM_TIMESTAMP_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(CRM_TIMESTAMP_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_formats_dates_and_partitions() {
        let end = Utc.with_ymd_and_hms(2024, 3, 7, 5, 4, 3).unwrap();
        let window = RunWindow::ending_at(FixedClock(end).now(), DEFAULT_WINDOW_DAYS);

        assert_eq!(window.file_date(), "2024_03_07");
        assert_eq!(window.year(), "2024");
        assert_eq!(window.month(), "03");
        assert_eq!(window.start_param(), "2024-03-05T05:04:03+0000");
        assert_eq!(window.end_param(), "2024-03-07T05:04:03+0000");
    }
}

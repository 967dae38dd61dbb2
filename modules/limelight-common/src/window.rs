//! Daily window math: the [start, end) interval assigned to a run.
//!
//! The boundary is "6am operator-local"; converting it to UTC at window
//! construction means DST transitions yield 23- or 25-hour windows, which
//! downstream normalization absorbs.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const WINDOW_BOUNDARY_HOUR: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DailyWindow {
    /// Window ending at the most recent local boundary before `now`.
    pub fn latest(now: DateTime<Utc>, tz: Tz) -> Result<Self, PipelineError> {
        let now_local = now.with_timezone(&tz);
        let boundary = local_boundary(tz, now_local.year(), now_local.month(), now_local.day())?;
        let end = if boundary > now_local {
            previous_day_boundary(boundary, tz)?
        } else {
            boundary
        };
        let start = previous_day_boundary(end, tz)?;
        Ok(Self {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        })
    }

    /// Window starting at the local boundary on the given calendar date.
    pub fn starting_on(year: i32, month: u32, day: u32, tz: Tz) -> Result<Self, PipelineError> {
        let start = local_boundary(tz, year, month, day)?;
        let end = next_day_boundary(start, tz)?;
        Ok(Self {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl std::fmt::Display for DailyWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} .. {})",
            self.start.format("%Y-%m-%dT%H:%MZ"),
            self.end.format("%Y-%m-%dT%H:%MZ")
        )
    }
}

fn local_boundary(tz: Tz, year: i32, month: u32, day: u32) -> Result<DateTime<Tz>, PipelineError> {
    tz.with_ymd_and_hms(year, month, day, WINDOW_BOUNDARY_HOUR, 0, 0)
        .earliest()
        .ok_or_else(|| {
            PipelineError::Config(format!("no valid {WINDOW_BOUNDARY_HOUR}:00 on {year}-{month:02}-{day:02} in {tz}"))
        })
}

fn previous_day_boundary(b: DateTime<Tz>, tz: Tz) -> Result<DateTime<Tz>, PipelineError> {
    let prev = b.date_naive() - Duration::days(1);
    local_boundary(tz, prev.year(), prev.month(), prev.day())
}

fn next_day_boundary(b: DateTime<Tz>, tz: Tz) -> Result<DateTime<Tz>, PipelineError> {
    let next = b.date_naive() + Duration::days(1);
    local_boundary(tz, next.year(), next.month(), next.day())
}

/// ISO week key ("2026-W31") used by the weekly baseline table.
pub fn iso_week_key(ts: DateTime<Utc>) -> String {
    let week = ts.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

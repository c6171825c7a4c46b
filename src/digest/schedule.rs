//! Digest schedules and the lookback window they imply.
//!
//! Windows are anchored at the start of the reference day (UTC), so a
//! "daily" digest always covers the whole previous day no matter what hour
//! the run happens at.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown schedule '{0}' (expected \"daily\" or \"weekly\")")]
pub struct UnknownSchedule(pub String);

/// How often a digest is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    #[default]
    Daily,
    Weekly,
}

impl Schedule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Schedule::Daily => "daily",
            Schedule::Weekly => "weekly",
        }
    }

    /// Lookback measured back from the start of the reference day.
    pub fn duration(&self) -> Duration {
        match self {
            Schedule::Daily => Duration::hours(24),
            Schedule::Weekly => Duration::hours(7 * 24),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Schedule {
    type Err = UnknownSchedule;

    /// Names are matched exactly; `"Daily"` is not a schedule.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Schedule::Daily),
            "weekly" => Ok(Schedule::Weekly),
            other => Err(UnknownSchedule(other.to_string())),
        }
    }
}

/// Maps a schedule name to its lookback duration.
///
/// Returns `None` for anything other than `"daily"` and `"weekly"`.
pub fn duration_for(schedule: &str) -> Option<Duration> {
    schedule.parse::<Schedule>().ok().map(|s| s.duration())
}

/// Midnight UTC of the day containing `t`.
pub fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Returns `true` when `candidate` falls inside the schedule window.
///
/// The window starts `duration_for(schedule)` before the start of
/// `reference_now`'s day and is inclusive at that boundary. An unknown
/// schedule admits nothing.
pub fn in_window(candidate: DateTime<Utc>, reference_now: DateTime<Utc>, schedule: &str) -> bool {
    match duration_for(schedule) {
        Some(lookback) => candidate >= start_of_day(reference_now) - lookback,
        None => false,
    }
}

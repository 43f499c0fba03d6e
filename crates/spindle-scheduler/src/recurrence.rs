//! Recurrence descriptors.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// How often a recurring job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    Every1h,
    Every2h,
    Every4h,
    Every6h,
    Every8h,
    Every12h,
    Every24h,
    Every48h,
    EveryWeek,
}

impl Recurrence {
    pub const ALL: [Recurrence; 9] = [
        Recurrence::Every1h,
        Recurrence::Every2h,
        Recurrence::Every4h,
        Recurrence::Every6h,
        Recurrence::Every8h,
        Recurrence::Every12h,
        Recurrence::Every24h,
        Recurrence::Every48h,
        Recurrence::EveryWeek,
    ];

    /// Exact descriptor lookup.
    pub fn from_descriptor(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }

    /// Lenient lookup used at run time; unknown descriptors mean daily.
    pub fn parse(s: &str) -> Self {
        Self::from_descriptor(s).unwrap_or(Recurrence::Every24h)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Every1h => "every_1h",
            Recurrence::Every2h => "every_2h",
            Recurrence::Every4h => "every_4h",
            Recurrence::Every6h => "every_6h",
            Recurrence::Every8h => "every_8h",
            Recurrence::Every12h => "every_12h",
            Recurrence::Every24h => "every_24h",
            Recurrence::Every48h => "every_48h",
            Recurrence::EveryWeek => "every_week",
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            Recurrence::Every1h => Duration::hours(1),
            Recurrence::Every2h => Duration::hours(2),
            Recurrence::Every4h => Duration::hours(4),
            Recurrence::Every6h => Duration::hours(6),
            Recurrence::Every8h => Duration::hours(8),
            Recurrence::Every12h => Duration::hours(12),
            Recurrence::Every24h => Duration::hours(24),
            Recurrence::Every48h => Duration::hours(48),
            Recurrence::EveryWeek => Duration::weeks(1),
        }
    }

    /// Next due time after a run at `now`.
    ///
    /// `base` is the previous due time. After downtime longer than one
    /// interval the schedule lands one interval from `now` instead of firing
    /// once per missed interval.
    pub fn next_run(&self, base: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
        let interval = self.interval();
        let base = base.unwrap_or(now);
        (base + interval).max(now + interval)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session schedule predicates.
//!
//! The engine consumes the schedule as a predicate only: "is this moment
//! inside the configured session window, and did the current window start
//! when the session state was created?" When the answer to the second
//! question becomes no, the timer path resets the session (the daily
//! sequence-number reset).

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

/// Wall-clock predicate for session windows.
pub trait SessionSchedule: Send + Sync {
    /// Returns true if `now` falls inside a session window.
    fn is_session_time(&self, now: DateTime<Utc>) -> bool;

    /// Returns true if both instants fall inside the same session window.
    fn is_same_session(&self, first: DateTime<Utc>, second: DateTime<Utc>) -> bool;
}

/// A schedule that is always in session and never rolls over.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonStopSchedule;

impl SessionSchedule for NonStopSchedule {
    fn is_session_time(&self, _now: DateTime<Utc>) -> bool {
        true
    }

    fn is_same_session(&self, _first: DateTime<Utc>, _second: DateTime<Utc>) -> bool {
        true
    }
}

/// Recurring session window in UTC.
///
/// Without day bounds the window recurs daily from `start_time` to
/// `end_time` (crossing midnight when `end_time <= start_time`). With day
/// bounds it recurs weekly from `start_day start_time` to
/// `end_day end_time`.
#[derive(Debug, Clone, Copy)]
pub struct WeeklySchedule {
    start_day: Option<Weekday>,
    end_day: Option<Weekday>,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

impl WeeklySchedule {
    /// Creates a daily schedule from `start_time` to `end_time` UTC.
    #[must_use]
    pub const fn daily(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            start_day: None,
            end_day: None,
            start_time,
            end_time,
        }
    }

    /// Creates a weekly schedule spanning `start_day start_time` to
    /// `end_day end_time` UTC.
    #[must_use]
    pub const fn weekly(
        start_day: Weekday,
        start_time: NaiveTime,
        end_day: Weekday,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            start_day: Some(start_day),
            end_day: Some(end_day),
            start_time,
            end_time,
        }
    }

    /// Start of the window containing `now`, or of the most recent window
    /// before it.
    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.start_day {
            None => {
                let candidate = now.date_naive().and_time(self.start_time).and_utc();
                if candidate <= now {
                    candidate
                } else {
                    candidate - Duration::days(1)
                }
            }
            Some(day) => {
                let days_back = (i64::from(now.weekday().num_days_from_monday())
                    - i64::from(day.num_days_from_monday()))
                .rem_euclid(7);
                let candidate = (now.date_naive() - Duration::days(days_back))
                    .and_time(self.start_time)
                    .and_utc();
                if candidate <= now {
                    candidate
                } else {
                    candidate - Duration::days(7)
                }
            }
        }
    }

    fn window_duration(&self) -> Duration {
        let mut seconds =
            (self.end_time - self.start_time).num_seconds() + self.day_span() * 86_400;
        let period = if self.start_day.is_some() { 7 } else { 1 };
        if seconds <= 0 {
            seconds += period * 86_400;
        }
        Duration::seconds(seconds)
    }

    fn day_span(&self) -> i64 {
        match (self.start_day, self.end_day) {
            (Some(start), Some(end)) => (i64::from(end.num_days_from_monday())
                - i64::from(start.num_days_from_monday()))
            .rem_euclid(7),
            _ => 0,
        }
    }
}

impl SessionSchedule for WeeklySchedule {
    fn is_session_time(&self, now: DateTime<Utc>) -> bool {
        let start = self.window_start(now);
        now < start + self.window_duration()
    }

    fn is_same_session(&self, first: DateTime<Utc>, second: DateTime<Utc>) -> bool {
        self.is_session_time(first)
            && self.is_session_time(second)
            && self.window_start(first) == self.window_start(second)
    }
}

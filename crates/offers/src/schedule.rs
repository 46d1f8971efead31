//! Schedule activity. Derived on read, never stored.

use crate::models::{Offer, Schedule, ScheduleStatus, Weekday};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

/// True when the offer's schedule is `Active`, `now` lies inside
/// `[startAt, endAt]` (a missing bound is open), and, for recurring
/// schedules, today in the schedule's time zone is one of the recurring days.
pub fn is_currently_active(offer: &Offer, now: DateTime<Utc>) -> bool {
    offer.schedule.is_active_at(now)
}

impl Schedule {
    /// The schedule's IANA zone. Unknown names fall back to UTC; validation
    /// rejects them before anything is stored.
    pub fn tz(&self) -> Tz {
        self.timezone.trim().parse::<Tz>().unwrap_or(Tz::UTC)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != ScheduleStatus::Active {
            return false;
        }
        if self.start_at.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_at.is_some_and(|end| now > end) {
            return false;
        }
        if self.is_recurring {
            let today = Weekday::from(now.with_timezone(&self.tz()).weekday());
            return self.recurring_days.contains(&today);
        }
        true
    }
}

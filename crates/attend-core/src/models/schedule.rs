//! Weekly schedule and per-date override models

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::StaffId;

/// Expected hours for one staff member on one day of the week.
///
/// `day_of_week` counts from Monday (0) to Sunday (6). Entries built through
/// [`WeeklyScheduleEntry::new`] never carry times when the day is off or the
/// schedule is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub staff_id: StaffId,
    pub day_of_week: u8,
    pub scheduled_in: Option<NaiveTime>,
    pub scheduled_out: Option<NaiveTime>,
    pub day_off: bool,
    pub open_schedule: bool,
}

impl WeeklyScheduleEntry {
    #[must_use]
    pub fn new(
        staff_id: StaffId,
        day_of_week: u8,
        scheduled_in: Option<NaiveTime>,
        scheduled_out: Option<NaiveTime>,
        day_off: bool,
        open_schedule: bool,
    ) -> Self {
        let (scheduled_in, scheduled_out) =
            strip_hours(day_off, open_schedule, scheduled_in, scheduled_out);
        Self {
            staff_id,
            day_of_week,
            scheduled_in,
            scheduled_out,
            day_off,
            open_schedule,
        }
    }

    /// Natural key in the local store.
    #[must_use]
    pub const fn key(&self) -> (StaffId, u8) {
        (self.staff_id, self.day_of_week)
    }
}

/// One-off exception to the weekly schedule for a specific date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOverrideEntry {
    pub staff_id: StaffId,
    pub date: NaiveDate,
    pub scheduled_in: Option<NaiveTime>,
    pub scheduled_out: Option<NaiveTime>,
    pub day_off: bool,
    pub open_schedule: bool,
    pub reason_id: Option<i64>,
}

impl DateOverrideEntry {
    #[must_use]
    pub fn new(
        staff_id: StaffId,
        date: NaiveDate,
        scheduled_in: Option<NaiveTime>,
        scheduled_out: Option<NaiveTime>,
        day_off: bool,
        open_schedule: bool,
        reason_id: Option<i64>,
    ) -> Self {
        let (scheduled_in, scheduled_out) =
            strip_hours(day_off, open_schedule, scheduled_in, scheduled_out);
        Self {
            staff_id,
            date,
            scheduled_in,
            scheduled_out,
            day_off,
            open_schedule,
            reason_id,
        }
    }

    /// Natural key in the local store.
    #[must_use]
    pub const fn key(&self) -> (StaffId, NaiveDate) {
        (self.staff_id, self.date)
    }
}

/// Days off and open schedules have no fixed hours.
pub(crate) const fn strip_hours(
    day_off: bool,
    open_schedule: bool,
    scheduled_in: Option<NaiveTime>,
    scheduled_out: Option<NaiveTime>,
) -> (Option<NaiveTime>, Option<NaiveTime>) {
    if day_off || open_schedule {
        (None, None)
    } else {
        (scheduled_in, scheduled_out)
    }
}

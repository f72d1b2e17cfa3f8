//! The daily roster shown on the kiosk table

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::schedule::strip_hours;
use super::{AttendanceEvent, DateOverrideEntry, StaffRecord, WeeklyScheduleEntry};

/// How a clock-in or clock-out compares with the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Punctuality {
    OnTime,
    Late,
    Early,
}

/// One row of the kiosk table: a staff member, the schedule in effect for
/// the date and the attendance recorded so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub staff: StaffRecord,
    pub scheduled_in: Option<NaiveTime>,
    pub scheduled_out: Option<NaiveTime>,
    pub day_off: bool,
    pub open_schedule: bool,
    pub reason_id: Option<i64>,
    pub attendance: Option<AttendanceEvent>,
}

impl RosterEntry {
    /// Resolve the schedule in effect: each field comes from the override
    /// when present, else from the weekly entry, else empty.
    #[must_use]
    pub fn resolve(
        staff: StaffRecord,
        weekly: Option<&WeeklyScheduleEntry>,
        date_override: Option<&DateOverrideEntry>,
        attendance: Option<AttendanceEvent>,
    ) -> Self {
        let scheduled_in = date_override
            .and_then(|o| o.scheduled_in)
            .or_else(|| weekly.and_then(|w| w.scheduled_in));
        let scheduled_out = date_override
            .and_then(|o| o.scheduled_out)
            .or_else(|| weekly.and_then(|w| w.scheduled_out));
        let day_off = date_override
            .map(|o| o.day_off)
            .or_else(|| weekly.map(|w| w.day_off))
            .unwrap_or(false);
        let open_schedule = date_override
            .map(|o| o.open_schedule)
            .or_else(|| weekly.map(|w| w.open_schedule))
            .unwrap_or(false);
        let (scheduled_in, scheduled_out) =
            strip_hours(day_off, open_schedule, scheduled_in, scheduled_out);

        Self {
            staff,
            scheduled_in,
            scheduled_out,
            day_off,
            open_schedule,
            reason_id: date_override.and_then(|o| o.reason_id),
            attendance,
        }
    }

    /// Arrival compared with the scheduled in-time, at minute resolution.
    #[must_use]
    pub fn arrival(&self) -> Option<Punctuality> {
        let work_in = self.attendance.as_ref()?.work_in?;
        let scheduled = self.scheduled_in?;
        Some(if minutes(work_in) > minutes(scheduled) {
            Punctuality::Late
        } else {
            Punctuality::OnTime
        })
    }

    /// Departure compared with the scheduled out-time, at minute resolution.
    #[must_use]
    pub fn departure(&self) -> Option<Punctuality> {
        let work_off = self.attendance.as_ref()?.work_off?;
        let scheduled = self.scheduled_out?;
        Some(if minutes(work_off) < minutes(scheduled) {
            Punctuality::Early
        } else {
            Punctuality::OnTime
        })
    }
}

fn minutes(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

//! Attendance event model

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::StaffId;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// One staff member's attendance for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub staff_id: StaffId,
    pub date: NaiveDate,
    pub work_in: Option<NaiveTime>,
    pub work_off: Option<NaiveTime>,
    pub hours_worked: Option<f64>,
}

impl AttendanceEvent {
    /// Clocked in and not yet clocked out.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.work_in.is_some() && self.work_off.is_none()
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.work_off.is_some()
    }
}

/// Hours between two times of day.
///
/// A shift whose end is earlier than its start spans midnight, so a day is
/// added before dividing.
#[must_use]
pub fn hours_between(work_in: NaiveTime, work_off: NaiveTime) -> f64 {
    let start = i64::from(work_in.num_seconds_from_midnight());
    let end = i64::from(work_off.num_seconds_from_midnight());
    let mut seconds = end - start;
    if seconds < 0 {
        seconds += SECONDS_PER_DAY;
    }
    #[allow(clippy::cast_precision_loss)]
    let hours = seconds as f64 / 3600.0;
    hours
}

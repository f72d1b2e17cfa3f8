//! Data models for Attend

mod attendance;
mod roster;
mod schedule;
mod staff;

pub use attendance::{hours_between, AttendanceEvent};
pub use roster::{Punctuality, RosterEntry};
pub use schedule::{DateOverrideEntry, WeeklyScheduleEntry};
pub use staff::{StaffId, StaffRecord};

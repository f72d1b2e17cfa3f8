//! Database layer for Attend

mod attendance_repository;
mod columns;
mod connection;
mod migrations;
mod schedule_repository;
mod staff_repository;

pub use attendance_repository::{AttendanceRepository, SqliteAttendanceRepository};
pub use connection::{Database, BUSY_TIMEOUT};
pub use schedule_repository::{ScheduleRepository, SqliteScheduleRepository};
pub use staff_repository::{SqliteStaffRepository, StaffRepository};

//! Attendance repository implementation

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection};

use super::columns::{date_column, date_to_sql, time_column, time_to_sql};
use crate::error::Result;
use crate::models::{AttendanceEvent, StaffId};

/// Trait for attendance storage operations
///
/// Rows are created on clock-in and completed on clock-out. Nothing here
/// deletes them.
pub trait AttendanceRepository {
    /// The row for one staff member on one date
    fn get(&self, staff_id: StaffId, date: NaiveDate) -> Result<Option<AttendanceEvent>>;

    /// Create the row for a clock-in
    fn insert_work_in(&self, staff_id: StaffId, date: NaiveDate, work_in: NaiveTime)
        -> Result<()>;

    /// Set `work_off` and `hours_worked` on an existing row
    fn complete(
        &self,
        staff_id: StaffId,
        date: NaiveDate,
        work_off: NaiveTime,
        hours_worked: f64,
    ) -> Result<()>;

    /// All rows for one date, ordered by staff id
    fn list_for_date(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>>;
}

/// `SQLite` implementation of `AttendanceRepository`
pub struct SqliteAttendanceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAttendanceRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceEvent> {
        Ok(AttendanceEvent {
            staff_id: StaffId::new(row.get(0)?),
            date: date_column(row, 1)?,
            work_in: time_column(row, 2)?,
            work_off: time_column(row, 3)?,
            hours_worked: row.get(4)?,
        })
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn get(&self, staff_id: StaffId, date: NaiveDate) -> Result<Option<AttendanceEvent>> {
        let result = self.conn.query_row(
            "SELECT staff_id, work_date, work_in, work_off, hours_worked
             FROM attendance WHERE staff_id = ? AND work_date = ?",
            params![staff_id.get(), date_to_sql(date)],
            Self::parse_event,
        );

        match result {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_work_in(
        &self,
        staff_id: StaffId,
        date: NaiveDate,
        work_in: NaiveTime,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO attendance (staff_id, work_date, work_in) VALUES (?, ?, ?)",
            params![staff_id.get(), date_to_sql(date), time_to_sql(Some(work_in))],
        )?;
        Ok(())
    }

    fn complete(
        &self,
        staff_id: StaffId,
        date: NaiveDate,
        work_off: NaiveTime,
        hours_worked: f64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE attendance SET work_off = ?, hours_worked = ?
             WHERE staff_id = ? AND work_date = ?",
            params![
                time_to_sql(Some(work_off)),
                hours_worked,
                staff_id.get(),
                date_to_sql(date)
            ],
        )?;
        Ok(())
    }

    fn list_for_date(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT staff_id, work_date, work_in, work_off, hours_worked
             FROM attendance WHERE work_date = ? ORDER BY staff_id",
        )?;

        let events = stmt
            .query_map(params![date_to_sql(date)], Self::parse_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(events)
    }
}

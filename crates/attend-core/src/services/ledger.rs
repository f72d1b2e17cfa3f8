//! The attendance ledger: the local store behind the kiosk table.
//!
//! Clock-in/out actions from the operator and reconciliation writes from the
//! sync core both go through one [`Ledger`], which serializes them on a
//! single connection.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::db::{
    AttendanceRepository, Database, ScheduleRepository, SqliteAttendanceRepository,
    SqliteScheduleRepository, SqliteStaffRepository, StaffRepository,
};
use crate::error::{ClockStateError, Result};
use crate::models::{
    hours_between, AttendanceEvent, DateOverrideEntry, RosterEntry, StaffId, StaffRecord,
    WeeklyScheduleEntry,
};

/// Thread-safe handle to the attendance store.
#[derive(Clone)]
pub struct Ledger {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl Ledger {
    /// Open the ledger at the given filesystem path, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::info!("Attendance ledger at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory ledger (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, `None` for in-memory ledgers.
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Run `f` inside one transaction.
    ///
    /// The transaction commits only when `f` returns `Ok`; on error it is
    /// dropped, which rolls every write back.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run a read-only closure against the connection.
    pub async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let db = self.db.lock().await;
        f(db.connection())
    }

    pub async fn list_staff(&self) -> Result<Vec<StaffRecord>> {
        self.read(|conn| SqliteStaffRepository::new(conn).list()).await
    }

    pub async fn get_staff(&self, id: StaffId) -> Result<Option<StaffRecord>> {
        self.read(|conn| SqliteStaffRepository::new(conn).get(id)).await
    }

    pub async fn list_weekly_schedule(&self) -> Result<Vec<WeeklyScheduleEntry>> {
        self.read(|conn| SqliteScheduleRepository::new(conn).list_weekly())
            .await
    }

    pub async fn list_date_overrides(&self) -> Result<Vec<DateOverrideEntry>> {
        self.read(|conn| SqliteScheduleRepository::new(conn).list_overrides())
            .await
    }

    pub async fn attendance_for(
        &self,
        staff_id: StaffId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEvent>> {
        self.read(|conn| SqliteAttendanceRepository::new(conn).get(staff_id, date))
            .await
    }

    /// Record a clock-in at `now` (kiosk local time).
    pub async fn clock_in(&self, staff_id: StaffId, now: NaiveDateTime) -> Result<AttendanceEvent> {
        let date = now.date();
        let work_in = whole_seconds(now.time());

        let event = self
            .transaction(|conn| {
                if SqliteStaffRepository::new(conn).get(staff_id)?.is_none() {
                    return Err(ClockStateError::UnknownStaff(staff_id).into());
                }

                let attendance = SqliteAttendanceRepository::new(conn);
                if attendance.get(staff_id, date)?.is_some() {
                    return Err(ClockStateError::AlreadyClockedIn(staff_id).into());
                }
                attendance.insert_work_in(staff_id, date, work_in)?;

                Ok(AttendanceEvent {
                    staff_id,
                    date,
                    work_in: Some(work_in),
                    work_off: None,
                    hours_worked: None,
                })
            })
            .await?;

        tracing::info!("Staff {staff_id} clocked in at {work_in} on {date}");
        Ok(event)
    }

    /// Record a clock-off at `now` (kiosk local time).
    ///
    /// `work_in_time` is the clock-in the operator sees on the table; without
    /// one there is nothing to close. The row closed is today's open row, or
    /// yesterday's for a shift that crossed midnight. Hours are computed from
    /// the stored clock-in.
    pub async fn clock_off(
        &self,
        staff_id: StaffId,
        work_in_time: Option<NaiveTime>,
        now: NaiveDateTime,
    ) -> Result<AttendanceEvent> {
        if work_in_time.is_none() {
            return Err(ClockStateError::NotClockedIn(staff_id).into());
        }

        let today = now.date();
        let work_off = whole_seconds(now.time());

        let event = self
            .transaction(|conn| {
                let attendance = SqliteAttendanceRepository::new(conn);

                let open = match attendance.get(staff_id, today)? {
                    Some(event) if event.is_complete() => {
                        return Err(ClockStateError::AlreadyClockedOut(staff_id).into());
                    }
                    Some(event) if event.is_open() => Some(event),
                    _ => match today.pred_opt() {
                        Some(yesterday) => attendance
                            .get(staff_id, yesterday)?
                            .filter(AttendanceEvent::is_open),
                        None => None,
                    },
                };

                let Some(mut event) = open else {
                    return Err(ClockStateError::NotClockedIn(staff_id).into());
                };
                let Some(work_in) = event.work_in else {
                    return Err(ClockStateError::NotClockedIn(staff_id).into());
                };

                let hours = hours_between(work_in, work_off);
                attendance.complete(staff_id, event.date, work_off, hours)?;

                event.work_off = Some(work_off);
                event.hours_worked = Some(hours);
                Ok(event)
            })
            .await?;

        tracing::info!(
            "Staff {staff_id} clocked off at {work_off} ({:.2} h, shift of {})",
            event.hours_worked.unwrap_or_default(),
            event.date
        );
        Ok(event)
    }

    /// The kiosk table for one date: every staff member with the schedule in
    /// effect and the attendance recorded so far, ordered by staff id.
    pub async fn roster_for(&self, date: NaiveDate) -> Result<Vec<RosterEntry>> {
        #[allow(clippy::cast_possible_truncation)]
        let day_of_week = date.weekday().num_days_from_monday() as u8;

        self.read(|conn| {
            let staff = SqliteStaffRepository::new(conn).list()?;
            let schedules = SqliteScheduleRepository::new(conn);
            let weekly: HashMap<_, _> = schedules
                .weekly_for_day(day_of_week)?
                .into_iter()
                .map(|entry| (entry.staff_id, entry))
                .collect();
            let overrides: HashMap<_, _> = schedules
                .overrides_for_date(date)?
                .into_iter()
                .map(|entry| (entry.staff_id, entry))
                .collect();
            let mut attendance: HashMap<_, _> = SqliteAttendanceRepository::new(conn)
                .list_for_date(date)?
                .into_iter()
                .map(|event| (event.staff_id, event))
                .collect();

            Ok(staff
                .into_iter()
                .map(|member| {
                    let id = member.staff_id;
                    RosterEntry::resolve(
                        member,
                        weekly.get(&id),
                        overrides.get(&id),
                        attendance.remove(&id),
                    )
                })
                .collect())
        })
        .await
    }
}

fn whole_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

//! Weekly schedule and date override repository

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use super::columns::{date_column, date_to_sql, flag_column, time_column, time_to_sql};
use crate::error::Result;
use crate::models::{DateOverrideEntry, StaffId, WeeklyScheduleEntry};

/// Trait for schedule storage operations
///
/// Writes go through the model constructors' rule that days off and open
/// schedules carry no hours, so stored rows never contradict it.
pub trait ScheduleRepository {
    /// All weekly entries, ordered by staff then weekday
    fn list_weekly(&self) -> Result<Vec<WeeklyScheduleEntry>>;

    /// Weekly entries for one weekday (0 = Monday)
    fn weekly_for_day(&self, day_of_week: u8) -> Result<Vec<WeeklyScheduleEntry>>;

    fn upsert_weekly(&self, entry: &WeeklyScheduleEntry) -> Result<()>;

    fn delete_weekly(&self, staff_id: StaffId, day_of_week: u8) -> Result<()>;

    /// All date overrides, ordered by staff then date
    fn list_overrides(&self) -> Result<Vec<DateOverrideEntry>>;

    /// Overrides that apply to one date
    fn overrides_for_date(&self, date: NaiveDate) -> Result<Vec<DateOverrideEntry>>;

    fn upsert_override(&self, entry: &DateOverrideEntry) -> Result<()>;

    fn delete_override(&self, staff_id: StaffId, date: NaiveDate) -> Result<()>;
}

/// `SQLite` implementation of `ScheduleRepository`
pub struct SqliteScheduleRepository<'a> {
    conn: &'a Connection,
}

const WEEKLY_COLUMNS: &str =
    "staff_id, day_of_week, scheduled_in, scheduled_out, day_off, open_schedule";

const OVERRIDE_COLUMNS: &str =
    "staff_id, date, scheduled_in, scheduled_out, day_off, open_schedule, reason_id";

impl<'a> SqliteScheduleRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_weekly(row: &rusqlite::Row<'_>) -> rusqlite::Result<WeeklyScheduleEntry> {
        Ok(WeeklyScheduleEntry::new(
            StaffId::new(row.get(0)?),
            row.get(1)?,
            time_column(row, 2)?,
            time_column(row, 3)?,
            flag_column(row, 4)?,
            flag_column(row, 5)?,
        ))
    }

    fn parse_override(row: &rusqlite::Row<'_>) -> rusqlite::Result<DateOverrideEntry> {
        Ok(DateOverrideEntry::new(
            StaffId::new(row.get(0)?),
            date_column(row, 1)?,
            time_column(row, 2)?,
            time_column(row, 3)?,
            flag_column(row, 4)?,
            flag_column(row, 5)?,
            row.get(6)?,
        ))
    }

    fn query_weekly(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<WeeklyScheduleEntry>> {
        let sql = format!(
            "SELECT {WEEKLY_COLUMNS} FROM weekly_schedule {filter} ORDER BY staff_id, day_of_week"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params, Self::parse_weekly)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn query_overrides(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<DateOverrideEntry>> {
        let sql = format!(
            "SELECT {OVERRIDE_COLUMNS} FROM date_overrides {filter} ORDER BY staff_id, date"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params, Self::parse_override)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

impl ScheduleRepository for SqliteScheduleRepository<'_> {
    fn list_weekly(&self) -> Result<Vec<WeeklyScheduleEntry>> {
        self.query_weekly("", params![])
    }

    fn weekly_for_day(&self, day_of_week: u8) -> Result<Vec<WeeklyScheduleEntry>> {
        self.query_weekly("WHERE day_of_week = ?", params![day_of_week])
    }

    fn upsert_weekly(&self, entry: &WeeklyScheduleEntry) -> Result<()> {
        // Re-run the constructor so hand-built entries obey the hours rule too.
        let entry = WeeklyScheduleEntry::new(
            entry.staff_id,
            entry.day_of_week,
            entry.scheduled_in,
            entry.scheduled_out,
            entry.day_off,
            entry.open_schedule,
        );
        self.conn.execute(
            "INSERT INTO weekly_schedule
                (staff_id, day_of_week, scheduled_in, scheduled_out, day_off, open_schedule)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(staff_id, day_of_week) DO UPDATE SET
                scheduled_in = excluded.scheduled_in,
                scheduled_out = excluded.scheduled_out,
                day_off = excluded.day_off,
                open_schedule = excluded.open_schedule",
            params![
                entry.staff_id.get(),
                entry.day_of_week,
                time_to_sql(entry.scheduled_in),
                time_to_sql(entry.scheduled_out),
                i32::from(entry.day_off),
                i32::from(entry.open_schedule),
            ],
        )?;
        Ok(())
    }

    fn delete_weekly(&self, staff_id: StaffId, day_of_week: u8) -> Result<()> {
        self.conn.execute(
            "DELETE FROM weekly_schedule WHERE staff_id = ? AND day_of_week = ?",
            params![staff_id.get(), day_of_week],
        )?;
        Ok(())
    }

    fn list_overrides(&self) -> Result<Vec<DateOverrideEntry>> {
        self.query_overrides("", params![])
    }

    fn overrides_for_date(&self, date: NaiveDate) -> Result<Vec<DateOverrideEntry>> {
        self.query_overrides("WHERE date = ?", params![date_to_sql(date)])
    }

    fn upsert_override(&self, entry: &DateOverrideEntry) -> Result<()> {
        let entry = DateOverrideEntry::new(
            entry.staff_id,
            entry.date,
            entry.scheduled_in,
            entry.scheduled_out,
            entry.day_off,
            entry.open_schedule,
            entry.reason_id,
        );
        self.conn.execute(
            "INSERT INTO date_overrides
                (staff_id, date, scheduled_in, scheduled_out, day_off, open_schedule, reason_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(staff_id, date) DO UPDATE SET
                scheduled_in = excluded.scheduled_in,
                scheduled_out = excluded.scheduled_out,
                day_off = excluded.day_off,
                open_schedule = excluded.open_schedule,
                reason_id = excluded.reason_id",
            params![
                entry.staff_id.get(),
                date_to_sql(entry.date),
                time_to_sql(entry.scheduled_in),
                time_to_sql(entry.scheduled_out),
                i32::from(entry.day_off),
                i32::from(entry.open_schedule),
                entry.reason_id,
            ],
        )?;
        Ok(())
    }

    fn delete_override(&self, staff_id: StaffId, date: NaiveDate) -> Result<()> {
        self.conn.execute(
            "DELETE FROM date_overrides WHERE staff_id = ? AND date = ?",
            params![staff_id.get(), date_to_sql(date)],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::NaiveTime;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn at(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn test_weekly_upsert_replaces_existing_day() {
        let db = setup();
        let repo = SqliteScheduleRepository::new(db.connection());
        let staff = StaffId::new(1);

        repo.upsert_weekly(&WeeklyScheduleEntry::new(staff, 0, at(9, 0), at(17, 0), false, false))
            .unwrap();
        repo.upsert_weekly(&WeeklyScheduleEntry::new(staff, 0, at(8, 0), at(16, 0), false, false))
            .unwrap();
        repo.upsert_weekly(&WeeklyScheduleEntry::new(staff, 1, at(9, 0), at(17, 0), false, false))
            .unwrap();

        let monday = repo.weekly_for_day(0).unwrap();
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].scheduled_in, at(8, 0));
        assert_eq!(repo.list_weekly().unwrap().len(), 2);
    }

    #[test]
    fn test_day_off_is_stored_without_hours() {
        let db = setup();
        let repo = SqliteScheduleRepository::new(db.connection());

        // Bypass the constructor the way a careless caller would
        let entry = WeeklyScheduleEntry {
            staff_id: StaffId::new(1),
            day_of_week: 4,
            scheduled_in: at(9, 0),
            scheduled_out: at(17, 0),
            day_off: true,
            open_schedule: false,
        };
        repo.upsert_weekly(&entry).unwrap();

        let override_entry = DateOverrideEntry {
            staff_id: StaffId::new(1),
            date: date(6),
            scheduled_in: at(10, 0),
            scheduled_out: at(12, 0),
            day_off: true,
            open_schedule: false,
            reason_id: Some(1),
        };
        repo.upsert_override(&override_entry).unwrap();

        let (stored_in, stored_out): (Option<String>, Option<String>) = db
            .connection()
            .query_row(
                "SELECT scheduled_in, scheduled_out FROM weekly_schedule WHERE staff_id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!((stored_in, stored_out), (None, None));

        let stored = repo.overrides_for_date(date(6)).unwrap();
        assert_eq!(stored[0].scheduled_in, None);
        assert_eq!(stored[0].scheduled_out, None);
        assert_eq!(stored[0].reason_id, Some(1));
    }

    #[test]
    fn test_overrides_filter_by_date_and_delete() {
        let db = setup();
        let repo = SqliteScheduleRepository::new(db.connection());
        let staff = StaffId::new(5);

        repo.upsert_override(&DateOverrideEntry::new(
            staff,
            date(6),
            at(10, 0),
            at(14, 0),
            false,
            false,
            None,
        ))
        .unwrap();
        repo.upsert_override(&DateOverrideEntry::new(
            staff,
            date(7),
            None,
            None,
            false,
            true,
            Some(4),
        ))
        .unwrap();

        assert_eq!(repo.overrides_for_date(date(6)).unwrap().len(), 1);
        repo.delete_override(staff, date(6)).unwrap();
        assert!(repo.overrides_for_date(date(6)).unwrap().is_empty());

        let remaining = repo.list_overrides().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key(), (staff, date(7)));
        assert!(remaining[0].open_schedule);
    }

    #[test]
    fn test_delete_weekly() {
        let db = setup();
        let repo = SqliteScheduleRepository::new(db.connection());
        let staff = StaffId::new(2);

        repo.upsert_weekly(&WeeklyScheduleEntry::new(staff, 6, None, None, true, false))
            .unwrap();
        repo.delete_weekly(staff, 6).unwrap();
        assert!(repo.list_weekly().unwrap().is_empty());
    }
}

//! Staff repository implementation

use crate::error::Result;
use crate::models::{StaffId, StaffRecord};
use rusqlite::{params, Connection};

/// Trait for staff storage operations
pub trait StaffRepository {
    /// List all staff, ordered by id
    fn list(&self) -> Result<Vec<StaffRecord>>;

    /// Get a staff member by id
    fn get(&self, id: StaffId) -> Result<Option<StaffRecord>>;

    /// Insert a staff member or replace the names of an existing one
    fn upsert(&self, staff: &StaffRecord) -> Result<()>;

    /// Remove a staff member. Attendance rows are kept.
    fn delete(&self, id: StaffId) -> Result<()>;
}

/// `SQLite` implementation of `StaffRepository`
pub struct SqliteStaffRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStaffRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_staff(row: &rusqlite::Row<'_>) -> rusqlite::Result<StaffRecord> {
        Ok(StaffRecord {
            staff_id: StaffId::new(row.get(0)?),
            first_name: row.get(1)?,
            last_name: row.get(2)?,
        })
    }
}

impl StaffRepository for SqliteStaffRepository<'_> {
    fn list(&self) -> Result<Vec<StaffRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT staff_id, first_name, last_name FROM staff ORDER BY staff_id")?;

        let staff = stmt
            .query_map([], Self::parse_staff)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(staff)
    }

    fn get(&self, id: StaffId) -> Result<Option<StaffRecord>> {
        let result = self.conn.query_row(
            "SELECT staff_id, first_name, last_name FROM staff WHERE staff_id = ?",
            params![id.get()],
            Self::parse_staff,
        );

        match result {
            Ok(staff) => Ok(Some(staff)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&self, staff: &StaffRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO staff (staff_id, first_name, last_name) VALUES (?, ?, ?)
             ON CONFLICT(staff_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name",
            params![staff.staff_id.get(), staff.first_name, staff.last_name],
        )?;
        Ok(())
    }

    fn delete(&self, id: StaffId) -> Result<()> {
        self.conn
            .execute("DELETE FROM staff WHERE staff_id = ?", params![id.get()])?;
        Ok(())
    }
}

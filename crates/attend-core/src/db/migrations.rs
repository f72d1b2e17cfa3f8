//! Database migrations

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .optional()?
        .flatten();

    Ok(version.unwrap_or(0))
}

/// Migration to version 1: staff, schedules, overrides and attendance
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS staff (
            staff_id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS weekly_schedule (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            staff_id INTEGER NOT NULL,
            day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            scheduled_in TEXT,
            scheduled_out TEXT,
            day_off INTEGER NOT NULL DEFAULT 0,
            open_schedule INTEGER NOT NULL DEFAULT 0,
            UNIQUE (staff_id, day_of_week),
            CHECK ((day_off = 0 AND open_schedule = 0)
                OR (scheduled_in IS NULL AND scheduled_out IS NULL))
        );

        CREATE TABLE IF NOT EXISTS date_overrides (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            staff_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            scheduled_in TEXT,
            scheduled_out TEXT,
            day_off INTEGER NOT NULL DEFAULT 0,
            open_schedule INTEGER NOT NULL DEFAULT 0,
            reason_id INTEGER,
            UNIQUE (staff_id, date),
            CHECK ((day_off = 0 AND open_schedule = 0)
                OR (scheduled_in IS NULL AND scheduled_out IS NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_date_overrides_date ON date_overrides(date);

        CREATE TABLE IF NOT EXISTS attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            staff_id INTEGER NOT NULL,
            work_date TEXT NOT NULL,
            work_in TEXT,
            work_off TEXT,
            hours_worked REAL,
            UNIQUE (staff_id, work_date)
        );
        CREATE INDEX IF NOT EXISTS idx_attendance_work_date ON attendance(work_date);",
    )?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        params![CURRENT_VERSION],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

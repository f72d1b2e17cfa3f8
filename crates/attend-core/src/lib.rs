//! attend-core - Core library for Attend
//!
//! This crate contains the time-and-data synchronization core of the
//! attendance kiosk: the clock source, the connectivity probe, the remote
//! data reconciler, the sync orchestrator and the local attendance ledger.
//! Any shell (headless CLI, desktop table) drives it through
//! [`orchestrator::KioskHandle`].

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod reconcile;
pub mod remote;
pub mod services;
pub mod util;

pub use error::{ClockStateError, Error, Result, SyncError};
pub use models::{AttendanceEvent, DateOverrideEntry, StaffId, StaffRecord, WeeklyScheduleEntry};

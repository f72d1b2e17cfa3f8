//! Remote-to-local reconciliation of staff, weekly schedules and date overrides.
//!
//! Each category is one pass: fetch the full remote collection, diff it
//! against the local rows by natural key, then upsert and delete inside a
//! single ledger transaction. Passes are independent; a failure in one never
//! undoes another that already committed.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::connectivity::ConnectivityProbe;
use crate::db::{
    ScheduleRepository, SqliteScheduleRepository, SqliteStaffRepository, StaffRepository,
};
use crate::error::{Result, SyncError};
use crate::models::{DateOverrideEntry, StaffId, StaffRecord, WeeklyScheduleEntry};
use crate::remote::{RemoteDirectory, RemoteResult};
use crate::services::Ledger;

/// What one pass changed locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Outcome of all three passes.
#[derive(Debug)]
pub struct SyncReport {
    pub staff: std::result::Result<ReconcileReport, SyncError>,
    pub weekly_schedule: std::result::Result<ReconcileReport, SyncError>,
    pub date_overrides: std::result::Result<ReconcileReport, SyncError>,
}

impl SyncReport {
    pub const fn succeeded(&self) -> bool {
        self.staff.is_ok() && self.weekly_schedule.is_ok() && self.date_overrides.is_ok()
    }
}

/// A locally cached collection mirrored from the remote API.
trait Category {
    const NAME: &'static str;
    type Record: PartialEq + Send + 'static;
    type Key: Copy + Ord + Hash + Debug + Send + 'static;

    fn key(record: &Self::Record) -> Self::Key;

    /// Bring a remote record into the shape it will have once stored.
    fn normalize(record: Self::Record) -> Self::Record {
        record
    }

    fn load(conn: &Connection) -> Result<Vec<Self::Record>>;
    fn upsert(conn: &Connection, record: &Self::Record) -> Result<()>;
    fn delete(conn: &Connection, key: Self::Key) -> Result<()>;
}

struct Staff;
struct WeeklySchedule;
struct DateOverrides;

impl Category for Staff {
    const NAME: &'static str = "staff";
    type Record = StaffRecord;
    type Key = StaffId;

    fn key(record: &StaffRecord) -> StaffId {
        record.staff_id
    }

    fn load(conn: &Connection) -> Result<Vec<StaffRecord>> {
        SqliteStaffRepository::new(conn).list()
    }

    fn upsert(conn: &Connection, record: &StaffRecord) -> Result<()> {
        SqliteStaffRepository::new(conn).upsert(record)
    }

    fn delete(conn: &Connection, key: StaffId) -> Result<()> {
        SqliteStaffRepository::new(conn).delete(key)
    }
}

impl Category for WeeklySchedule {
    const NAME: &'static str = "weekly schedule";
    type Record = WeeklyScheduleEntry;
    type Key = (StaffId, u8);

    fn key(record: &WeeklyScheduleEntry) -> (StaffId, u8) {
        record.key()
    }

    fn normalize(record: WeeklyScheduleEntry) -> WeeklyScheduleEntry {
        WeeklyScheduleEntry::new(
            record.staff_id,
            record.day_of_week,
            record.scheduled_in,
            record.scheduled_out,
            record.day_off,
            record.open_schedule,
        )
    }

    fn load(conn: &Connection) -> Result<Vec<WeeklyScheduleEntry>> {
        SqliteScheduleRepository::new(conn).list_weekly()
    }

    fn upsert(conn: &Connection, record: &WeeklyScheduleEntry) -> Result<()> {
        SqliteScheduleRepository::new(conn).upsert_weekly(record)
    }

    fn delete(conn: &Connection, (staff_id, day): (StaffId, u8)) -> Result<()> {
        SqliteScheduleRepository::new(conn).delete_weekly(staff_id, day)
    }
}

impl Category for DateOverrides {
    const NAME: &'static str = "date overrides";
    type Record = DateOverrideEntry;
    type Key = (StaffId, NaiveDate);

    fn key(record: &DateOverrideEntry) -> (StaffId, NaiveDate) {
        record.key()
    }

    fn normalize(record: DateOverrideEntry) -> DateOverrideEntry {
        DateOverrideEntry::new(
            record.staff_id,
            record.date,
            record.scheduled_in,
            record.scheduled_out,
            record.day_off,
            record.open_schedule,
            record.reason_id,
        )
    }

    fn load(conn: &Connection) -> Result<Vec<DateOverrideEntry>> {
        SqliteScheduleRepository::new(conn).list_overrides()
    }

    fn upsert(conn: &Connection, record: &DateOverrideEntry) -> Result<()> {
        SqliteScheduleRepository::new(conn).upsert_override(record)
    }

    fn delete(conn: &Connection, (staff_id, date): (StaffId, NaiveDate)) -> Result<()> {
        SqliteScheduleRepository::new(conn).delete_override(staff_id, date)
    }
}

/// Key the remote collection; a repeated key keeps its last record.
fn index_remote<C: Category>(remote: Vec<C::Record>) -> BTreeMap<C::Key, C::Record> {
    let mut indexed = BTreeMap::new();
    for record in remote {
        let record = C::normalize(record);
        let key = C::key(&record);
        if indexed.insert(key, record).is_some() {
            tracing::warn!("Remote {} repeats key {key:?}; keeping the last record", C::NAME);
        }
    }
    indexed
}

/// Diff and apply one category on an open transaction.
fn apply<C: Category>(
    conn: &Connection,
    remote: BTreeMap<C::Key, C::Record>,
) -> Result<ReconcileReport> {
    let mut local: HashMap<C::Key, C::Record> = C::load(conn)?
        .into_iter()
        .map(|record| (C::key(&record), record))
        .collect();
    let mut report = ReconcileReport::default();

    for (key, record) in &remote {
        match local.remove(key) {
            Some(existing) if existing == *record => report.unchanged += 1,
            Some(_) => {
                C::upsert(conn, record)?;
                report.updated += 1;
            }
            None => {
                C::upsert(conn, record)?;
                report.inserted += 1;
            }
        }
    }

    // Whatever is left locally no longer exists remotely.
    let mut stale: Vec<_> = local.into_keys().collect();
    stale.sort_unstable();
    for key in stale {
        C::delete(conn, key)?;
        report.deleted += 1;
    }

    Ok(report)
}

/// Runs reconciliation passes against the ledger.
#[derive(Clone)]
pub struct Reconciler {
    probe: Arc<dyn ConnectivityProbe>,
    directory: Arc<dyn RemoteDirectory>,
    ledger: Ledger,
}

impl Reconciler {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        directory: Arc<dyn RemoteDirectory>,
        ledger: Ledger,
    ) -> Self {
        Self {
            probe,
            directory,
            ledger,
        }
    }

    async fn run<C, F>(&self, fetch: F) -> std::result::Result<ReconcileReport, SyncError>
    where
        C: Category,
        F: Future<Output = RemoteResult<Vec<C::Record>>>,
    {
        if !self.probe.is_reachable().await {
            return Err(SyncError::ConnectivityUnavailable);
        }

        let remote = fetch.await.map_err(|err| SyncError::RemoteFetchFailure {
            category: C::NAME,
            reason: err.to_string(),
        })?;
        let remote = index_remote::<C>(remote);

        self.ledger
            .transaction(|conn| apply::<C>(conn, remote))
            .await
            .map_err(|source| SyncError::StorageIntegrityFailure {
                category: C::NAME,
                source,
            })
    }

    pub async fn reconcile_staff(&self) -> std::result::Result<ReconcileReport, SyncError> {
        self.run::<Staff, _>(self.directory.fetch_staff()).await
    }

    pub async fn reconcile_weekly_schedule(
        &self,
    ) -> std::result::Result<ReconcileReport, SyncError> {
        self.run::<WeeklySchedule, _>(self.directory.fetch_weekly_schedule())
            .await
    }

    pub async fn reconcile_date_overrides(
        &self,
    ) -> std::result::Result<ReconcileReport, SyncError> {
        self.run::<DateOverrides, _>(self.directory.fetch_date_overrides())
            .await
    }

    pub async fn sync_staff(&self) -> bool {
        settle(Staff::NAME, &self.reconcile_staff().await)
    }

    pub async fn sync_weekly_schedule(&self) -> bool {
        settle(WeeklySchedule::NAME, &self.reconcile_weekly_schedule().await)
    }

    pub async fn sync_date_overrides(&self) -> bool {
        settle(DateOverrides::NAME, &self.reconcile_date_overrides().await)
    }

    /// Run every pass, in order, even after one fails.
    pub async fn reconcile_all(&self) -> SyncReport {
        let staff = self.reconcile_staff().await;
        settle(Staff::NAME, &staff);
        let weekly_schedule = self.reconcile_weekly_schedule().await;
        settle(WeeklySchedule::NAME, &weekly_schedule);
        let date_overrides = self.reconcile_date_overrides().await;
        settle(DateOverrides::NAME, &date_overrides);

        SyncReport {
            staff,
            weekly_schedule,
            date_overrides,
        }
    }

    /// True only when all three passes committed.
    pub async fn sync_all(&self) -> bool {
        self.reconcile_all().await.succeeded()
    }
}

/// Log a pass outcome at the level it deserves and reduce it to a flag.
fn settle(category: &str, outcome: &std::result::Result<ReconcileReport, SyncError>) -> bool {
    match outcome {
        Ok(report) => {
            tracing::info!(
                "Synced {category}: {} inserted, {} updated, {} deleted, {} unchanged",
                report.inserted,
                report.updated,
                report.deleted,
                report.unchanged
            );
            true
        }
        Err(err) if err.is_routine() => {
            tracing::info!("Skipping {category} sync: {err}");
            false
        }
        Err(err @ SyncError::StorageIntegrityFailure { .. }) => {
            tracing::error!("{err}");
            false
        }
        Err(err) => {
            tracing::warn!("{err}");
            false
        }
    }
}

//! Shell-facing handle to the running orchestrator.

use chrono::{DateTime, NaiveTime};
use chrono_tz::Tz;
use tokio::sync::{broadcast, mpsc, watch};

use super::{KioskEvent, KioskStatus};
use crate::error::{Error, Result};
use crate::models::{AttendanceEvent, RosterEntry, StaffId};
use crate::services::Ledger;

#[derive(Debug)]
pub(super) enum Command {
    RequestSync,
    Shutdown,
}

/// Cheap to clone; every clone talks to the same event loop.
#[derive(Clone)]
pub struct KioskHandle {
    pub(super) commands: mpsc::Sender<Command>,
    pub(super) events: broadcast::Sender<KioskEvent>,
    pub(super) time: watch::Receiver<Option<DateTime<Tz>>>,
    pub(super) status: watch::Receiver<KioskStatus>,
    pub(super) ledger: Ledger,
}

impl KioskHandle {
    pub fn current_time(&self) -> Option<DateTime<Tz>> {
        *self.time.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> KioskStatus {
        self.status.borrow().clone()
    }

    /// Ask for an immediate time sync followed by a data pass. Returns
    /// `false` once the loop has stopped.
    pub async fn request_sync(&self) -> bool {
        self.commands.send(Command::RequestSync).await.is_ok()
    }

    pub async fn shutdown(&self) {
        // A closed channel means the loop is already gone.
        let _ = self.commands.send(Command::Shutdown).await;
    }

    pub async fn record_clock_in(&self, staff_id: StaffId) -> Result<AttendanceEvent> {
        let now = self.now()?;
        self.ledger.clock_in(staff_id, now.naive_local()).await
    }

    pub async fn record_clock_off(
        &self,
        staff_id: StaffId,
        work_in_time: Option<NaiveTime>,
    ) -> Result<AttendanceEvent> {
        let now = self.now()?;
        self.ledger
            .clock_off(staff_id, work_in_time, now.naive_local())
            .await
    }

    /// The kiosk table for the clock's current date.
    pub async fn roster_today(&self) -> Result<Vec<RosterEntry>> {
        let now = self.now()?;
        self.ledger.roster_for(now.date_naive()).await
    }

    fn now(&self) -> Result<DateTime<Tz>> {
        self.current_time()
            .ok_or_else(|| Error::InvalidInput("the kiosk clock is not running yet".to_string()))
    }
}

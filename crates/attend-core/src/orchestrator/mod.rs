//! Sync orchestration for the kiosk.
//!
//! One event loop owns the clock and the sync state. It drives the one-second
//! clock tick, the periodic sync timer, the connectivity poll and one-shot
//! retry timers, and hands blocking network work to background tasks that
//! report back over a channel. Shells talk to it only through a
//! [`KioskHandle`].

mod handle;
mod scheduler;

pub use handle::KioskHandle;
pub use scheduler::Orchestrator;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::clock::{ClockSource, ClockStatus, NtpResolver};
use crate::connectivity::ConnectivityProbe;
use crate::reconcile::Reconciler;
use crate::services::Ledger;

/// Timer and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub sync_interval: Duration,
    pub retry_interval: Duration,
    pub max_retries: u32,
    pub connectivity_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(120),
            retry_interval: Duration::from_secs(60),
            max_retries: 5,
            connectivity_interval: Duration::from_secs(30),
        }
    }
}

/// Where the orchestrator stands in the sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Syncing,
    Retrying,
    FallenBack,
}

/// Bookkeeping for time synchronization.
///
/// `retry_count` only counts failed time syncs and only a successful one
/// resets it. Data failures never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub last_attempt: Option<DateTime<Tz>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub sync_interval: Duration,
    pub last_known_connectivity: bool,
}

impl SyncState {
    fn new(settings: &SyncSettings) -> Self {
        Self {
            last_attempt: None,
            retry_count: 0,
            max_retries: settings.max_retries,
            retry_interval: settings.retry_interval,
            sync_interval: settings.sync_interval,
            last_known_connectivity: false,
        }
    }
}

/// Notifications published by the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskEvent {
    /// The clock advanced by its regular one-second tick.
    TimeTicked(DateTime<Tz>),
    /// The clock was replaced by a resync or seed.
    TimeChanged(DateTime<Tz>),
    /// A sync cycle finished; `true` when time and data both succeeded.
    SyncCompleted(bool),
    DateRolledOver(NaiveDate),
    ConnectivityChanged(bool),
}

/// Point-in-time view of the orchestrator for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KioskStatus {
    pub clock: ClockStatus,
    pub current_time: Option<DateTime<Tz>>,
    pub phase: SyncPhase,
    pub sync: SyncState,
    pub last_sync_result: Option<bool>,
}

/// Everything the orchestrator drives.
pub struct KioskServices {
    pub clock: ClockSource,
    pub resolver: NtpResolver,
    pub reconciler: Reconciler,
    pub probe: Arc<dyn ConnectivityProbe>,
    pub ledger: Ledger,
}

/// Build the orchestrator, run its startup sequence and spawn its loop.
pub async fn spawn(
    services: KioskServices,
    settings: SyncSettings,
) -> (KioskHandle, tokio::task::JoinHandle<()>) {
    let (mut orchestrator, handle) = Orchestrator::new(services, settings);
    orchestrator.start().await;
    let task = tokio::spawn(orchestrator.run());
    (handle, task)
}

//! The orchestrator event loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use super::handle::{Command, KioskHandle};
use super::{KioskEvent, KioskServices, KioskStatus, SyncPhase, SyncSettings, SyncState};
use crate::clock::{ClockSource, NtpResolver};
use crate::connectivity::ConnectivityProbe;
use crate::error::SyncError;
use crate::reconcile::Reconciler;

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 16;
const TICK: std::time::Duration = std::time::Duration::from_secs(1);

/// Results reported by background tasks. Workers never touch loop state.
#[derive(Debug)]
pub(super) enum WorkerMessage {
    TimeResolved {
        outcome: Result<DateTime<Utc>, SyncError>,
        manual: bool,
    },
    DataSynced {
        success: bool,
        time_synced: bool,
    },
    Connectivity(bool),
}

pub struct Orchestrator {
    clock: ClockSource,
    resolver: NtpResolver,
    reconciler: Reconciler,
    probe: Arc<dyn ConnectivityProbe>,
    settings: SyncSettings,
    state: SyncState,
    phase: SyncPhase,
    last_sync_result: Option<bool>,
    sync_in_flight: bool,
    probe_in_flight: bool,
    retry_at: Option<Instant>,
    /// A retry came due while a sync was still running.
    retry_pending: bool,
    events: broadcast::Sender<KioskEvent>,
    time_tx: watch::Sender<Option<DateTime<Tz>>>,
    status_tx: watch::Sender<KioskStatus>,
    worker_tx: mpsc::UnboundedSender<WorkerMessage>,
    worker_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    commands: mpsc::Receiver<Command>,
}

impl Orchestrator {
    pub fn new(services: KioskServices, settings: SyncSettings) -> (Self, KioskHandle) {
        let KioskServices {
            clock,
            resolver,
            reconciler,
            probe,
            ledger,
        } = services;

        let state = SyncState::new(&settings);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (time_tx, time_rx) = watch::channel(clock.current_time());
        let (status_tx, status_rx) = watch::channel(KioskStatus {
            clock: clock.status(),
            current_time: clock.current_time(),
            phase: SyncPhase::Idle,
            sync: state.clone(),
            last_sync_result: None,
        });
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);

        let handle = KioskHandle {
            commands: command_tx,
            events: events.clone(),
            time: time_rx,
            status: status_rx,
            ledger,
        };

        let orchestrator = Self {
            clock,
            resolver,
            reconciler,
            probe,
            settings,
            state,
            phase: SyncPhase::Idle,
            last_sync_result: None,
            sync_in_flight: false,
            probe_in_flight: false,
            retry_at: None,
            retry_pending: false,
            events,
            time_tx,
            status_tx,
            worker_tx,
            worker_rx,
            commands,
        };
        (orchestrator, handle)
    }

    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub const fn state(&self) -> &SyncState {
        &self.state
    }

    pub const fn clock(&self) -> &ClockSource {
        &self.clock
    }

    /// Seed the clock from the host, learn the initial connectivity and
    /// launch the first sync attempt.
    pub async fn start(&mut self) {
        let now = self.clock.seed_from_system();
        self.publish_time(now, true);

        self.state.last_known_connectivity = self.probe.is_reachable().await;
        tracing::info!(
            "Kiosk clock started at {} (network {})",
            now.format("%Y-%m-%d %H:%M:%S %Z"),
            if self.state.last_known_connectivity {
                "reachable"
            } else {
                "unreachable"
            }
        );

        self.attempt_sync(false);
    }

    /// Drive timers, worker results and commands until shutdown.
    pub async fn run(mut self) {
        let start = Instant::now();
        let mut clock_tick = interval_at(start + TICK, TICK);
        let mut sync_tick = interval_at(
            start + self.settings.sync_interval,
            self.settings.sync_interval,
        );
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut connectivity_tick = interval_at(
            start + self.settings.connectivity_interval,
            self.settings.connectivity_interval,
        );
        connectivity_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let retry_at = self.retry_at;
            let retry = async move {
                match retry_at {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = clock_tick.tick() => self.on_clock_tick(),
                _ = sync_tick.tick() => self.attempt_sync(false),
                _ = connectivity_tick.tick() => self.poll_connectivity(),
                () = retry => self.on_retry_due(),
                Some(message) = self.worker_rx.recv() => self.handle_worker(message),
                command = self.commands.recv() => match command {
                    Some(Command::RequestSync) => self.attempt_sync(true),
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        tracing::info!("Kiosk loop stopped");
    }

    fn on_clock_tick(&mut self) {
        let previous = self.clock.current_time();
        let Some(now) = self.clock.tick() else {
            return;
        };

        if let Some(previous) = previous {
            if previous.date_naive() != now.date_naive() {
                tracing::info!("Date rolled over to {}", now.date_naive());
                self.emit(KioskEvent::DateRolledOver(now.date_naive()));
            }
        }
        self.publish_time(now, false);
    }

    /// Start a time sync unless one is already running. A manual attempt is
    /// followed by a data pass even when the time sync fails.
    pub fn attempt_sync(&mut self, manual: bool) {
        if self.sync_in_flight {
            tracing::debug!("Sync already in flight, skipping");
            return;
        }

        self.sync_in_flight = true;
        self.retry_at = None;
        self.retry_pending = false;
        self.state.last_attempt = self.clock.current_time();
        self.set_phase(SyncPhase::Syncing);

        let resolver = self.resolver.clone();
        let tx = self.worker_tx.clone();
        tokio::spawn(async move {
            let outcome = resolver.resolve().await;
            // The receiver only goes away when the loop has stopped.
            let _ = tx.send(WorkerMessage::TimeResolved { outcome, manual });
        });
    }

    /// A retry deadline passed. While a sync is still running the retry is
    /// held until that sync finishes.
    fn on_retry_due(&mut self) {
        self.retry_at = None;
        if self.sync_in_flight {
            tracing::debug!("Retry due while a sync is in flight, deferring");
            self.retry_pending = true;
            return;
        }
        self.attempt_sync(false);
    }

    fn spawn_data_pass(&self, time_synced: bool) {
        let reconciler = self.reconciler.clone();
        let tx = self.worker_tx.clone();
        tokio::spawn(async move {
            let success = reconciler.sync_all().await;
            let _ = tx.send(WorkerMessage::DataSynced {
                success,
                time_synced,
            });
        });
    }

    fn poll_connectivity(&mut self) {
        if self.probe_in_flight {
            return;
        }
        self.probe_in_flight = true;

        let probe = Arc::clone(&self.probe);
        let tx = self.worker_tx.clone();
        tokio::spawn(async move {
            let reachable = probe.is_reachable().await;
            let _ = tx.send(WorkerMessage::Connectivity(reachable));
        });
    }

    pub(super) fn handle_worker(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::TimeResolved { outcome, manual } => self.on_time_resolved(outcome, manual),
            WorkerMessage::DataSynced {
                success,
                time_synced,
            } => self.on_data_synced(success, time_synced),
            WorkerMessage::Connectivity(reachable) => {
                self.probe_in_flight = false;
                if self.note_connectivity(reachable) {
                    tracing::info!("Network is back, syncing");
                    self.attempt_sync(false);
                }
            }
        }
    }

    fn on_time_resolved(&mut self, outcome: Result<DateTime<Utc>, SyncError>, manual: bool) {
        match outcome {
            Ok(time) => {
                self.note_connectivity(true);
                self.state.retry_count = 0;
                let now = self.clock.adopt_ntp(time);
                self.publish_time(now, true);
                tracing::info!(
                    "Clock synced to {}, syncing data",
                    now.format("%Y-%m-%d %H:%M:%S")
                );
                self.spawn_data_pass(true);
            }
            Err(err) => {
                if matches!(err, SyncError::ConnectivityUnavailable) {
                    self.note_connectivity(false);
                    tracing::info!("Time sync skipped: {err}");
                } else {
                    tracing::warn!("Time sync failed: {err}");
                }

                // A manual attempt reports its completion after the data pass.
                self.schedule_retry(!manual);
                if manual {
                    self.spawn_data_pass(false);
                } else {
                    self.sync_in_flight = false;
                }
            }
        }
        self.publish_status();
    }

    fn on_data_synced(&mut self, success: bool, time_synced: bool) {
        self.sync_in_flight = false;
        let overall = success && time_synced;
        self.last_sync_result = Some(overall);

        if self.phase == SyncPhase::Syncing {
            self.set_phase(SyncPhase::Idle);
        }
        if !success {
            // Data failures are reported, never retried.
            tracing::warn!("Data sync finished with failures");
        }
        self.emit(KioskEvent::SyncCompleted(overall));
        self.publish_status();

        if std::mem::take(&mut self.retry_pending) {
            self.attempt_sync(false);
        }
    }

    /// Arm a one-shot retry, or fall back to the host clock once retries
    /// are exhausted. `report_completion` is false when a data pass follows
    /// and will report the cycle itself.
    pub fn schedule_retry(&mut self, report_completion: bool) {
        if self.state.retry_count < self.settings.max_retries {
            self.state.retry_count += 1;
            self.retry_at = Some(Instant::now() + self.settings.retry_interval);
            self.set_phase(SyncPhase::Retrying);
            tracing::info!(
                "Retrying time sync in {}s (attempt {}/{})",
                self.settings.retry_interval.as_secs(),
                self.state.retry_count,
                self.settings.max_retries
            );
            return;
        }

        tracing::warn!(
            "Time sync failed {} times, falling back to system time",
            self.state.retry_count
        );
        self.retry_at = None;
        self.clock.fallback_to_system();
        if let Some(now) = self.clock.current_time() {
            self.publish_time(now, true);
        }
        self.last_sync_result = Some(false);
        self.set_phase(SyncPhase::FallenBack);
        if report_completion {
            self.emit(KioskEvent::SyncCompleted(false));
        }
    }

    /// Record a connectivity observation; `true` on an unreachable to
    /// reachable edge.
    fn note_connectivity(&mut self, reachable: bool) -> bool {
        let previous = self.state.last_known_connectivity;
        if previous == reachable {
            return false;
        }

        self.state.last_known_connectivity = reachable;
        self.emit(KioskEvent::ConnectivityChanged(reachable));
        self.publish_status();
        reachable
    }

    fn set_phase(&mut self, phase: SyncPhase) {
        self.phase = phase;
        self.publish_status();
    }

    fn publish_time(&self, now: DateTime<Tz>, changed: bool) {
        self.time_tx.send_replace(Some(now));
        self.emit(if changed {
            KioskEvent::TimeChanged(now)
        } else {
            KioskEvent::TimeTicked(now)
        });
        if changed {
            self.publish_status();
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(KioskStatus {
            clock: self.clock.status(),
            current_time: self.clock.current_time(),
            phase: self.phase,
            sync: self.state.clone(),
            last_sync_result: self.last_sync_result,
        });
    }

    fn emit(&self, event: KioskEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Handle exactly one worker message (tests drive the loop by hand).
    #[cfg(test)]
    pub(super) async fn pump(&mut self) {
        let message = self
            .worker_rx
            .recv()
            .await
            .expect("worker channel closed");
        self.handle_worker(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::{FixedClock, ScriptedNtp};
    use crate::clock::{ClockMode, ClockStatus};
    use crate::connectivity::testing::SwitchProbe;
    use crate::db::{SqliteStaffRepository, StaffRepository};
    use crate::models::{StaffId, StaffRecord};
    use crate::orchestrator::spawn;
    use crate::reconcile::testing::StubDirectory;
    use crate::services::Ledger;
    use chrono::{TimeDelta, TimeZone};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Fixture {
        probe: Arc<SwitchProbe>,
        ntp: Arc<ScriptedNtp>,
        host: Arc<FixedClock>,
        directory: Arc<StubDirectory>,
        ledger: Ledger,
    }

    fn host_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 6, 0, 0).unwrap()
    }

    fn ntp_time() -> DateTime<Utc> {
        host_time() + TimeDelta::seconds(90)
    }

    impl Fixture {
        async fn new(online: bool) -> Self {
            let ledger = Ledger::open_in_memory().unwrap();
            ledger
                .transaction(|conn| {
                    SqliteStaffRepository::new(conn).upsert(&StaffRecord::new(1, "Rana", "H"))
                })
                .await
                .unwrap();

            let directory = Arc::new(StubDirectory::default());
            *directory.staff.lock().unwrap() = Some(vec![StaffRecord::new(1, "Rana", "H")]);
            *directory.weekly.lock().unwrap() = Some(Vec::new());
            *directory.overrides.lock().unwrap() = Some(Vec::new());

            Self {
                probe: Arc::new(SwitchProbe::new(online)),
                ntp: Arc::new(ScriptedNtp::default()),
                host: Arc::new(FixedClock::new(host_time())),
                directory,
                ledger,
            }
        }

        fn services(&self) -> KioskServices {
            let clock = ClockSource::new(
                chrono_tz::Asia::Beirut,
                Duration::from_secs(300),
                self.host.clone(),
            );
            let resolver = NtpResolver::new(
                self.probe.clone(),
                self.ntp.clone(),
                vec!["a.ntp".to_string(), "b.ntp".to_string()],
            );
            let reconciler =
                Reconciler::new(self.probe.clone(), self.directory.clone(), self.ledger.clone());
            KioskServices {
                clock,
                resolver,
                reconciler,
                probe: self.probe.clone(),
                ledger: self.ledger.clone(),
            }
        }

        fn orchestrator(&self) -> (Orchestrator, KioskHandle) {
            let (mut orchestrator, handle) =
                Orchestrator::new(self.services(), SyncSettings::default());
            orchestrator.clock.seed_from_system();
            (orchestrator, handle)
        }
    }

    fn settings(sync: u64, retry: u64, connectivity: u64) -> SyncSettings {
        SyncSettings {
            sync_interval: Duration::from_secs(sync),
            retry_interval: Duration::from_secs(retry),
            max_retries: 5,
            connectivity_interval: Duration::from_secs(connectivity),
        }
    }

    /// Poll the status snapshot until `done` holds, in paused time.
    async fn wait_for_status(handle: &KioskHandle, done: impl Fn(&KioskStatus) -> bool) {
        tokio::time::timeout(Duration::from_secs(500), async {
            while !done(&handle.status()) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn next_completion(events: &mut broadcast::Receiver<KioskEvent>) -> bool {
        tokio::time::timeout(Duration::from_secs(500), async {
            loop {
                if let Ok(KioskEvent::SyncCompleted(result)) = events.recv().await {
                    return result;
                }
            }
        })
        .await
        .unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<KioskEvent>) -> Vec<KioskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn successful_sync_adopts_ntp_and_runs_data_pass() {
        let fixture = Fixture::new(true).await;
        fixture.ntp.answer("a.ntp", ntp_time());
        let (mut orchestrator, handle) = fixture.orchestrator();
        let mut events = handle.subscribe();

        orchestrator.attempt_sync(false);
        assert_eq!(orchestrator.phase(), SyncPhase::Syncing);
        orchestrator.pump().await; // time
        orchestrator.pump().await; // data

        assert_eq!(orchestrator.phase(), SyncPhase::Idle);
        assert_eq!(orchestrator.state().retry_count, 0);
        assert_eq!(
            orchestrator.clock().status(),
            ClockStatus::Running(ClockMode::NtpSynced)
        );
        assert_eq!(
            handle.current_time().unwrap().with_timezone(&Utc),
            ntp_time()
        );

        let events = drain(&mut events);
        assert!(events.contains(&KioskEvent::SyncCompleted(true)));
        assert!(events
            .iter()
            .any(|event| matches!(event, KioskEvent::TimeChanged(_))));
        assert_eq!(handle.status().last_sync_result, Some(true));
    }

    #[tokio::test]
    async fn retries_five_times_then_falls_back() {
        let fixture = Fixture::new(true).await;
        let (mut orchestrator, handle) = fixture.orchestrator();
        let mut events = handle.subscribe();
        fixture.host.set(host_time() + TimeDelta::seconds(30));

        for expected in 1..=5 {
            orchestrator.attempt_sync(false);
            orchestrator.pump().await;
            assert_eq!(orchestrator.state().retry_count, expected);
            assert_eq!(orchestrator.phase(), SyncPhase::Retrying);
            assert!(orchestrator.retry_at.is_some());
        }
        assert!(drain(&mut events)
            .iter()
            .all(|event| !matches!(event, KioskEvent::SyncCompleted(_))));

        // Sixth consecutive failure: no retry, fall back instead
        orchestrator.attempt_sync(false);
        orchestrator.pump().await;
        assert_eq!(orchestrator.phase(), SyncPhase::FallenBack);
        assert!(orchestrator.retry_at.is_none());
        assert_eq!(
            orchestrator.clock().status(),
            ClockStatus::Running(ClockMode::SystemFallback)
        );
        assert!(drain(&mut events).contains(&KioskEvent::SyncCompleted(false)));

        // A later success resets the counter
        fixture.ntp.answer("b.ntp", ntp_time());
        orchestrator.attempt_sync(false);
        orchestrator.pump().await;
        orchestrator.pump().await;
        assert_eq!(orchestrator.state().retry_count, 0);
        assert_eq!(orchestrator.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn manual_sync_after_exhausted_retries_completes_once() {
        let fixture = Fixture::new(true).await;
        let (mut orchestrator, handle) = fixture.orchestrator();
        let mut events = handle.subscribe();
        orchestrator.state.retry_count = 5;

        orchestrator.attempt_sync(true);
        orchestrator.pump().await; // time fails, falls back
        orchestrator.pump().await; // data pass reports the cycle

        assert_eq!(orchestrator.phase(), SyncPhase::FallenBack);
        let completions: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|event| matches!(event, KioskEvent::SyncCompleted(_)))
            .collect();
        assert_eq!(completions, vec![KioskEvent::SyncCompleted(false)]);
    }

    #[tokio::test]
    async fn rejected_fallback_still_publishes_the_kept_time() {
        let fixture = Fixture::new(true).await;
        let (mut orchestrator, handle) = fixture.orchestrator();
        let mut events = handle.subscribe();
        let kept = orchestrator.clock().current_time().unwrap();
        fixture.host.set(host_time() + TimeDelta::hours(2));
        orchestrator.state.retry_count = 5;

        orchestrator.attempt_sync(false);
        orchestrator.pump().await;

        assert_eq!(orchestrator.phase(), SyncPhase::FallenBack);
        assert_eq!(
            orchestrator.clock().status(),
            ClockStatus::Running(ClockMode::SystemSeeded)
        );
        let events = drain(&mut events);
        assert!(events.contains(&KioskEvent::TimeChanged(kept)));
        assert!(events.contains(&KioskEvent::SyncCompleted(false)));
    }

    #[tokio::test]
    async fn unreachable_network_schedules_retry_without_ntp_calls() {
        let fixture = Fixture::new(false).await;
        fixture.ntp.answer("a.ntp", ntp_time());
        let (mut orchestrator, _handle) = fixture.orchestrator();

        orchestrator.attempt_sync(false);
        orchestrator.pump().await;

        assert!(fixture.ntp.calls().is_empty());
        assert_eq!(orchestrator.state().retry_count, 1);
        assert_eq!(orchestrator.phase(), SyncPhase::Retrying);
    }

    #[tokio::test]
    async fn only_one_sync_in_flight() {
        let fixture = Fixture::new(true).await;
        fixture.ntp.answer("a.ntp", ntp_time());
        let (mut orchestrator, _handle) = fixture.orchestrator();

        orchestrator.attempt_sync(false);
        orchestrator.attempt_sync(false);
        orchestrator.pump().await;
        orchestrator.pump().await;

        assert_eq!(fixture.ntp.calls(), vec!["a.ntp"]);
        assert!(!orchestrator.sync_in_flight);
    }

    #[tokio::test]
    async fn manual_sync_runs_data_pass_after_time_failure() {
        let fixture = Fixture::new(true).await;
        *fixture.directory.staff.lock().unwrap() = Some(Vec::new());
        let (mut orchestrator, handle) = fixture.orchestrator();
        let mut events = handle.subscribe();

        orchestrator.attempt_sync(true);
        orchestrator.pump().await; // time fails, retry armed
        orchestrator.pump().await; // data still runs

        assert!(fixture.ledger.list_staff().await.unwrap().is_empty());
        assert_eq!(orchestrator.phase(), SyncPhase::Retrying);
        assert!(drain(&mut events).contains(&KioskEvent::SyncCompleted(false)));
    }

    #[tokio::test]
    async fn data_failure_is_reported_not_retried() {
        let fixture = Fixture::new(true).await;
        fixture.ntp.answer("a.ntp", ntp_time());
        *fixture.directory.staff.lock().unwrap() = None;
        let (mut orchestrator, handle) = fixture.orchestrator();
        let mut events = handle.subscribe();

        orchestrator.attempt_sync(false);
        orchestrator.pump().await;
        orchestrator.pump().await;

        assert!(drain(&mut events).contains(&KioskEvent::SyncCompleted(false)));
        assert_eq!(orchestrator.state().retry_count, 0);
        assert!(orchestrator.retry_at.is_none());
        assert_eq!(orchestrator.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn connectivity_edge_triggers_sync_only_when_coming_back() {
        let fixture = Fixture::new(false).await;
        fixture.ntp.answer("a.ntp", ntp_time());
        let (mut orchestrator, handle) = fixture.orchestrator();
        let mut events = handle.subscribe();

        // Still down: no edge
        orchestrator.handle_worker(WorkerMessage::Connectivity(false));
        assert!(!orchestrator.sync_in_flight);

        fixture.probe.set(true);
        orchestrator.handle_worker(WorkerMessage::Connectivity(true));
        assert!(orchestrator.sync_in_flight);
        assert!(orchestrator.state().last_known_connectivity);
        assert!(drain(&mut events).contains(&KioskEvent::ConnectivityChanged(true)));

        orchestrator.pump().await;
        orchestrator.pump().await;

        // Going down is an edge too, but it does not start a sync
        orchestrator.handle_worker(WorkerMessage::Connectivity(false));
        assert!(!orchestrator.sync_in_flight);
        assert!(drain(&mut events).contains(&KioskEvent::ConnectivityChanged(false)));
    }

    #[tokio::test]
    async fn clock_tick_emits_rollover_at_midnight() {
        let fixture = Fixture::new(false).await;
        // 23:59:59 in Beirut (UTC+3 in May)
        fixture
            .host
            .set(Utc.with_ymd_and_hms(2024, 5, 6, 20, 59, 59).unwrap());
        let (mut orchestrator, handle) = fixture.orchestrator();
        let mut events = handle.subscribe();

        orchestrator.on_clock_tick();

        let events = drain(&mut events);
        let rolled = chrono::NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        assert!(events.contains(&KioskEvent::DateRolledOver(rolled)));
        assert!(matches!(events.last(), Some(KioskEvent::TimeTicked(_))));
        assert_eq!(handle.current_time().unwrap().date_naive(), rolled);
    }

    #[tokio::test(start_paused = true)]
    async fn event_loop_runs_startup_sync_and_serves_clock_actions() {
        let fixture = Fixture::new(true).await;
        fixture.ntp.answer("a.ntp", ntp_time());

        let (handle, task) = spawn(fixture.services(), SyncSettings::default()).await;
        let mut events = handle.subscribe();

        let completed = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Ok(KioskEvent::SyncCompleted(result)) = events.recv().await {
                    return result;
                }
            }
        })
        .await
        .unwrap();
        assert!(completed);

        let event = handle.record_clock_in(StaffId::new(1)).await.unwrap();
        assert!(event.is_open());
        let work_in = event.work_in;
        let closed = handle
            .record_clock_off(StaffId::new(1), work_in)
            .await
            .unwrap();
        assert!(closed.is_complete());
        assert_eq!(handle.roster_today().await.unwrap().len(), 1);

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn event_loop_retries_on_its_own_until_fallback() {
        let fixture = Fixture::new(true).await;
        let started = Instant::now();

        let (handle, task) = spawn(fixture.services(), settings(1000, 10, 1000)).await;
        wait_for_status(&handle, |status| status.phase == SyncPhase::FallenBack).await;

        // Startup attempt plus five retries ten seconds apart
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(50));
        assert!(elapsed < Duration::from_secs(60));
        assert_eq!(fixture.ntp.calls().len(), 12);
        assert_eq!(handle.status().sync.retry_count, 5);

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retry_due_during_a_data_pass_runs_after_it() {
        let fixture = Fixture::new(true).await;
        *fixture.directory.staff_delay.lock().unwrap() = Some(Duration::from_secs(30));

        let (handle, task) = spawn(fixture.services(), settings(1000, 10, 1000)).await;
        wait_for_status(&handle, |status| {
            status.phase == SyncPhase::Retrying && status.sync.retry_count == 1
        })
        .await;

        // The manual data pass outlives the next retry deadline
        assert!(handle.request_sync().await);
        wait_for_status(&handle, |status| status.phase == SyncPhase::FallenBack).await;

        assert_eq!(handle.status().sync.retry_count, 5);
        assert_eq!(fixture.ntp.calls().len(), 12);

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn connectivity_poll_starts_a_sync_when_the_network_returns() {
        let fixture = Fixture::new(false).await;
        fixture.ntp.answer("a.ntp", ntp_time());
        let started = Instant::now();

        let (handle, task) = spawn(fixture.services(), settings(1000, 1000, 30)).await;
        let mut events = handle.subscribe();
        wait_for_status(&handle, |status| status.sync.retry_count == 1).await;
        assert!(fixture.ntp.calls().is_empty());

        fixture.probe.set(true);
        assert!(next_completion(&mut events).await);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(fixture.ntp.calls(), vec!["a.ntp"]);
        assert!(handle.status().sync.last_known_connectivity);

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_tick_starts_a_new_sync() {
        let fixture = Fixture::new(true).await;
        let started = Instant::now();

        let (handle, task) = spawn(fixture.services(), settings(60, 1000, 1000)).await;
        let mut events = handle.subscribe();
        wait_for_status(&handle, |status| status.sync.retry_count == 1).await;

        fixture.ntp.answer("a.ntp", ntp_time());
        assert!(next_completion(&mut events).await);
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(handle.status().sync.retry_count, 0);
        assert_eq!(handle.status().phase, SyncPhase::Idle);

        handle.shutdown().await;
        task.await.unwrap();
    }
}

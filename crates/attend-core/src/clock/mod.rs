//! The kiosk's authoritative clock.
//!
//! [`ClockSource`] keeps one timestamp in the kiosk's fixed zone and advances
//! it once per second. NTP answers replace it outright; the host clock only
//! replaces it when the two agree within the drift threshold.

mod resolver;
mod sntp;

pub use resolver::NtpResolver;
pub use sntp::{NtpError, NtpTransport, SntpClient, NTP_PORT};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Source of host wall-clock time.
pub trait SystemClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostClock;

impl SystemClock for HostClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where the last accepted time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    SystemSeeded,
    NtpSynced,
    SystemFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "mode")]
pub enum ClockStatus {
    Uninitialized,
    Running(ClockMode),
}

/// Result of [`ClockSource::fallback_to_system`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Host time was adopted; `drift` is host minus the previous time.
    Adopted { drift: TimeDelta },
    /// Host time disagreed by more than the threshold and was ignored.
    Rejected { drift: TimeDelta },
}

pub struct ClockSource {
    tz: Tz,
    drift_threshold: TimeDelta,
    system: Arc<dyn SystemClock>,
    current: Option<DateTime<Tz>>,
    mode: Option<ClockMode>,
}

impl ClockSource {
    pub fn new(tz: Tz, drift_threshold: Duration, system: Arc<dyn SystemClock>) -> Self {
        Self {
            tz,
            drift_threshold: TimeDelta::from_std(drift_threshold).unwrap_or(TimeDelta::MAX),
            system,
            current: None,
            mode: None,
        }
    }

    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    pub const fn current_time(&self) -> Option<DateTime<Tz>> {
        self.current
    }

    pub const fn status(&self) -> ClockStatus {
        match self.mode {
            Some(mode) => ClockStatus::Running(mode),
            None => ClockStatus::Uninitialized,
        }
    }

    /// Advance by exactly one second. Does nothing before the clock is seeded.
    pub fn tick(&mut self) -> Option<DateTime<Tz>> {
        let current = self.current?;
        let next = current
            .checked_add_signed(TimeDelta::seconds(1))
            .unwrap_or(current);
        self.current = Some(next);
        Some(next)
    }

    /// Take the host clock as the starting time.
    pub fn seed_from_system(&mut self) -> DateTime<Tz> {
        let now = self.system.now().with_timezone(&self.tz);
        self.current = Some(now);
        self.mode = Some(ClockMode::SystemSeeded);
        now
    }

    /// Adopt a server-confirmed time, whatever its distance from the current one.
    pub fn adopt_ntp(&mut self, time: DateTime<Utc>) -> DateTime<Tz> {
        let local = time.with_timezone(&self.tz);
        if let Some(previous) = self.current {
            let delta = local.signed_duration_since(previous);
            tracing::debug!("NTP time adopted, moved by {}s", delta.num_seconds());
        }
        self.current = Some(local);
        self.mode = Some(ClockMode::NtpSynced);
        local
    }

    /// Query NTP and adopt the first answer. `None` leaves the clock untouched.
    pub async fn sync_with_ntp(&mut self, resolver: &NtpResolver) -> Option<DateTime<Tz>> {
        match resolver.resolve().await {
            Ok(time) => Some(self.adopt_ntp(time)),
            Err(err) if err.is_routine() => {
                tracing::debug!("Skipping NTP sync: {err}");
                None
            }
            Err(err) => {
                tracing::warn!("{err}");
                None
            }
        }
    }

    /// Adopt the host clock only if it is within the drift threshold of the
    /// current time. An unseeded clock always adopts it.
    pub fn fallback_to_system(&mut self) -> FallbackOutcome {
        let system = self.system.now().with_timezone(&self.tz);
        let Some(current) = self.current else {
            self.current = Some(system);
            self.mode = Some(ClockMode::SystemFallback);
            return FallbackOutcome::Adopted {
                drift: TimeDelta::zero(),
            };
        };

        let drift = system.signed_duration_since(current);
        let magnitude = if drift < TimeDelta::zero() { -drift } else { drift };

        if magnitude <= self.drift_threshold {
            self.current = Some(system);
            self.mode = Some(ClockMode::SystemFallback);
            tracing::info!("Fell back to system time (drift {}s)", drift.num_seconds());
            FallbackOutcome::Adopted { drift }
        } else {
            tracing::warn!(
                "System time differs by {}s, more than the {}s threshold; keeping {}",
                drift.num_seconds(),
                self.drift_threshold.num_seconds(),
                current.format("%Y-%m-%d %H:%M:%S")
            );
            FallbackOutcome::Rejected { drift }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    pub use super::resolver::testing::ScriptedNtp;

    /// A host clock the test moves by hand.
    pub struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self(Mutex::new(now))
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl SystemClock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }
}

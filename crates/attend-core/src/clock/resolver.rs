//! Walks the NTP candidate list in priority order.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::NtpTransport;
use crate::connectivity::ConnectivityProbe;
use crate::error::SyncError;

#[derive(Clone)]
pub struct NtpResolver {
    probe: Arc<dyn ConnectivityProbe>,
    transport: Arc<dyn NtpTransport>,
    servers: Vec<String>,
}

impl NtpResolver {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        transport: Arc<dyn NtpTransport>,
        servers: Vec<String>,
    ) -> Self {
        Self {
            probe,
            transport,
            servers,
        }
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// First server to answer wins; the rest are not contacted.
    ///
    /// Without connectivity no server is contacted at all.
    pub async fn resolve(&self) -> Result<DateTime<Utc>, SyncError> {
        if !self.probe.is_reachable().await {
            return Err(SyncError::ConnectivityUnavailable);
        }

        for server in &self.servers {
            match self.transport.query(server).await {
                Ok(time) => {
                    tracing::info!("Time synced from {server}");
                    return Ok(time);
                }
                Err(err) => {
                    let failure = SyncError::NtpServerFailure {
                        server: server.clone(),
                        reason: err.to_string(),
                    };
                    tracing::warn!("{failure}");
                }
            }
        }

        Err(SyncError::NtpExhausted {
            attempted: self.servers.len(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedNtp;
    use super::*;
    use crate::clock::testing::FixedClock;
    use crate::clock::{ClockMode, ClockSource, ClockStatus};
    use crate::connectivity::testing::SwitchProbe;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn servers() -> Vec<String> {
        ["a.ntp", "b.ntp", "c.ntp"].map(String::from).to_vec()
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn first_answering_server_wins() {
        let ntp = Arc::new(ScriptedNtp::default());
        ntp.answer("b.ntp", noon());
        ntp.answer("c.ntp", noon() + chrono::TimeDelta::hours(1));
        let resolver = NtpResolver::new(Arc::new(SwitchProbe::new(true)), ntp.clone(), servers());

        assert_eq!(resolver.resolve().await.unwrap(), noon());
        assert_eq!(ntp.calls(), vec!["a.ntp", "b.ntp"]);
    }

    #[tokio::test]
    async fn unreachable_contacts_no_server() {
        let ntp = Arc::new(ScriptedNtp::default());
        ntp.answer("a.ntp", noon());
        let resolver = NtpResolver::new(Arc::new(SwitchProbe::new(false)), ntp.clone(), servers());

        assert!(matches!(
            resolver.resolve().await,
            Err(SyncError::ConnectivityUnavailable)
        ));
        assert!(ntp.calls().is_empty());
    }

    #[tokio::test]
    async fn every_server_failing_is_exhaustion() {
        let ntp = Arc::new(ScriptedNtp::default());
        let resolver = NtpResolver::new(Arc::new(SwitchProbe::new(true)), ntp.clone(), servers());

        assert!(matches!(
            resolver.resolve().await,
            Err(SyncError::NtpExhausted { attempted: 3 })
        ));
        assert_eq!(ntp.calls().len(), 3);
    }

    #[tokio::test]
    async fn clock_source_adopts_resolved_time() {
        let ntp = Arc::new(ScriptedNtp::default());
        ntp.answer("a.ntp", noon());
        let resolver = NtpResolver::new(Arc::new(SwitchProbe::new(true)), ntp, servers());

        let host = Arc::new(FixedClock::new(noon() - chrono::TimeDelta::hours(3)));
        let mut clock = ClockSource::new(chrono_tz::Asia::Beirut, Duration::from_secs(300), host);
        clock.seed_from_system();

        let adopted = clock.sync_with_ntp(&resolver).await.unwrap();
        assert_eq!(adopted.with_timezone(&Utc), noon());
        assert_eq!(clock.status(), ClockStatus::Running(ClockMode::NtpSynced));
    }

    #[tokio::test]
    async fn failed_sync_leaves_clock_untouched() {
        let resolver = NtpResolver::new(
            Arc::new(SwitchProbe::new(false)),
            Arc::new(ScriptedNtp::default()),
            servers(),
        );
        let host = Arc::new(FixedClock::new(noon()));
        let mut clock = ClockSource::new(chrono_tz::Asia::Beirut, Duration::from_secs(300), host);
        let seeded = clock.seed_from_system();

        assert_eq!(clock.sync_with_ntp(&resolver).await, None);
        assert_eq!(clock.current_time(), Some(seeded));
        assert_eq!(clock.status(), ClockStatus::Running(ClockMode::SystemSeeded));
    }
}

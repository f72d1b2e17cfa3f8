use std::path::{Path, PathBuf};
use std::sync::Arc;

use attend_core::clock::{ClockSource, HostClock, NtpResolver, SntpClient};
use attend_core::config::KioskConfig;
use attend_core::connectivity::{ConnectivityProbe, DnsProbe};
use attend_core::models::{Punctuality, RosterEntry};
use attend_core::orchestrator::KioskServices;
use attend_core::reconcile::Reconciler;
use attend_core::remote::HttpDirectory;
use attend_core::services::Ledger;
use attend_core::util::{display_time_of_day, DATE_FORMAT};
use attend_core::StaffId;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::CliError;

/// Load the configuration, letting `--db-path` win over file and environment.
pub fn load_config(path: Option<&Path>, db_path: Option<PathBuf>) -> Result<KioskConfig, CliError> {
    let mut config = KioskConfig::load(path)?;
    if let Some(db_path) = db_path {
        config.db_path = Some(db_path);
    }
    Ok(config)
}

pub async fn open_ledger(config: &KioskConfig) -> Result<Ledger, CliError> {
    Ok(Ledger::open_path(config.resolved_db_path()).await?)
}

pub fn build_probe(config: &KioskConfig) -> Result<Arc<dyn ConnectivityProbe>, CliError> {
    Ok(Arc::new(DnsProbe::new(
        config.probe_addrs()?,
        config.probe_fallback_host.clone(),
        config.probe_timeout(),
    )))
}

pub fn build_resolver(
    config: &KioskConfig,
    probe: Arc<dyn ConnectivityProbe>,
) -> NtpResolver {
    NtpResolver::new(
        probe,
        Arc::new(SntpClient::new(config.ntp_timeout())),
        config.ntp_servers.clone(),
    )
}

pub fn build_clock(config: &KioskConfig) -> Result<ClockSource, CliError> {
    Ok(ClockSource::new(
        config.tz()?,
        config.drift_threshold(),
        Arc::new(HostClock),
    ))
}

/// Wire every collaborator of the orchestrator from the configuration.
pub fn build_services(config: &KioskConfig, ledger: Ledger) -> Result<KioskServices, CliError> {
    let probe = build_probe(config)?;
    let directory = HttpDirectory::new(config.remote_endpoints(), config.http_timeout())?;
    Ok(KioskServices {
        clock: build_clock(config)?,
        resolver: build_resolver(config, Arc::clone(&probe)),
        reconciler: Reconciler::new(Arc::clone(&probe), Arc::new(directory), ledger.clone()),
        probe,
        ledger,
    })
}

/// Kiosk time for a one-shot command: NTP when reachable, else the host clock.
pub async fn resolve_now(config: &KioskConfig) -> Result<DateTime<Tz>, CliError> {
    let probe = build_probe(config)?;
    let resolver = build_resolver(config, probe);
    let mut clock = build_clock(config)?;
    let seeded = clock.seed_from_system();
    Ok(clock.sync_with_ntp(&resolver).await.unwrap_or(seeded))
}

pub fn parse_staff_id(raw: &str) -> Result<StaffId, CliError> {
    raw.parse()
        .map_err(|_| CliError::InvalidStaffId(raw.trim().to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| CliError::InvalidDate(raw.trim().to_string()))
}

/// One kiosk table row, flattened for display and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterRow {
    pub staff_id: StaffId,
    pub name: String,
    pub schedule: String,
    pub work_in: Option<String>,
    pub work_off: Option<String>,
    pub hours_worked: Option<f64>,
    pub arrival: Option<Punctuality>,
    pub departure: Option<Punctuality>,
}

pub fn roster_row(entry: &RosterEntry) -> RosterRow {
    let schedule = if entry.day_off {
        "Day off".to_string()
    } else if entry.open_schedule {
        "Open schedule".to_string()
    } else {
        match (entry.scheduled_in, entry.scheduled_out) {
            (Some(start), Some(end)) => {
                format!("{} - {}", display_time_of_day(start), display_time_of_day(end))
            }
            (Some(start), None) => format!("from {}", display_time_of_day(start)),
            (None, Some(end)) => format!("until {}", display_time_of_day(end)),
            (None, None) => "-".to_string(),
        }
    };
    let attendance = entry.attendance.as_ref();

    RosterRow {
        staff_id: entry.staff.staff_id,
        name: entry.staff.display_name(),
        schedule,
        work_in: attendance
            .and_then(|a| a.work_in)
            .map(display_time_of_day),
        work_off: attendance
            .and_then(|a| a.work_off)
            .map(display_time_of_day),
        hours_worked: attendance.and_then(|a| a.hours_worked),
        arrival: entry.arrival(),
        departure: entry.departure(),
    }
}

fn punctuality_suffix(value: Option<Punctuality>) -> &'static str {
    match value {
        Some(Punctuality::Late) => " (late)",
        Some(Punctuality::Early) => " (early)",
        Some(Punctuality::OnTime) | None => "",
    }
}

pub fn format_roster_lines(rows: &[RosterRow]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            let work_in = row.work_in.as_deref().unwrap_or("-");
            let work_off = row.work_off.as_deref().unwrap_or("-");
            let hours = row
                .hours_worked
                .map_or_else(|| "-".to_string(), |hours| format!("{hours:.2}"));
            format!(
                "{:>5}  {:<16} {:<22} in {}{}  off {}{}  hours {}",
                row.staff_id,
                row.name,
                row.schedule,
                work_in,
                punctuality_suffix(row.arrival),
                work_off,
                punctuality_suffix(row.departure),
                hours
            )
        })
        .collect()
}

//! Kiosk configuration.
//!
//! A JSON file (by default `<config_dir>/attend/kiosk.json`) supplies every
//! tunable of the sync core. Missing fields take their defaults and
//! `ATTEND_*` environment variables override the file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::connectivity::{DEFAULT_FALLBACK_HOST, DEFAULT_PROBE_ENDPOINTS};
use crate::error::{Error, Result};
use crate::orchestrator::SyncSettings;
use crate::remote::RemoteEndpoints;
use crate::util::{is_http_url, normalize_text_option};

const CONFIG_FILE_NAME: &str = "kiosk.json";
const DB_FILE_NAME: &str = "attendance.db";
const APP_DIR: &str = "attend";

/// Longest accepted timer interval (one day).
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_TIMEZONE: &str = "Asia/Beirut";

pub const DEFAULT_NTP_SERVERS: [&str; 4] = [
    "time.google.com",
    "pool.ntp.org",
    "time.nist.gov",
    "time.cloudflare.com",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KioskConfig {
    /// IANA zone the kiosk displays and records times in.
    pub timezone: String,
    /// NTP candidates in priority order.
    pub ntp_servers: Vec<String>,
    pub ntp_timeout_secs: u64,
    /// Largest host-clock disagreement a fallback may adopt.
    pub drift_threshold_secs: u64,
    pub sync_interval_secs: u64,
    pub retry_interval_secs: u64,
    pub max_retries: u32,
    pub connectivity_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub probe_endpoints: Vec<String>,
    pub probe_fallback_host: Option<String>,
    pub http_timeout_secs: u64,
    pub staff_url: String,
    pub weekly_schedule_url: String,
    pub date_overrides_url: String,
    pub db_path: Option<PathBuf>,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            ntp_servers: DEFAULT_NTP_SERVERS.map(String::from).to_vec(),
            ntp_timeout_secs: 5,
            drift_threshold_secs: 300,
            sync_interval_secs: 120,
            retry_interval_secs: 60,
            max_retries: 5,
            connectivity_interval_secs: 30,
            probe_timeout_secs: 2,
            probe_endpoints: DEFAULT_PROBE_ENDPOINTS.map(String::from).to_vec(),
            probe_fallback_host: Some(DEFAULT_FALLBACK_HOST.to_string()),
            http_timeout_secs: 10,
            staff_url: "http://localhost:8080/sync_staff.php".to_string(),
            weekly_schedule_url: "http://localhost:8080/sync_schedules.php".to_string(),
            date_overrides_url: "http://localhost:8080/sync_temp_schedules.php".to_string(),
            db_path: None,
        }
    }
}

/// `<config_dir>/attend/kiosk.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
}

fn default_db_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from(DB_FILE_NAME),
        |dir| dir.join(APP_DIR).join(DB_FILE_NAME),
    )
}

impl KioskConfig {
    /// Load from `path`, or the default location when `None`, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut config = match path {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("Failed to read config at {}: {error}", path.display()))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("Failed to parse config at {}: {error}", path.display()))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Apply `ATTEND_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| normalize_text_option(lookup(key));

        if let Some(value) = text("ATTEND_TIMEZONE") {
            self.timezone = value;
        }
        if let Some(value) = text("ATTEND_NTP_SERVERS") {
            self.ntp_servers = split_list(&value);
        }
        if let Some(value) = text("ATTEND_STAFF_URL") {
            self.staff_url = value;
        }
        if let Some(value) = text("ATTEND_WEEKLY_SCHEDULE_URL") {
            self.weekly_schedule_url = value;
        }
        if let Some(value) = text("ATTEND_DATE_OVERRIDES_URL") {
            self.date_overrides_url = value;
        }
        if let Some(value) = text("ATTEND_DB_PATH") {
            self.db_path = Some(PathBuf::from(value));
        }

        override_number(&text, "ATTEND_SYNC_INTERVAL_SECS", &mut self.sync_interval_secs)?;
        override_number(&text, "ATTEND_RETRY_INTERVAL_SECS", &mut self.retry_interval_secs)?;
        override_number(&text, "ATTEND_MAX_RETRIES", &mut self.max_retries)?;
        override_number(&text, "ATTEND_DRIFT_THRESHOLD_SECS", &mut self.drift_threshold_secs)?;
        override_number(&text, "ATTEND_NTP_TIMEOUT_SECS", &mut self.ntp_timeout_secs)?;
        override_number(&text, "ATTEND_HTTP_TIMEOUT_SECS", &mut self.http_timeout_secs)?;

        self.normalize();
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.tz()?;

        if self.ntp_servers.is_empty() {
            return Err(Error::Config("ntp_servers must not be empty".to_string()));
        }

        for (field, value) in [
            ("ntp_timeout_secs", self.ntp_timeout_secs),
            ("sync_interval_secs", self.sync_interval_secs),
            ("retry_interval_secs", self.retry_interval_secs),
            ("connectivity_interval_secs", self.connectivity_interval_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("http_timeout_secs", self.http_timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{field} must be greater than zero")));
            }
        }

        for (field, value) in [
            ("sync_interval_secs", self.sync_interval_secs),
            ("retry_interval_secs", self.retry_interval_secs),
            ("connectivity_interval_secs", self.connectivity_interval_secs),
            ("ntp_timeout_secs", self.ntp_timeout_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("http_timeout_secs", self.http_timeout_secs),
        ] {
            if value > MAX_INTERVAL_SECS {
                return Err(Error::Config(format!(
                    "{field} must be at most {MAX_INTERVAL_SECS}"
                )));
            }
        }

        for (field, url) in [
            ("staff_url", &self.staff_url),
            ("weekly_schedule_url", &self.weekly_schedule_url),
            ("date_overrides_url", &self.date_overrides_url),
        ] {
            if !is_http_url(url) {
                return Err(Error::Config(format!(
                    "{field} must include http:// or https://"
                )));
            }
        }

        self.probe_addrs()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone)
            .map_err(|_| Error::Config(format!("unknown time zone '{}'", self.timezone)))
    }

    pub fn probe_addrs(&self) -> Result<Vec<SocketAddr>> {
        self.probe_endpoints
            .iter()
            .map(|endpoint| {
                endpoint.parse().map_err(|_| {
                    Error::Config(format!("probe endpoint '{endpoint}' is not an ip:port"))
                })
            })
            .collect()
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    pub fn remote_endpoints(&self) -> RemoteEndpoints {
        RemoteEndpoints {
            staff_url: self.staff_url.clone(),
            weekly_schedule_url: self.weekly_schedule_url.clone(),
            date_overrides_url: self.date_overrides_url.clone(),
        }
    }

    pub const fn ntp_timeout(&self) -> Duration {
        Duration::from_secs(self.ntp_timeout_secs)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub const fn drift_threshold(&self) -> Duration {
        Duration::from_secs(self.drift_threshold_secs)
    }

    pub const fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            sync_interval: Duration::from_secs(self.sync_interval_secs),
            retry_interval: Duration::from_secs(self.retry_interval_secs),
            max_retries: self.max_retries,
            connectivity_interval: Duration::from_secs(self.connectivity_interval_secs),
        }
    }

    fn normalize(&mut self) {
        self.timezone = self.timezone.trim().to_string();
        self.ntp_servers = self
            .ntp_servers
            .drain(..)
            .filter_map(|server| normalize_text_option(Some(server)))
            .collect();
        self.probe_endpoints = self
            .probe_endpoints
            .drain(..)
            .filter_map(|endpoint| normalize_text_option(Some(endpoint)))
            .collect();
        self.probe_fallback_host = normalize_text_option(self.probe_fallback_host.take());
        for url in [
            &mut self.staff_url,
            &mut self.weekly_schedule_url,
            &mut self.date_overrides_url,
        ] {
            *url = url.trim().to_string();
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|item| normalize_text_option(Some(item.to_string())))
        .collect()
}

fn override_number<T, F>(text: &F, key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = text(key) {
        *slot = value
            .parse()
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer")))?;
    }
    Ok(())
}

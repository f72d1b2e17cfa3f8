//! The remote schedule/staff API.
//!
//! Every endpoint answers `{status, data, message}`; only `"success"` carries
//! usable records. The API is loose about types (ids and flags arrive as
//! numbers or strings), so the wire layer normalizes before building models.

mod http;
mod wire;

pub use http::{HttpDirectory, RemoteEndpoints};
pub use wire::{Envelope, RemoteDateOverride, RemoteStaff, RemoteWeeklySchedule};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DateOverrideEntry, StaffRecord, WeeklyScheduleEntry};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Full collections from the remote source of truth.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    async fn fetch_staff(&self) -> RemoteResult<Vec<StaffRecord>>;

    async fn fetch_weekly_schedule(&self) -> RemoteResult<Vec<WeeklyScheduleEntry>>;

    async fn fetch_date_overrides(&self) -> RemoteResult<Vec<DateOverrideEntry>>;
}

//! Error types for attend-core

use thiserror::Error;

use crate::models::StaffId;

/// Result type alias using attend-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in attend-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Clock-in/out requested in a state that does not allow it
    #[error(transparent)]
    ClockState(#[from] ClockStateError),
}

/// Rejected clock-in/out actions. These are shown to the operator verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockStateError {
    #[error("Staff {0} has not clocked in")]
    NotClockedIn(StaffId),
    #[error("Staff {0} has already clocked in today")]
    AlreadyClockedIn(StaffId),
    #[error("Staff {0} has already clocked out")]
    AlreadyClockedOut(StaffId),
    #[error("Unknown staff id {0}")]
    UnknownStaff(StaffId),
}

/// Failures inside the synchronization core.
///
/// None of these escape the core as a fault: the reconciler and the
/// orchestrator turn them into booleans and log lines at their boundary.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No network; the sync step is skipped, not failed loudly.
    #[error("Network is unreachable")]
    ConnectivityUnavailable,

    /// A single NTP server did not answer usefully.
    #[error("NTP server {server} failed: {reason}")]
    NtpServerFailure { server: String, reason: String },

    /// Every configured NTP server failed.
    #[error("All {attempted} NTP servers failed")]
    NtpExhausted { attempted: usize },

    /// Transport or payload error while fetching one category.
    #[error("Fetching {category} failed: {reason}")]
    RemoteFetchFailure {
        category: &'static str,
        reason: String,
    },

    /// Storage error while applying one category; the transaction was rolled back.
    #[error("Applying {category} failed and was rolled back: {source}")]
    StorageIntegrityFailure {
        category: &'static str,
        #[source]
        source: Error,
    },
}

impl SyncError {
    /// Whether this failure is routine (logged quietly rather than as an error).
    pub const fn is_routine(&self) -> bool {
        matches!(self, Self::ConnectivityUnavailable)
    }
}

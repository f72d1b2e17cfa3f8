//! Staff model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier assigned to a staff member by the remote roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(i64);

impl StaffId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StaffId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<i64> for StaffId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A staff member as cached from the remote roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub staff_id: StaffId,
    pub first_name: String,
    pub last_name: String,
}

impl StaffRecord {
    #[must_use]
    pub fn new(staff_id: impl Into<StaffId>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            staff_id: staff_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Name as shown on the kiosk table: first name and last initial.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.last_name.chars().next() {
            Some(initial) => format!("{} {initial}.", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

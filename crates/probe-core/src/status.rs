//! Check status and region enums

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a request, assignment or check result.
///
/// Matches the `domain.check_status` database enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "TIMEOUT")]
    Timeout,
}

impl CheckStatus {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Timeout => "TIMEOUT",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Timeout)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "TIMEOUT" => Ok(Self::Timeout),
            other => Err(format!("unknown check status {other:?}")),
        }
    }
}

/// Whether a raw status string counts as terminal for result streaming.
///
/// Older agents reported SUCCESS / CANCELLED; both are accepted alongside
/// the current enum values.
pub fn is_terminal_status(status: &str) -> bool {
    matches!(status, "SUCCESS" | "DONE" | "FAILED" | "TIMEOUT" | "CANCELLED")
}

/// Coarse geographic bucket an agent serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "APAC")]
    Apac,
}

impl Region {
    /// Wire / database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eu => "EU",
            Self::Us => "US",
            Self::Apac => "APAC",
        }
    }

    /// Derive a region from a GeoLite2 continent code. Unknown or empty
    /// codes fall back to EU.
    pub fn from_continent(code: &str) -> Self {
        match code.to_uppercase().as_str() {
            "US" => Self::Us,
            "AS" | "OC" => Self::Apac,
            _ => Self::Eu,
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::Eu
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EU" => Ok(Self::Eu),
            "US" => Ok(Self::Us),
            "APAC" => Ok(Self::Apac),
            other => Err(format!("unknown region {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            CheckStatus::Pending,
            CheckStatus::Running,
            CheckStatus::Done,
            CheckStatus::Failed,
            CheckStatus::Timeout,
        ] {
            assert_eq!(status.as_str().parse::<CheckStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(CheckStatus::Done.is_terminal());
        assert!(CheckStatus::Failed.is_terminal());
        assert!(CheckStatus::Timeout.is_terminal());
        assert!(!CheckStatus::Pending.is_terminal());
        assert!(!CheckStatus::Running.is_terminal());

        assert!(is_terminal_status("SUCCESS"));
        assert!(is_terminal_status("CANCELLED"));
        assert!(!is_terminal_status("PENDING"));
        assert!(!is_terminal_status(""));
    }

    #[test]
    fn test_region_from_continent() {
        assert_eq!(Region::from_continent("US"), Region::Us);
        assert_eq!(Region::from_continent("AS"), Region::Apac);
        assert_eq!(Region::from_continent("OC"), Region::Apac);
        assert_eq!(Region::from_continent("EU"), Region::Eu);
        assert_eq!(Region::from_continent("NA"), Region::Eu);
        assert_eq!(Region::from_continent(""), Region::Eu);
        assert_eq!(Region::from_continent("as"), Region::Apac);
    }

    #[test]
    fn test_status_serde_uses_screaming_case() {
        let json = serde_json::to_string(&CheckStatus::Timeout).unwrap();
        assert_eq!(json, "\"TIMEOUT\"");
        let back: CheckStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(back, CheckStatus::Pending);
    }
}

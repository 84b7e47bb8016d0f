//! Attendance status - the closed set of values a record may carry.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of one student on one session date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    /// Arrived on time
    Present,
    /// Arrived late; counts as attended
    Late,
    /// Did not attend
    Absent,
    /// Left before the session ended; neither attended nor absent in rollups
    EarlyLeave,
}

impl AttendanceStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 4] = [Self::Present, Self::Late, Self::Absent, Self::EarlyLeave];

    /// The value written to the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Absent => "absent",
            Self::EarlyLeave => "early-leave",
        }
    }

    /// Counts toward the attendance rate numerator.
    #[must_use]
    pub const fn is_attended(self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }

    /// Counts as an explicit absence.
    #[must_use]
    pub const fn is_absent(self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Parses a stored value, also accepting the labels written by the earlier
    /// Korean-language deployment.
    pub fn parse_stored(value: &str) -> Result<Self> {
        match value.trim() {
            "present" | "출석" => Ok(Self::Present),
            "late" | "지각" => Ok(Self::Late),
            "absent" | "결석" => Ok(Self::Absent),
            "early-leave" | "early_leave" | "조퇴" => Ok(Self::EarlyLeave),
            other => Err(Error::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_stored(s)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_canonical_values_parse_back() {
        for status in AttendanceStatus::ALL {
            assert_eq!(status.as_str().parse::<AttendanceStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_legacy_labels() {
        assert_eq!(
            AttendanceStatus::parse_stored("출석").unwrap(),
            AttendanceStatus::Present
        );
        assert_eq!(
            AttendanceStatus::parse_stored("지각").unwrap(),
            AttendanceStatus::Late
        );
        assert_eq!(
            AttendanceStatus::parse_stored("결석").unwrap(),
            AttendanceStatus::Absent
        );
        assert_eq!(
            AttendanceStatus::parse_stored("조퇴").unwrap(),
            AttendanceStatus::EarlyLeave
        );
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = AttendanceStatus::parse_stored("excused").unwrap_err();
        assert!(matches!(err, Error::InvalidStatus { value } if value == "excused"));
    }

    #[test]
    fn test_classification() {
        assert!(AttendanceStatus::Present.is_attended());
        assert!(AttendanceStatus::Late.is_attended());
        assert!(!AttendanceStatus::Absent.is_attended());
        assert!(AttendanceStatus::Absent.is_absent());
        assert!(!AttendanceStatus::EarlyLeave.is_attended());
        assert!(!AttendanceStatus::EarlyLeave.is_absent());
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&AttendanceStatus::EarlyLeave).unwrap();
        assert_eq!(json, "\"early-leave\"");
    }
}

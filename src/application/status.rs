use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a tracked application.
///
/// `Interview`, `Offer`, `Rejected` and `Withdrawn` are human decisions and
/// only ever arrive through a status update. `ReminderSent` and `Archived`
/// are produced by the deadline logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Submitted,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
    ReminderSent,
    Archived,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
        ApplicationStatus::ReminderSent,
        ApplicationStatus::Archived,
    ];

    /// Wire name, e.g. `REMINDER_SENT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::Interview => "INTERVIEW",
            ApplicationStatus::Offer => "OFFER",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
            ApplicationStatus::ReminderSent => "REMINDER_SENT",
            ApplicationStatus::Archived => "ARCHIVED",
        }
    }

    /// True for statuses the deadline and archive logic may still move.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted | ApplicationStatus::ReminderSent
        )
    }

    /// True for statuses an `UpdateStatus` signal may set. `ReminderSent` and
    /// `Archived` only come from the timers.
    pub fn is_signalable(&self) -> bool {
        !matches!(
            self,
            ApplicationStatus::ReminderSent | ApplicationStatus::Archived
        )
    }

    /// True for statuses recorded by a human decision.
    pub fn is_decision(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Interview
                | ApplicationStatus::Offer
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown application status: {0:?}")]
pub struct ParseStatusError(pub String);

impl FromStr for ApplicationStatus {
    type Err = ParseStatusError;

    /// Parses the exact wire name. Surrounding whitespace is tolerated, case is not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_every_wire_name() {
        for status in ApplicationStatus::ALL {
            assert_eq!(status.as_str().parse::<ApplicationStatus>(), Ok(status));
        }
    }

    #[test]
    fn parse_rejects_unknown_and_lowercase() {
        assert!("HIRED".parse::<ApplicationStatus>().is_err());
        assert!("offer".parse::<ApplicationStatus>().is_err());
        assert!("".parse::<ApplicationStatus>().is_err());
        assert_eq!(
            " OFFER ".parse::<ApplicationStatus>(),
            Ok(ApplicationStatus::Offer)
        );
    }

    #[test]
    fn open_and_decision_partition() {
        for status in ApplicationStatus::ALL {
            assert!(!(status.is_open() && status.is_decision()), "{status}");
        }
        assert!(ApplicationStatus::ReminderSent.is_open());
        assert!(ApplicationStatus::Withdrawn.is_decision());
        assert!(!ApplicationStatus::Archived.is_open());
        assert!(!ApplicationStatus::Archived.is_decision());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ApplicationStatus::ReminderSent).unwrap();
        assert_eq!(json, r#""REMINDER_SENT""#);
        let parsed: ApplicationStatus = serde_json::from_str(r#""WITHDRAWN""#).unwrap();
        assert_eq!(parsed, ApplicationStatus::Withdrawn);
    }
}

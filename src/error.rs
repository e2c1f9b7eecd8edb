use std::time::Duration;

use thiserror::Error;

use crate::application::{ApplicationStatus, ParseStatusError};

/// Top-level error for callers of the host and the command line.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already started: {0}")]
    AlreadyStarted(String),

    #[error("Instance {instance} failed: {error}")]
    InstanceFailed { instance: String, error: String },

    #[error("Workflow failed: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure of a single activity attempt or of the whole activity once its
/// retry budget is spent.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// Missing or invalid setup, e.g. no credential. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network trouble, rate limiting, server errors, empty results.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The remote side refused the request for a reason retrying cannot fix.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Rate limited with a server-supplied wait before the next attempt.
    #[error("rate limited, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The retry policy ran out of attempts.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ActivityError>,
    },

    /// The shared worker pool has been shut down.
    #[error("activity worker pool closed")]
    PoolClosed,
}

impl ActivityError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActivityError::Transient(_) | ActivityError::Throttled { .. } | ActivityError::TimedOut(_)
        )
    }

    /// Minimum wait the remote side asked for before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ActivityError::Throttled { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Why an incoming status update was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("empty status update")]
    EmptyPayload,

    #[error(transparent)]
    UnknownStatus(#[from] ParseStatusError),

    #[error("status {0} is set by the deadline logic, not by updates")]
    ReservedStatus(ApplicationStatus),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no history for instance {0}")]
    UnknownInstance(String),

    #[error("history already exists for instance {0}")]
    AlreadyExists(String),

    #[error("invalid instance id {0:?}")]
    InvalidId(String),

    #[error("history of {instance} is corrupt at line {line}: {source}")]
    Corrupt {
        instance: String,
        line: usize,
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a state-machine run ends without a summary.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Content generation failed permanently; the instance never waited.
    #[error("content generation failed: {0}")]
    Generation(ActivityError),

    #[error("history store: {0}")]
    Store(#[from] StoreError),

    /// The journal already records a permanent failure.
    #[error("instance previously failed: {0}")]
    PreviouslyFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_by_variant() {
        assert!(ActivityError::Transient("503".into()).is_retryable());
        assert!(ActivityError::TimedOut(Duration::from_secs(1)).is_retryable());
        let throttled = ActivityError::Throttled {
            retry_after: Duration::from_secs(3),
        };
        assert!(throttled.is_retryable());
        assert_eq!(throttled.retry_after(), Some(Duration::from_secs(3)));
        assert!(!ActivityError::Configuration("no key".into()).is_retryable());
        assert!(!ActivityError::Rejected("400".into()).is_retryable());
        let exhausted = ActivityError::Exhausted {
            attempts: 3,
            last: Box::new(ActivityError::Transient("503".into())),
        };
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn exhausted_display_names_last_failure() {
        let err = ActivityError::Exhausted {
            attempts: 3,
            last: Box::new(ActivityError::Transient("empty response".into())),
        };
        assert_eq!(
            err.to_string(),
            "gave up after 3 attempts: transient failure: empty response"
        );
    }

    #[test]
    fn signal_error_wraps_parse_error() {
        let err: SignalError = ParseStatusError("HIRED".into()).into();
        assert_eq!(err.to_string(), r#"unknown application status: "HIRED""#);
    }
}

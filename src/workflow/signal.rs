use serde::{Deserialize, Serialize};

use crate::application::ApplicationStatus;
use crate::error::SignalError;

/// Body of an `UpdateStatus` signal as it arrives from the API layer.
///
/// Some callers wrap the status in a one-element list. Both shapes are
/// accepted at the boundary and reduced to a single status before the state
/// machine sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusPayload {
    Single(String),
    List(Vec<String>),
}

impl StatusPayload {
    /// Takes the first element of a list, rejects empty lists, unknown names
    /// and the statuses only the deadline logic may set.
    pub fn normalize(&self) -> Result<ApplicationStatus, SignalError> {
        let raw = match self {
            StatusPayload::Single(s) => s.as_str(),
            StatusPayload::List(items) => items
                .first()
                .map(String::as_str)
                .ok_or(SignalError::EmptyPayload)?,
        };
        if raw.trim().is_empty() {
            return Err(SignalError::EmptyPayload);
        }
        let status: ApplicationStatus = raw.parse()?;
        if !status.is_signalable() {
            return Err(SignalError::ReservedStatus(status));
        }
        Ok(status)
    }
}

impl From<ApplicationStatus> for StatusPayload {
    fn from(status: ApplicationStatus) -> Self {
        StatusPayload::Single(status.as_str().to_string())
    }
}

impl From<&str> for StatusPayload {
    fn from(s: &str) -> Self {
        StatusPayload::Single(s.to_string())
    }
}

impl From<Vec<String>> for StatusPayload {
    fn from(items: Vec<String>) -> Self {
        StatusPayload::List(items)
    }
}

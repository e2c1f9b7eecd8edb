//! Read-side shapes returned to external callers. Pure functions of
//! [`InstanceState`]; nothing here mutates.

use serde::{Deserialize, Serialize};

use super::state::InstanceState;
use crate::application::ApplicationStatus;

/// Answer to `GetStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: ApplicationStatus,
    pub content_ready: bool,
    pub reminder_sent: bool,
    pub update_count: u64,
}

/// Answer to `GetContent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "content", rename_all = "snake_case")]
pub enum ContentView {
    Available(String),
    NotYetAvailable,
}

impl ContentView {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentView::Available(text) => Some(text),
            ContentView::NotYetAvailable => None,
        }
    }
}

/// Return value of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub application_id: String,
    pub final_status: ApplicationStatus,
    pub content_generated: bool,
    pub update_count: u64,
}

pub fn status_view(state: &InstanceState) -> StatusView {
    StatusView {
        status: state.status,
        content_ready: state.content_ready(),
        reminder_sent: state.reminder_sent,
        update_count: state.update_count,
    }
}

pub fn content_view(state: &InstanceState) -> ContentView {
    match &state.generated_content {
        Some(text) => ContentView::Available(text.clone()),
        None => ContentView::NotYetAvailable,
    }
}

pub fn run_summary(application_id: &str, state: &InstanceState) -> RunSummary {
    RunSummary {
        application_id: application_id.to_string(),
        final_status: state.status,
        content_generated: state.content_ready(),
        update_count: state.update_count,
    }
}

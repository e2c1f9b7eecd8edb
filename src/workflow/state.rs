use std::fmt;

use serde::{Deserialize, Serialize};

use crate::application::ApplicationStatus;

/// Mutable state of one instance. Only the instance's own run loop writes
/// it; everyone else sees published copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    pub status: ApplicationStatus,
    pub generated_content: Option<String>,
    pub reminder_sent: bool,
    pub update_count: u64,
    /// Set by the first human decision and never cleared. Once set, the
    /// timers leave the status alone even if a later update reopens it.
    #[serde(default)]
    pub decision_recorded: bool,
}

impl Default for InstanceState {
    fn default() -> Self {
        Self {
            status: ApplicationStatus::Submitted,
            generated_content: None,
            reminder_sent: false,
            update_count: 0,
            decision_recorded: false,
        }
    }
}

impl InstanceState {
    pub fn content_ready(&self) -> bool {
        self.generated_content.is_some()
    }

    /// Sets the content once. Returns false, leaving the first value, if already set.
    pub fn latch_content(&mut self, text: String) -> bool {
        if self.generated_content.is_some() {
            return false;
        }
        self.generated_content = Some(text);
        true
    }

    /// An accepted external status change. Status and counter move together.
    pub fn apply_update(&mut self, status: ApplicationStatus) {
        self.status = status;
        self.update_count += 1;
        self.decision_recorded |= status.is_decision();
    }

    /// True when the deadline has nothing to show for itself: still
    /// `Submitted` and never decided.
    pub fn reminder_due(&self) -> bool {
        self.status == ApplicationStatus::Submitted && !self.decision_recorded
    }

    /// True while the grace period and archival still apply.
    pub fn undecided(&self) -> bool {
        self.status.is_open() && !self.decision_recorded
    }

    /// Deadline passed with nothing decided. No-op unless [`reminder_due`](Self::reminder_due).
    pub fn mark_reminder_sent(&mut self) -> bool {
        if !self.reminder_due() {
            return false;
        }
        self.status = ApplicationStatus::ReminderSent;
        self.reminder_sent = true;
        true
    }

    /// Grace period over. No-op once a decision was recorded or the status
    /// is no longer open.
    pub fn archive(&mut self) -> bool {
        if !self.undecided() {
            return false;
        }
        self.status = ApplicationStatus::Archived;
        true
    }
}

/// Coarse position in the control-flow sequence, for display and listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Generating,
    AwaitingDeadline,
    SendingReminder,
    GracePeriod,
    Finalizing,
    Finished,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Generating => "GENERATING",
            Phase::AwaitingDeadline => "AWAITING_DEADLINE",
            Phase::SendingReminder => "SENDING_REMINDER",
            Phase::GracePeriod => "GRACE_PERIOD",
            Phase::Finalizing => "FINALIZING",
            Phase::Finished => "FINISHED",
            Phase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Failed)
    }
}

/// What queriers see: the state plus where the instance is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub state: InstanceState,
    pub phase: Phase,
}

impl Default for InstanceSnapshot {
    fn default() -> Self {
        Self {
            state: InstanceState::default(),
            phase: Phase::Generating,
        }
    }
}

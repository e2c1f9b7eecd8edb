//! Append-only journal of an instance and the fold that rebuilds state and
//! control-flow progress from it.
//!
//! The live run loop applies every event through the same [`Replay::apply`]
//! it uses after a restart, so a recovered instance is indistinguishable
//! from one that never stopped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::projection::RunSummary;
use super::state::{InstanceSnapshot, InstanceState, Phase};
use crate::activities::ReminderAck;
use crate::application::{ApplicationRecord, ApplicationStatus};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Deadline,
    Grace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HistoryEvent {
    Started {
        record: ApplicationRecord,
        at: DateTime<Utc>,
    },
    ContentGenerated {
        text: String,
    },
    SignalApplied {
        status: ApplicationStatus,
    },
    /// Kept for audit only; has no effect on state.
    SignalRejected {
        reason: String,
    },
    TimerScheduled {
        timer: TimerKind,
        fire_at: DateTime<Utc>,
    },
    TimerFired {
        timer: TimerKind,
    },
    /// Written before the notifier is called; the status moves to `REMINDER_SENT` here.
    ReminderDispatched,
    ReminderDelivered {
        ack: ReminderAck,
    },
    ReminderFailed {
        error: String,
    },
    /// A pending redelivery was dropped because a decision arrived meanwhile.
    ReminderSuperseded {
        status: ApplicationStatus,
    },
    Archived,
    Completed {
        summary: RunSummary,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerProgress {
    #[default]
    NotScheduled,
    Scheduled(DateTime<Utc>),
    Fired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderProgress {
    #[default]
    NotDispatched,
    /// Dispatched but no outcome recorded: a crash happened mid-delivery.
    Dispatched,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(RunSummary),
    Failed(String),
}

/// State and progress reconstructed from a journal prefix.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    pub record: Option<ApplicationRecord>,
    pub state: InstanceState,
    pub deadline: TimerProgress,
    pub grace: TimerProgress,
    pub reminder: ReminderProgress,
    pub outcome: Option<Outcome>,
    pub events: usize,
}

impl Replay {
    /// Folds a full journal. The first event must be `Started`.
    pub fn from_events(instance: &str, events: &[HistoryEvent]) -> Result<Self, StoreError> {
        match events.first() {
            Some(HistoryEvent::Started { .. }) => {}
            _ => return Err(StoreError::UnknownInstance(instance.to_string())),
        }
        let mut replay = Replay::default();
        for event in events {
            replay.apply(event);
        }
        Ok(replay)
    }

    pub fn apply(&mut self, event: &HistoryEvent) {
        self.events += 1;
        match event {
            HistoryEvent::Started { record, .. } => {
                self.record = Some(record.clone());
            }
            HistoryEvent::ContentGenerated { text } => {
                self.state.latch_content(text.clone());
            }
            HistoryEvent::SignalApplied { status } => {
                self.state.apply_update(*status);
            }
            HistoryEvent::SignalRejected { .. } => {}
            HistoryEvent::TimerScheduled { timer, fire_at } => {
                *self.timer_mut(*timer) = TimerProgress::Scheduled(*fire_at);
            }
            HistoryEvent::TimerFired { timer } => {
                *self.timer_mut(*timer) = TimerProgress::Fired;
            }
            HistoryEvent::ReminderDispatched => {
                self.state.mark_reminder_sent();
                self.reminder = ReminderProgress::Dispatched;
            }
            HistoryEvent::ReminderDelivered { .. }
            | HistoryEvent::ReminderFailed { .. }
            | HistoryEvent::ReminderSuperseded { .. } => {
                self.reminder = ReminderProgress::Settled;
            }
            HistoryEvent::Archived => {
                self.state.archive();
            }
            HistoryEvent::Completed { summary } => {
                self.outcome = Some(Outcome::Completed(summary.clone()));
            }
            HistoryEvent::Failed { error } => {
                self.outcome = Some(Outcome::Failed(error.clone()));
            }
        }
    }

    pub fn timer(&self, kind: TimerKind) -> TimerProgress {
        match kind {
            TimerKind::Deadline => self.deadline,
            TimerKind::Grace => self.grace,
        }
    }

    fn timer_mut(&mut self, kind: TimerKind) -> &mut TimerProgress {
        match kind {
            TimerKind::Deadline => &mut self.deadline,
            TimerKind::Grace => &mut self.grace,
        }
    }

    pub fn phase(&self) -> Phase {
        match &self.outcome {
            Some(Outcome::Completed(_)) => return Phase::Finished,
            Some(Outcome::Failed(_)) => return Phase::Failed,
            None => {}
        }
        if !self.state.content_ready() {
            return Phase::Generating;
        }
        if self.reminder == ReminderProgress::Dispatched {
            return Phase::SendingReminder;
        }
        match (self.deadline, self.grace) {
            (TimerProgress::Fired, TimerProgress::Scheduled(_)) => Phase::GracePeriod,
            (TimerProgress::Fired, _) => Phase::Finalizing,
            _ => Phase::AwaitingDeadline,
        }
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            state: self.state.clone(),
            phase: self.phase(),
        }
    }
}

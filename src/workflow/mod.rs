//! The per-application state machine and everything it owns: state, signal
//! normalization, journal events, recovery, and read projections.

mod history;
mod machine;
mod projection;
mod signal;
mod state;

pub use history::{HistoryEvent, Outcome, ReminderProgress, Replay, TimerKind, TimerProgress};
pub use machine::ApplicationWorkflow;
pub use projection::{ContentView, RunSummary, StatusView, content_view, run_summary, status_view};
pub use signal::StatusPayload;
pub use state::{InstanceSnapshot, InstanceState, Phase};

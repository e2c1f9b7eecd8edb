//! Durable lifecycle tracking for submitted job applications.
//!
//! Each application runs as one long-lived state machine
//! ([`workflow::ApplicationWorkflow`]) hosted by a [`host::WorkflowHost`]:
//! generate a cover letter, wait out the deadline while accepting status
//! updates, remind if nothing was decided, wait out a grace period, and
//! archive if still undecided. Every step is journaled to a
//! [`store::HistoryStore`] so an instance resumes after a restart without
//! repeating finished side effects.

pub mod activities;
pub mod anthropic;
pub mod application;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod store;
pub mod workflow;

pub use application::{ApplicationRecord, ApplicationStatus};
pub use error::TrackerError;
pub use host::WorkflowHost;

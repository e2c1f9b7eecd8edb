//! The immutable application record and the status vocabulary shared by the
//! state machine, its projections and the command line.

mod record;
mod status;

pub use record::{ApplicationRecord, ApplicationSubmission, DEFAULT_DEADLINE_WEEKS, instance_id_for};
pub use status::{ApplicationStatus, ParseStatusError};

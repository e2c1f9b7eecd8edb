use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TrackerError;

/// Deadline used when a submission does not name one.
pub const DEFAULT_DEADLINE_WEEKS: u64 = 4;

const SECONDS_PER_WEEK: u64 = 7 * 24 * 60 * 60;

/// A submitted job application. Created once by the caller before the
/// instance starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: String,
    pub company: String,
    pub role: String,
    pub job_description: String,
    /// Candidate background the cover letter is written from.
    pub resume: String,
    /// Where reminders go.
    pub user_email: String,
    /// How long to wait for news before reminding, measured from submission.
    #[serde(rename = "deadline_duration_seconds", with = "duration_secs")]
    pub deadline_duration: Duration,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ApplicationRecord {
    /// Builds a fresh record with a random id and a deadline in whole weeks.
    /// A week count too large to represent saturates; validated input goes
    /// through [`ApplicationSubmission::into_record`].
    pub fn new(
        company: impl Into<String>,
        role: impl Into<String>,
        job_description: impl Into<String>,
        resume: impl Into<String>,
        user_email: impl Into<String>,
        deadline_weeks: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            company: company.into(),
            role: role.into(),
            job_description: job_description.into(),
            resume: resume.into(),
            user_email: user_email.into(),
            deadline_duration: Duration::from_secs(deadline_weeks.saturating_mul(SECONDS_PER_WEEK)),
            created_at: Utc::now(),
        }
    }

    /// Replaces the deadline span. Only meant for building a record before submission.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_duration = deadline;
        self
    }

    /// Identifier of the state-machine instance that tracks this record.
    pub fn instance_id(&self) -> String {
        instance_id_for(&self.id)
    }
}

/// What a caller submits. The tracker assigns the id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicationSubmission {
    pub company: String,
    pub role: String,
    pub job_description: String,
    pub resume: String,
    pub user_email: String,
    #[serde(default = "default_deadline_weeks")]
    pub deadline_weeks: u64,
}

fn default_deadline_weeks() -> u64 {
    DEFAULT_DEADLINE_WEEKS
}

impl ApplicationSubmission {
    pub fn into_record(self) -> Result<ApplicationRecord, TrackerError> {
        let deadline = weeks(self.deadline_weeks).ok_or_else(|| {
            TrackerError::Config(format!("deadline_weeks {} is too large", self.deadline_weeks))
        })?;
        Ok(ApplicationRecord::new(
            self.company,
            self.role,
            self.job_description,
            self.resume,
            self.user_email,
            0,
        )
        .with_deadline(deadline))
    }
}

/// `count` weeks, or `None` if that many seconds overflow.
pub fn weeks(count: u64) -> Option<Duration> {
    count.checked_mul(SECONDS_PER_WEEK).map(Duration::from_secs)
}

/// Maps an application id to the id of the instance tracking it.
pub fn instance_id_for(application_id: &str) -> String {
    format!("job-app-{application_id}")
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ApplicationRecord {
        ApplicationRecord::new(
            "Acme",
            "Backend Engineer",
            "Build services",
            "Ten years of Rust",
            "me@example.com",
            DEFAULT_DEADLINE_WEEKS,
        )
    }

    #[test]
    fn new_record_uses_whole_weeks() {
        let record = sample();
        assert_eq!(record.deadline_duration, Duration::from_secs(4 * 604_800));
        assert!(Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn instance_id_is_prefixed() {
        let record = sample();
        assert_eq!(record.instance_id(), format!("job-app-{}", record.id));
    }

    #[test]
    fn deserialize_from_submission_json() {
        let json = r#"{
            "id": "abc",
            "company": "Acme",
            "role": "SRE",
            "job_description": "Keep it up",
            "resume": "Pager veteran",
            "user_email": "sre@example.com",
            "deadline_duration_seconds": 60
        }"#;
        let record: ApplicationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.deadline_duration, Duration::from_secs(60));
    }

    #[test]
    fn submission_defaults_to_four_weeks() {
        let toml_str = r#"
            company = "Initech"
            role = "Engineer"
            job_description = "TPS reports"
            resume = "Cover sheets"
            user_email = "peter@initech.com"
        "#;
        let submission: ApplicationSubmission = toml::from_str(toml_str).unwrap();
        assert_eq!(submission.deadline_weeks, 4);
        let record = submission.into_record().unwrap();
        assert_eq!(record.company, "Initech");
        assert_eq!(record.deadline_duration, Duration::from_secs(4 * 604_800));
    }

    #[test]
    fn oversized_deadline_is_a_config_error() {
        let json = r#"{
            "company": "Acme",
            "role": "SRE",
            "job_description": "",
            "resume": "",
            "user_email": "sre@example.com",
            "deadline_weeks": 18446744073709551615
        }"#;
        let submission: ApplicationSubmission = serde_json::from_str(json).unwrap();
        let err = submission.into_record().unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)), "{err}");
        assert_eq!(weeks(2), Some(Duration::from_secs(2 * 604_800)));
    }

    #[test]
    fn deadline_serializes_as_seconds() {
        let record = sample().with_deadline(Duration::from_secs(90));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["deadline_duration_seconds"], 90);
    }
}

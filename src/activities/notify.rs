use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::{ApplicationRecord, ApplicationStatus};
use crate::error::ActivityError;

/// Payload of the deadline reminder. The idempotency key is stable per
/// instance, so a redelivered reminder can be recognised downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub idempotency_key: String,
    pub application_id: String,
    pub user_email: String,
    pub company: String,
    pub role: String,
    pub status: ApplicationStatus,
}

impl ReminderRequest {
    pub fn new(instance_id: &str, record: &ApplicationRecord, status: ApplicationStatus) -> Self {
        Self {
            idempotency_key: format!("{instance_id}:reminder"),
            application_id: record.id.clone(),
            user_email: record.user_email.clone(),
            company: record.company.clone(),
            role: record.role.clone(),
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderAck {
    pub idempotency_key: String,
    pub sent_at: DateTime<Utc>,
}

pub trait ReminderNotifier: Send + Sync + 'static {
    fn send_reminder(
        &self,
        request: &ReminderRequest,
    ) -> impl Future<Output = Result<ReminderAck, ActivityError>> + Send;
}

/// Subject and body of the reminder email.
pub fn render_reminder(request: &ReminderRequest) -> (String, String) {
    let subject = format!(
        "Reminder: Follow up on your application to {}",
        request.company
    );
    let body = format!(
        "Dear Applicant,\n\
         \n\
         This is a reminder that you applied for the {role} position at {company}.\n\
         It's been a while since you submitted your application, and you might want to follow up.\n\
         \n\
         Application ID: {id}\n\
         \n\
         Consider:\n\
         - Sending a polite follow-up email\n\
         - Connecting with the hiring manager on LinkedIn\n\
         - Checking for any updates on the company's career page\n\
         \n\
         Best regards,\n\
         jobtrack",
        role = request.role,
        company = request.company,
        id = request.application_id,
    );
    (subject, body)
}

/// Notifier that writes the rendered reminder to the log and acknowledges it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl ReminderNotifier for LogNotifier {
    async fn send_reminder(&self, request: &ReminderRequest) -> Result<ReminderAck, ActivityError> {
        if request.user_email.trim().is_empty() {
            return Err(ActivityError::Rejected("no contact address".into()));
        }
        let (subject, body) = render_reminder(request);
        info!(
            application_id = %request.application_id,
            to = %request.user_email,
            key = %request.idempotency_key,
            %subject,
            "reminder notification sent"
        );
        tracing::debug!(%body, "reminder body");
        Ok(ReminderAck {
            idempotency_key: request.idempotency_key.clone(),
            sent_at: Utc::now(),
        })
    }
}

//! The two side-effecting operations an instance performs, wrapped with their
//! contractual timeout and retry policy.
//!
//! [`Activities`] is the façade the state machine talks to. It owns the
//! shared [`ActivityWorker`] pool and the pluggable [`ContentGenerator`] and
//! [`ReminderNotifier`] implementations.

mod generate;
mod notify;
mod retry;
mod worker;

pub use generate::{AnthropicGenerator, ContentGenerator, GenerationRequest, build_prompt};
pub use notify::{LogNotifier, ReminderAck, ReminderNotifier, ReminderRequest, render_reminder};
pub use retry::{ActivityOptions, RetryPolicy};
pub use worker::ActivityWorker;

use tracing::info;

use crate::application::ApplicationRecord;
use crate::error::ActivityError;

pub const GENERATE_CONTENT: &str = "generate_content";
pub const SEND_REMINDER: &str = "send_reminder";

pub struct Activities<G, N> {
    worker: ActivityWorker,
    generator: G,
    notifier: N,
}

impl<G: ContentGenerator, N: ReminderNotifier> Activities<G, N> {
    pub fn new(worker: ActivityWorker, generator: G, notifier: N) -> Self {
        Self {
            worker,
            generator,
            notifier,
        }
    }

    /// Produces the cover letter for `record`. Retries transient failures up
    /// to three attempts; anything else is returned as a permanent failure.
    pub async fn generate_content(&self, record: &ApplicationRecord) -> Result<String, ActivityError> {
        let request = GenerationRequest::from_record(record);
        let options = ActivityOptions::generate_content();
        let text = self
            .worker
            .execute(GENERATE_CONTENT, &options, |attempt| {
                info!(application_id = %request.application_id, attempt, "generating content");
                self.generator.generate(&request)
            })
            .await?;
        info!(application_id = %request.application_id, chars = text.len(), "content generated");
        Ok(text)
    }

    /// Dispatches the deadline reminder under the default retry policy.
    pub async fn send_reminder(&self, request: &ReminderRequest) -> Result<ReminderAck, ActivityError> {
        let options = ActivityOptions::send_reminder();
        self.worker
            .execute(SEND_REMINDER, &options, |_| self.notifier.send_reminder(request))
            .await
    }

    pub fn worker(&self) -> &ActivityWorker {
        &self.worker
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

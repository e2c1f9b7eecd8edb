use std::future::Future;
use std::time::Duration;

use crate::anthropic::{AnthropicClient, AnthropicError, Message, MessageSender, MessagesRequest};
use crate::application::ApplicationRecord;
use crate::config::TrackerConfig;
use crate::error::{ActivityError, TrackerError};

/// Everything a generator needs, carried per call. Built deterministically
/// from the record so a redelivered attempt issues the identical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub application_id: String,
    pub company: String,
    pub role: String,
    pub job_description: String,
    pub resume: String,
}

impl GenerationRequest {
    pub fn from_record(record: &ApplicationRecord) -> Self {
        Self {
            application_id: record.id.clone(),
            company: record.company.clone(),
            role: record.role.clone(),
            job_description: record.job_description.clone(),
            resume: record.resume.clone(),
        }
    }
}

/// Produces the supporting text for an application.
pub trait ContentGenerator: Send + Sync + 'static {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, ActivityError>> + Send;
}

pub fn build_prompt(request: &GenerationRequest) -> String {
    format!(
        "Write a professional cover letter for this job application:\n\
         \n\
         Company: {company}\n\
         Position: {role}\n\
         Job Description: {description}\n\
         My Background: {resume}\n\
         \n\
         Requirements:\n\
         - Show enthusiasm for the role and company\n\
         - Highlight relevant experience from my background\n\
         - Explain why I'm a great fit\n\
         - Professional but engaging tone\n\
         - Keep it concise (300-400 words)\n\
         - Focus on specific achievements and skills",
        company = request.company,
        role = request.role,
        description = request.job_description,
        resume = request.resume,
    )
}

/// Cover-letter generator backed by the Messages API.
///
/// Built once per process. Without a credential every call fails with a
/// configuration error, which aborts the instance.
pub struct AnthropicGenerator<S = AnthropicClient> {
    sender: Option<S>,
    model: String,
    max_tokens: u32,
}

impl AnthropicGenerator<AnthropicClient> {
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let sender = if config.api_key.is_empty() {
            None
        } else {
            let client = AnthropicClient::new(config.api_key.clone())
                .map_err(|e| TrackerError::Config(format!("cannot build HTTP client: {e}")))?;
            Some(client)
        };
        Ok(Self {
            sender,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

impl<S: MessageSender> AnthropicGenerator<S> {
    pub fn with_sender(sender: S, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            sender: Some(sender),
            model: model.into(),
            max_tokens,
        }
    }

    pub fn without_credentials(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            sender: None,
            model: model.into(),
            max_tokens,
        }
    }
}

impl<S: MessageSender + 'static> ContentGenerator for AnthropicGenerator<S> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ActivityError> {
        let sender = self.sender.as_ref().ok_or_else(|| {
            ActivityError::Configuration(format!("{} is not set", crate::config::API_KEY_ENV))
        })?;

        let req = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message::user(build_prompt(request))],
        };

        let response = sender.send_message(&req).await.map_err(classify)?;
        let text = response.text();
        if text.is_empty() {
            return Err(ActivityError::Transient("empty response from model".into()));
        }
        Ok(text)
    }
}

fn classify(err: AnthropicError) -> ActivityError {
    match &err {
        AnthropicError::ApiError { status: 401 | 403, .. } => {
            ActivityError::Configuration(err.to_string())
        }
        AnthropicError::RateLimited { retry_after_ms } => ActivityError::Throttled {
            retry_after: Duration::from_millis(*retry_after_ms),
        },
        _ if err.is_transient() => ActivityError::Transient(err.to_string()),
        _ => ActivityError::Rejected(err.to_string()),
    }
}

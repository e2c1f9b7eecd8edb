#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use jobtrack::activities::{
    Activities, ActivityWorker, ContentGenerator, GenerationRequest, ReminderAck, ReminderNotifier,
    ReminderRequest,
};
use jobtrack::application::ApplicationRecord;
use jobtrack::clock::Clock;
use jobtrack::error::ActivityError;
use jobtrack::host::WorkflowHost;
use jobtrack::store::HistoryStore;
use jobtrack::workflow::InstanceSnapshot;

pub const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const GRACE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Generator that fails with the queued errors first, then succeeds.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    pub calls: Arc<AtomicU32>,
    failures: Arc<Mutex<VecDeque<ActivityError>>>,
}

impl ScriptedGenerator {
    pub fn failing_with(errors: impl IntoIterator<Item = ActivityError>) -> Self {
        Self {
            calls: Arc::default(),
            failures: Arc::new(Mutex::new(errors.into_iter().collect())),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ActivityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(format!("Dear {} team, I would love to be your {}.", request.company, request.role))
    }
}

/// Notifier that records every request and optionally refuses them all.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<ReminderRequest>>>,
    refuse: bool,
}

impl RecordingNotifier {
    pub fn refusing() -> Self {
        Self {
            sent: Arc::default(),
            refuse: true,
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl ReminderNotifier for RecordingNotifier {
    async fn send_reminder(&self, request: &ReminderRequest) -> Result<ReminderAck, ActivityError> {
        self.sent.lock().unwrap().push(request.clone());
        if self.refuse {
            return Err(ActivityError::Rejected("mailbox unavailable".into()));
        }
        Ok(ReminderAck {
            idempotency_key: request.idempotency_key.clone(),
            sent_at: Utc::now(),
        })
    }
}

pub type TestHost = WorkflowHost<ScriptedGenerator, RecordingNotifier>;

pub fn host(
    store: Arc<dyn HistoryStore>,
    generator: ScriptedGenerator,
    notifier: RecordingNotifier,
    clock: Clock,
) -> TestHost {
    let activities = Activities::new(ActivityWorker::new(4), generator, notifier);
    WorkflowHost::with_clock(store, Arc::new(activities), GRACE, clock)
}

pub fn record(company: &str) -> ApplicationRecord {
    ApplicationRecord::new(
        company,
        "Platform Engineer",
        "Run the build farm",
        "Maintained CI for a large monorepo",
        "candidate@example.com",
        4,
    )
}

/// Waits until the live snapshot of `application_id` satisfies `pred`.
pub async fn wait_until<G, N>(
    host: &WorkflowHost<G, N>,
    application_id: &str,
    pred: impl FnMut(&InstanceSnapshot) -> bool,
) where
    G: ContentGenerator,
    N: ReminderNotifier,
{
    let mut rx = host.subscribe(application_id).await.unwrap();
    rx.wait_for(pred).await.unwrap();
}

//! In-process durable execution host.
//!
//! Starts one [`ApplicationWorkflow`] task per application, routes status
//! updates into its signal queue, answers queries from its published
//! snapshot, and brings unfinished instances back after a restart by
//! replaying their journals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::activities::{Activities, ContentGenerator, ReminderNotifier};
use crate::application::{ApplicationRecord, instance_id_for};
use crate::clock::Clock;
use crate::error::{StoreError, TrackerError};
use crate::store::{HistoryStore, Journal};
use crate::workflow::{
    ApplicationWorkflow, ContentView, HistoryEvent, InstanceSnapshot, Outcome, Phase, Replay,
    RunSummary, StatusPayload, StatusView, content_view, status_view,
};

/// Returned by [`WorkflowHost::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceHandle {
    pub application_id: String,
    pub instance_id: String,
}

/// One row of [`WorkflowHost::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceListing {
    pub application_id: String,
    pub instance_id: String,
    pub phase: Phase,
    #[serde(flatten)]
    pub view: StatusView,
}

struct LiveInstance {
    instance_id: String,
    signals: mpsc::UnboundedSender<StatusPayload>,
    snapshot: watch::Receiver<InstanceSnapshot>,
    outcome: watch::Receiver<Option<Outcome>>,
    task: Option<JoinHandle<()>>,
}

pub struct WorkflowHost<G, N> {
    store: Arc<dyn HistoryStore>,
    activities: Arc<Activities<G, N>>,
    clock: Clock,
    grace_period: Duration,
    instances: RwLock<HashMap<String, LiveInstance>>,
}

impl<G: ContentGenerator, N: ReminderNotifier> WorkflowHost<G, N> {
    pub fn new(store: Arc<dyn HistoryStore>, activities: Arc<Activities<G, N>>, grace_period: Duration) -> Self {
        Self::with_clock(store, activities, grace_period, Clock::default())
    }

    pub fn with_clock(
        store: Arc<dyn HistoryStore>,
        activities: Arc<Activities<G, N>>,
        grace_period: Duration,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            activities,
            clock,
            grace_period,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Journals the record and launches its instance.
    pub async fn start(&self, record: ApplicationRecord) -> Result<InstanceHandle, TrackerError> {
        let instance_id = record.instance_id();
        let mut instances = self.instances.write().await;
        if instances.contains_key(&record.id) {
            return Err(TrackerError::AlreadyStarted(instance_id));
        }

        let started = HistoryEvent::Started {
            record: record.clone(),
            at: self.clock.now(),
        };
        match self.store.create(&instance_id, &started) {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => return Err(TrackerError::AlreadyStarted(instance_id)),
            Err(e) => return Err(e.into()),
        }

        let live = self.launch(&instance_id, &[started])?;
        instances.insert(record.id.clone(), live);
        info!(application_id = %record.id, %instance_id, company = %record.company, "instance started");

        Ok(InstanceHandle {
            application_id: record.id,
            instance_id,
        })
    }

    /// Re-attaches every journal in the store that is not already live.
    /// Unfinished instances resume where they stopped; finished ones become
    /// queryable. Returns the application ids that were resumed.
    pub async fn recover(&self) -> Result<Vec<String>, TrackerError> {
        let mut resumed = Vec::new();
        let mut instances = self.instances.write().await;
        for instance_id in self.store.instances()? {
            let events = self.store.read(&instance_id)?;
            let replay = Replay::from_events(&instance_id, &events)?;
            let Some(application_id) = replay.record.as_ref().map(|r| r.id.clone()) else {
                continue;
            };
            if instances.contains_key(&application_id) {
                continue;
            }

            let live = if replay.outcome.is_some() {
                Self::settled(&instance_id, &replay)
            } else {
                resumed.push(application_id.clone());
                self.launch(&instance_id, &events)?
            };
            instances.insert(application_id, live);
        }
        if !resumed.is_empty() {
            info!(count = resumed.len(), "recovered unfinished instances");
        }
        Ok(resumed)
    }

    /// Delivers an `UpdateStatus` signal. Malformed payloads are accepted here
    /// and rejected by the instance; updates to a finished instance are ignored.
    pub async fn signal(&self, application_id: &str, payload: impl Into<StatusPayload>) -> Result<(), TrackerError> {
        let payload = payload.into();
        let instances = self.instances.read().await;
        let live = match instances.get(application_id) {
            Some(live) => live,
            None => {
                // Not attached to this host. A finished journal swallows the
                // update; anything else is unknown here.
                let replay = self.replay(application_id)?;
                if replay.outcome.is_some() {
                    debug!(application_id, "signal to finished instance ignored");
                    return Ok(());
                }
                return Err(TrackerError::InstanceNotFound(instance_id_for(application_id)));
            }
        };

        if live.snapshot.borrow().phase.is_terminal() {
            debug!(application_id, "signal to finished instance ignored");
            return Ok(());
        }
        if live.signals.send(payload).is_err() {
            debug!(application_id, "instance stopped before the signal was queued");
        }
        Ok(())
    }

    /// `GetStatus`. Never waits on the instance.
    pub async fn query_status(&self, application_id: &str) -> Result<StatusView, TrackerError> {
        let snapshot = self.snapshot(application_id).await?;
        Ok(status_view(&snapshot.state))
    }

    /// `GetContent`.
    pub async fn query_content(&self, application_id: &str) -> Result<ContentView, TrackerError> {
        let snapshot = self.snapshot(application_id).await?;
        Ok(content_view(&snapshot.state))
    }

    /// Latest published snapshot, or the journal's projection for instances
    /// that are not attached to this host.
    pub async fn snapshot(&self, application_id: &str) -> Result<InstanceSnapshot, TrackerError> {
        if let Some(live) = self.instances.read().await.get(application_id) {
            return Ok(live.snapshot.borrow().clone());
        }
        Ok(self.replay(application_id)?.snapshot())
    }

    /// Follows the snapshots of a live instance.
    pub async fn subscribe(&self, application_id: &str) -> Result<watch::Receiver<InstanceSnapshot>, TrackerError> {
        self.instances
            .read()
            .await
            .get(application_id)
            .map(|live| live.snapshot.clone())
            .ok_or_else(|| TrackerError::InstanceNotFound(instance_id_for(application_id)))
    }

    /// Every instance known to the store, sorted by instance id.
    pub async fn list(&self) -> Result<Vec<InstanceListing>, TrackerError> {
        let instances = self.instances.read().await;
        let mut rows = Vec::new();
        for instance_id in self.store.instances()? {
            let events = self.store.read(&instance_id)?;
            let replay = Replay::from_events(&instance_id, &events)?;
            let Some(record) = replay.record.as_ref() else {
                continue;
            };
            let snapshot = match instances.get(&record.id) {
                Some(live) => live.snapshot.borrow().clone(),
                None => replay.snapshot(),
            };
            rows.push(InstanceListing {
                application_id: record.id.clone(),
                instance_id,
                phase: snapshot.phase,
                view: status_view(&snapshot.state),
            });
        }
        Ok(rows)
    }

    /// Waits until the instance finishes and returns its summary.
    pub async fn wait(&self, application_id: &str) -> Result<RunSummary, TrackerError> {
        let (instance_id, mut outcome) = {
            let instances = self.instances.read().await;
            match instances.get(application_id) {
                Some(live) => (live.instance_id.clone(), live.outcome.clone()),
                None => {
                    let replay = self.replay(application_id)?;
                    let instance_id = instance_id_for(application_id);
                    return match replay.outcome {
                        Some(outcome) => Self::finished(instance_id, outcome),
                        None => Err(TrackerError::InstanceNotFound(instance_id)),
                    };
                }
            }
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TrackerError::InstanceFailed {
                instance: instance_id.clone(),
                error: "instance stopped before finishing".into(),
            })?
            .clone();
        match settled {
            Some(outcome) => Self::finished(instance_id, outcome),
            None => Err(TrackerError::InstanceNotFound(instance_id)),
        }
    }

    /// Stops every running instance without finishing it, as a process exit
    /// would, and closes the activity pool. Journals are left as they are,
    /// ready for [`recover`](Self::recover) on another host.
    pub async fn shutdown(&self) {
        let mut instances = self.instances.write().await;
        for (_, mut live) in instances.drain() {
            if let Some(task) = live.task.take() {
                task.abort();
            }
        }
        self.activities.worker().close();
        info!("host shut down");
    }

    pub fn activities(&self) -> &Activities<G, N> {
        &self.activities
    }

    fn replay(&self, application_id: &str) -> Result<Replay, TrackerError> {
        let instance_id = instance_id_for(application_id);
        let events = match self.store.read(&instance_id) {
            Ok(events) => events,
            Err(StoreError::UnknownInstance(_)) => return Err(TrackerError::InstanceNotFound(instance_id)),
            Err(e) => return Err(e.into()),
        };
        Ok(Replay::from_events(&instance_id, &events)?)
    }

    fn finished(instance_id: String, outcome: Outcome) -> Result<RunSummary, TrackerError> {
        match outcome {
            Outcome::Completed(summary) => Ok(summary),
            Outcome::Failed(error) => Err(TrackerError::InstanceFailed {
                instance: instance_id,
                error,
            }),
        }
    }

    fn launch(&self, instance_id: &str, events: &[HistoryEvent]) -> Result<LiveInstance, TrackerError> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(InstanceSnapshot::default());
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let workflow = ApplicationWorkflow::resume(
            Journal::new(Arc::clone(&self.store), instance_id),
            events,
            Arc::clone(&self.activities),
            signal_rx,
            snapshot_tx,
            self.clock,
            self.grace_period,
        )?;

        let id = instance_id.to_string();
        let task = tokio::spawn(async move {
            let outcome = match workflow.run().await {
                Ok(summary) => Outcome::Completed(summary),
                Err(err) => {
                    error!(instance = %id, error = %err, "instance failed");
                    Outcome::Failed(err.to_string())
                }
            };
            outcome_tx.send_replace(Some(outcome));
        });

        Ok(LiveInstance {
            instance_id: instance_id.to_string(),
            signals: signal_tx,
            snapshot: snapshot_rx,
            outcome: outcome_rx,
            task: Some(task),
        })
    }

    fn settled(instance_id: &str, replay: &Replay) -> LiveInstance {
        // Senders are dropped at once; the receivers keep the final values.
        let (signal_tx, _) = mpsc::unbounded_channel();
        let (_, snapshot_rx) = watch::channel(replay.snapshot());
        let (_, outcome_rx) = watch::channel(replay.outcome.clone());
        LiveInstance {
            instance_id: instance_id.to_string(),
            signals: signal_tx,
            snapshot: snapshot_rx,
            outcome: outcome_rx,
            task: None,
        }
    }
}

impl<G, N> Drop for WorkflowHost<G, N> {
    fn drop(&mut self) {
        for live in self.instances.get_mut().values_mut() {
            if let Some(task) = live.task.take() {
                task.abort();
            }
        }
    }
}

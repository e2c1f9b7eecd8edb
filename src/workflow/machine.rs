use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep_until;
use tracing::{debug, info, warn};

use super::history::{HistoryEvent, Outcome, ReminderProgress, Replay, TimerKind, TimerProgress};
use super::projection::{RunSummary, run_summary};
use super::signal::StatusPayload;
use super::state::InstanceSnapshot;
use crate::activities::{Activities, ContentGenerator, ReminderNotifier, ReminderRequest};
use crate::application::{ApplicationRecord, ApplicationStatus};
use crate::clock::Clock;
use crate::error::{StoreError, WorkflowError};
use crate::store::Journal;

/// One application's state machine.
///
/// Sequence: generate content, wait out the deadline, remind if nothing was
/// decided, wait out the grace period, archive if still undecided. Status
/// updates are applied one at a time from the signal queue whenever the run
/// loop is waiting (deadline, reminder delivery, grace period). Every
/// mutation is journaled before it becomes visible.
pub struct ApplicationWorkflow<G, N> {
    record: ApplicationRecord,
    replay: Replay,
    journal: Journal,
    activities: Arc<Activities<G, N>>,
    signals: mpsc::UnboundedReceiver<StatusPayload>,
    snapshot: watch::Sender<InstanceSnapshot>,
    clock: Clock,
    grace_period: Duration,
}

impl<G: ContentGenerator, N: ReminderNotifier> ApplicationWorkflow<G, N> {
    /// Builds a workflow positioned after the journaled `events`.
    pub fn resume(
        journal: Journal,
        events: &[HistoryEvent],
        activities: Arc<Activities<G, N>>,
        signals: mpsc::UnboundedReceiver<StatusPayload>,
        snapshot: watch::Sender<InstanceSnapshot>,
        clock: Clock,
        grace_period: Duration,
    ) -> Result<Self, StoreError> {
        let replay = Replay::from_events(journal.instance(), events)?;
        let record = replay
            .record
            .clone()
            .ok_or_else(|| StoreError::UnknownInstance(journal.instance().to_string()))?;
        snapshot.send_replace(replay.snapshot());
        Ok(Self {
            record,
            replay,
            journal,
            activities,
            signals,
            snapshot,
            clock,
            grace_period,
        })
    }

    fn instance(&self) -> &str {
        self.journal.instance()
    }

    /// Drives the instance to its end and returns the final summary.
    pub async fn run(mut self) -> Result<RunSummary, WorkflowError> {
        match &self.replay.outcome {
            Some(Outcome::Completed(summary)) => return Ok(summary.clone()),
            Some(Outcome::Failed(error)) => {
                return Err(WorkflowError::PreviouslyFailed(error.clone()));
            }
            None => {}
        }
        if self.replay.events > 1 {
            info!(
                instance = %self.instance(),
                events = self.replay.events,
                phase = %self.replay.phase(),
                "resuming instance from journal"
            );
        }

        self.generate_content().await?;
        self.await_deadline().await?;
        self.dispatch_reminder().await?;
        self.await_grace_period().await?;
        self.finalize()
    }

    /// Journals `event`, then applies it to in-memory state and publishes the
    /// new snapshot in one step.
    fn commit(&mut self, event: HistoryEvent) -> Result<(), StoreError> {
        self.journal.append(&event)?;
        self.replay.apply(&event);
        self.snapshot.send_replace(self.replay.snapshot());
        Ok(())
    }

    async fn generate_content(&mut self) -> Result<(), WorkflowError> {
        if self.replay.state.content_ready() {
            debug!(instance = %self.instance(), "content already latched, not regenerating");
            return Ok(());
        }
        let result = self.activities.generate_content(&self.record).await;
        match result {
            Ok(text) => {
                self.commit(HistoryEvent::ContentGenerated { text })?;
                Ok(())
            }
            Err(err) => {
                self.commit(HistoryEvent::Failed {
                    error: err.to_string(),
                })?;
                Err(WorkflowError::Generation(err))
            }
        }
    }

    async fn await_deadline(&mut self) -> Result<(), WorkflowError> {
        let deadline = self.record.deadline_duration;
        if let Some(fire_at) = self.schedule(TimerKind::Deadline, deadline)? {
            self.wait_for_timer(TimerKind::Deadline, fire_at).await?;
        }
        Ok(())
    }

    async fn dispatch_reminder(&mut self) -> Result<(), WorkflowError> {
        match self.replay.reminder {
            ReminderProgress::Settled => return Ok(()),
            ReminderProgress::Dispatched => {
                let status = self.replay.state.status;
                if status != ApplicationStatus::ReminderSent || self.replay.state.decision_recorded {
                    info!(instance = %self.instance(), %status, "pending reminder superseded");
                    self.commit(HistoryEvent::ReminderSuperseded { status })?;
                    return Ok(());
                }
                info!(instance = %self.instance(), "redelivering interrupted reminder");
            }
            ReminderProgress::NotDispatched => {
                if !self.replay.state.reminder_due() {
                    return Ok(());
                }
                self.commit(HistoryEvent::ReminderDispatched)?;
                info!(instance = %self.instance(), "deadline passed without news, sending reminder");
            }
        }

        let request = ReminderRequest::new(self.instance(), &self.record, self.replay.state.status);
        let activities = Arc::clone(&self.activities);
        let delivery = async move { activities.send_reminder(&request).await };
        tokio::pin!(delivery);

        let result = loop {
            tokio::select! {
                biased;
                Some(payload) = self.signals.recv() => self.handle_signal(payload)?,
                result = &mut delivery => break result,
            }
        };

        match result {
            Ok(ack) => self.commit(HistoryEvent::ReminderDelivered { ack })?,
            Err(err) => {
                warn!(instance = %self.instance(), error = %err, "reminder delivery failed, continuing");
                self.commit(HistoryEvent::ReminderFailed {
                    error: err.to_string(),
                })?;
            }
        }
        Ok(())
    }

    async fn await_grace_period(&mut self) -> Result<(), WorkflowError> {
        let entered = !matches!(self.replay.grace, TimerProgress::NotScheduled);
        if !entered && !self.replay.state.undecided() {
            return Ok(());
        }
        if let Some(fire_at) = self.schedule(TimerKind::Grace, self.grace_period)? {
            self.wait_for_timer(TimerKind::Grace, fire_at).await?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<RunSummary, WorkflowError> {
        if self.replay.state.undecided() {
            self.commit(HistoryEvent::Archived)?;
            info!(application_id = %self.record.id, "auto-archived application");
        }
        let summary = run_summary(&self.record.id, &self.replay.state);
        self.commit(HistoryEvent::Completed {
            summary: summary.clone(),
        })?;
        info!(
            application_id = %summary.application_id,
            final_status = %summary.final_status,
            updates = summary.update_count,
            "instance finished"
        );
        Ok(summary)
    }

    /// Fire time of `kind`, journaling it on first use. `None` once fired.
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.replay.timer(kind) {
            TimerProgress::Fired => Ok(None),
            TimerProgress::Scheduled(fire_at) => Ok(Some(fire_at)),
            TimerProgress::NotScheduled => {
                let fire_at = self.clock.fire_at(after);
                self.commit(HistoryEvent::TimerScheduled { timer: kind, fire_at })?;
                Ok(Some(fire_at))
            }
        }
    }

    /// Applies queued signals until the timer fires. Signals ready at the same
    /// instant as the timer win: the select is biased towards the queue and
    /// the queue is drained once more before the firing is journaled.
    async fn wait_for_timer(&mut self, kind: TimerKind, fire_at: DateTime<Utc>) -> Result<(), StoreError> {
        let timer = sleep_until(self.clock.deadline(fire_at));
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                Some(payload) = self.signals.recv() => self.handle_signal(payload)?,
                () = &mut timer => break,
            }
        }
        // Tasks woken by the same timer tick run before the queue is drained.
        tokio::task::yield_now().await;
        while let Ok(payload) = self.signals.try_recv() {
            self.handle_signal(payload)?;
        }

        debug!(instance = %self.instance(), timer = ?kind, "timer fired");
        self.commit(HistoryEvent::TimerFired { timer: kind })
    }

    fn handle_signal(&mut self, payload: StatusPayload) -> Result<(), StoreError> {
        match payload.normalize() {
            Ok(status) => {
                self.commit(HistoryEvent::SignalApplied { status })?;
                info!(
                    instance = %self.instance(),
                    %status,
                    updates = self.replay.state.update_count,
                    "status updated"
                );
            }
            Err(err) => {
                warn!(instance = %self.instance(), ?payload, error = %err, "rejected status update");
                self.commit(HistoryEvent::SignalRejected {
                    reason: err.to_string(),
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::{ActivityWorker, GenerationRequest, ReminderAck};
    use crate::error::ActivityError;
    use crate::store::{HistoryStore, MemoryStore};
    use crate::workflow::state::Phase;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicU32,
    }

    impl ContentGenerator for CountingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, ActivityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Dear {}", request.company))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        calls: AtomicU32,
    }

    impl ReminderNotifier for CountingNotifier {
        async fn send_reminder(&self, request: &ReminderRequest) -> Result<ReminderAck, ActivityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ReminderAck {
                idempotency_key: request.idempotency_key.clone(),
                sent_at: Utc::now(),
            })
        }
    }

    struct Harness {
        store: Arc<dyn HistoryStore>,
        activities: Arc<Activities<CountingGenerator, CountingNotifier>>,
        record: ApplicationRecord,
    }

    impl Harness {
        fn new(deadline: Duration) -> Self {
            let record = ApplicationRecord::new("Acme", "Dev", "", "", "a@b.c", 1).with_deadline(deadline);
            let store: Arc<dyn HistoryStore> = Arc::new(MemoryStore::new());
            store
                .create(
                    &record.instance_id(),
                    &HistoryEvent::Started {
                        record: record.clone(),
                        at: Utc::now(),
                    },
                )
                .unwrap();
            let activities = Arc::new(Activities::new(
                ActivityWorker::new(2),
                CountingGenerator::default(),
                CountingNotifier::default(),
            ));
            Self {
                store,
                activities,
                record,
            }
        }

        fn workflow(
            &self,
        ) -> (
            ApplicationWorkflow<CountingGenerator, CountingNotifier>,
            mpsc::UnboundedSender<StatusPayload>,
            watch::Receiver<InstanceSnapshot>,
        ) {
            let journal = Journal::new(self.store.clone(), self.record.instance_id());
            let events = journal.read().unwrap();
            let (tx, rx) = mpsc::unbounded_channel();
            let (snap_tx, snap_rx) = watch::channel(InstanceSnapshot::default());
            let workflow = ApplicationWorkflow::resume(
                journal,
                &events,
                self.activities.clone(),
                rx,
                snap_tx,
                Clock::default(),
                Duration::from_secs(7 * 86_400),
            )
            .unwrap();
            (workflow, tx, snap_rx)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn signal_ready_with_timer_preempts_reminder() {
        let harness = Harness::new(Duration::ZERO);
        let (workflow, tx, _snap) = harness.workflow();
        // Queued before the wait starts, so it is ready the moment the zero deadline is.
        tx.send(StatusPayload::from(ApplicationStatus::Interview)).unwrap();

        let summary = workflow.run().await.unwrap();
        assert_eq!(summary.final_status, ApplicationStatus::Interview);
        assert_eq!(summary.update_count, 1);
        assert_eq!(harness.activities.notifier().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_journal_short_circuits() {
        let harness = Harness::new(Duration::from_secs(60));
        let (workflow, _tx, _snap) = harness.workflow();
        let first = workflow.run().await.unwrap();
        assert_eq!(first.final_status, ApplicationStatus::Archived);

        let (again, _tx, snap) = harness.workflow();
        assert_eq!(snap.borrow().phase, Phase::Finished);
        let second = again.run().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(harness.activities.generator().calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.activities.notifier().calls.load(Ordering::SeqCst), 1);
    }
}

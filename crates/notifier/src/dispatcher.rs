//! Dispatcher: turns recipients into delivery tasks and runs them all.
//!
//! Steps:
//! 1. Load recipients from a [`RecipientSource`]
//! 2. Serialize each record, expand its schedule, seed a fresh per-run dedup cache
//! 3. Spawn one task per (recipient, offset) pair, all at once
//! 4. Join every task; each join produces exactly one [`CompletionSignal`]
//!    which is forwarded to a separate collector for logging and tallies
//!
//! Schedule and load errors abort before anything is spawned. Nothing a task
//! does can fail the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{self, JoinSet};
use uuid::Uuid;

use nudge_common::config::AppConfig;
use nudge_common::error::AppError;
use nudge_common::recipients::RecipientSource;
use nudge_common::types::{DedupMode, DeliveryOutcome, RecipientRecord};
use nudge_engine::dedup::DedupCache;
use nudge_engine::schedule;

use crate::client::ReminderClient;
use crate::delivery::{self, DeliveryContext, DeliveryTask};

/// Emitted once per launched task, whatever happened to it.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    pub task_id: Uuid,
    pub recipient: String,
    pub outcome: DeliveryOutcome,
}

/// Tasks for one run and the dedup cache they share.
///
/// Every plan starts from an empty cache, so acknowledgments never leak
/// from one run into the next.
#[derive(Debug)]
pub struct RunPlan {
    pub tasks: Vec<DeliveryTask>,
    pub cache: Arc<DedupCache>,
}

/// Totals for one run. `completed` always equals `launched`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub launched: usize,
    pub completed: usize,
    pub acknowledged: usize,
    /// Acknowledgments that reported the customer as paid.
    pub paid: usize,
    pub short_circuited: usize,
    pub failed: usize,
    pub aborted: usize,
    /// Distinct payloads in the run.
    pub payloads: usize,
    /// Distinct payloads acknowledged as paid by the end of the run.
    pub paid_payloads: usize,
}

#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    acknowledged: usize,
    paid: usize,
    short_circuited: usize,
    failed: usize,
    aborted: usize,
}

impl Tally {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        self.completed += 1;
        match outcome {
            DeliveryOutcome::Acknowledged { paid, .. } => {
                self.acknowledged += 1;
                if *paid {
                    self.paid += 1;
                }
            }
            DeliveryOutcome::ShortCircuited => self.short_circuited += 1,
            DeliveryOutcome::Failed { .. } => self.failed += 1,
            DeliveryOutcome::Aborted { .. } => self.aborted += 1,
        }
    }
}

/// Coordinates reminder runs against one endpoint.
pub struct Dispatcher {
    endpoint: String,
    client: ReminderClient,
    mode: DedupMode,
    limiter: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    /// `max_in_flight = None` keeps the unbounded fan-out: every task may
    /// call the endpoint at the same moment.
    pub fn new(
        endpoint: impl Into<String>,
        client: ReminderClient,
        mode: DedupMode,
        max_in_flight: Option<usize>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            mode,
            limiter: max_in_flight.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = ReminderClient::new(Duration::from_millis(config.request_timeout_ms))?;

        tracing::info!(
            endpoint = %config.reminder_endpoint,
            timeout_ms = config.request_timeout_ms,
            max_in_flight = ?config.max_in_flight,
            dedup_mode = %config.dedup_mode,
            "Dispatcher configured"
        );

        Ok(Self::new(
            config.reminder_endpoint.clone(),
            client,
            config.dedup_mode,
            config.max_in_flight,
        ))
    }

    /// Load, plan and run.
    pub async fn dispatch(&self, source: &dyn RecipientSource) -> Result<RunSummary, AppError> {
        let recipients = source.load()?;
        let plan = self.plan(&recipients)?;
        Ok(self.run(plan).await)
    }

    /// Build one task per schedule offset, seeding a fresh cache for every payload.
    ///
    /// A single malformed schedule fails the whole plan.
    pub fn plan(&self, recipients: &[RecipientRecord]) -> Result<RunPlan, AppError> {
        let cache = Arc::new(DedupCache::new());
        let mut tasks = Vec::new();

        for recipient in recipients {
            let payload: Arc<str> = Arc::from(recipient.to_payload()?);
            let offsets =
                schedule::expand(&recipient.schedule).map_err(|e| AppError::Schedule {
                    recipient: recipient.email.clone(),
                    message: e.to_string(),
                })?;

            cache.seed(&payload);

            for delay in schedule::as_durations(&offsets) {
                tasks.push(DeliveryTask::new(
                    recipient.email.clone(),
                    self.endpoint.clone(),
                    payload.clone(),
                    delay,
                ));
            }
        }

        tracing::info!(
            recipients = recipients.len(),
            tasks = tasks.len(),
            payloads = cache.len(),
            "Reminder plan built"
        );

        Ok(RunPlan { tasks, cache })
    }

    /// Launch every task concurrently and wait for all of them.
    pub async fn run(&self, plan: RunPlan) -> RunSummary {
        let started_at = Utc::now();
        let clock = Instant::now();
        let launched = plan.tasks.len();

        let ctx = Arc::new(DeliveryContext {
            client: self.client.clone(),
            cache: plan.cache.clone(),
            mode: self.mode,
            limiter: self.limiter.clone(),
        });

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(collect(signal_rx));

        let mut set = JoinSet::new();
        let mut owners = HashMap::with_capacity(launched);

        for (index, task) in plan.tasks.into_iter().enumerate() {
            tracing::info!(
                index = index + 1,
                task_id = %task.id,
                recipient = %task.recipient,
                delay_secs = task.delay.as_secs(),
                "Reminder scheduled"
            );

            let owner = (task.id, task.recipient.clone());
            let handle = set.spawn(delivery::execute(task, ctx.clone()));
            owners.insert(handle.id(), owner);
        }

        join_all(set, owners, signal_tx).await;

        let tally = collector.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Completion collector failed");
            Tally::default()
        });

        let summary = RunSummary {
            started_at,
            elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
            launched,
            completed: tally.completed,
            acknowledged: tally.acknowledged,
            paid: tally.paid,
            short_circuited: tally.short_circuited,
            failed: tally.failed,
            aborted: tally.aborted,
            payloads: plan.cache.len(),
            paid_payloads: plan.cache.paid_count(),
        };

        tracing::info!(
            launched = summary.launched,
            completed = summary.completed,
            acknowledged = summary.acknowledged,
            paid = summary.paid,
            short_circuited = summary.short_circuited,
            failed = summary.failed,
            aborted = summary.aborted,
            elapsed_ms = summary.elapsed_ms,
            "All reminder tasks finished"
        );

        summary
    }
}

/// Wait for every task in `set` and emit exactly one signal per task.
///
/// Tasks that panicked or were cancelled report [`DeliveryOutcome::Aborted`].
/// The sender is dropped on return, which ends the collector.
async fn join_all(
    mut set: JoinSet<DeliveryOutcome>,
    mut owners: HashMap<task::Id, (Uuid, String)>,
    signals: mpsc::UnboundedSender<CompletionSignal>,
) {
    while let Some(joined) = set.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(e) => (
                e.id(),
                DeliveryOutcome::Aborted {
                    reason: e.to_string(),
                },
            ),
        };
        let (task_id, recipient) = owners.remove(&id).unwrap_or_default();

        // Only fails once the collector is gone, and then nobody is listening.
        let _ = signals.send(CompletionSignal {
            task_id,
            recipient,
            outcome,
        });
    }
}

/// Observability sink: logs each completion and keeps the totals.
async fn collect(mut signals: mpsc::UnboundedReceiver<CompletionSignal>) -> Tally {
    let mut tally = Tally::default();

    while let Some(signal) = signals.recv().await {
        tally.record(&signal.outcome);
        tracing::info!(
            task_id = %signal.task_id,
            recipient = %signal.recipient,
            outcome = %signal.outcome,
            completed = tally.completed,
            "Reminder task completed"
        );
    }

    tally
}

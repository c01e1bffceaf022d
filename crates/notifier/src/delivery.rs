//! Delivery task: one scheduled reminder for one recipient.
//!
//! Lifecycle: wait out the delay → check the dedup cache → either skip
//! (already paid) or POST the payload → record the decoded paid flag.
//! Failures never escape the task; they are reported as a [`DeliveryOutcome`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use uuid::Uuid;

use nudge_common::types::{DedupMode, DeliveryOutcome};
use nudge_engine::dedup::DedupCache;

use crate::client::ReminderClient;

/// One reminder waiting to be sent.
#[derive(Debug, Clone)]
pub struct DeliveryTask {
    pub id: Uuid,
    /// Recipient address, for logging only.
    pub recipient: String,
    pub uri: String,
    /// Serialized recipient record; also the dedup key.
    pub payload: Arc<str>,
    /// Offset from the start of the run.
    pub delay: Duration,
}

impl DeliveryTask {
    pub fn new(
        recipient: impl Into<String>,
        uri: impl Into<String>,
        payload: Arc<str>,
        delay: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            uri: uri.into(),
            payload,
            delay,
        }
    }
}

/// State shared by every task of a run.
#[derive(Debug)]
pub struct DeliveryContext {
    pub client: ReminderClient,
    pub cache: Arc<DedupCache>,
    pub mode: DedupMode,
    /// Caps concurrent remote calls when set. Waiting tasks hold no permit.
    pub limiter: Option<Arc<Semaphore>>,
}

/// Run a task to completion.
pub async fn execute(task: DeliveryTask, ctx: Arc<DeliveryContext>) -> DeliveryOutcome {
    tokio::time::sleep(task.delay).await;

    match ctx.mode {
        DedupMode::BestEffort => attempt(&task, &ctx).await,
        DedupMode::Strict => {
            let lock = ctx.cache.in_flight_guard(&task.payload);
            let _guard = lock.lock().await;
            attempt(&task, &ctx).await
        }
    }
}

async fn attempt(task: &DeliveryTask, ctx: &DeliveryContext) -> DeliveryOutcome {
    if already_paid(task, ctx) {
        return DeliveryOutcome::ShortCircuited;
    }

    let permit = match &ctx.limiter {
        Some(limiter) => limiter.acquire().await.ok(),
        None => None,
    };

    // The payload may have been acknowledged while this task queued for a permit.
    if permit.is_some() && already_paid(task, ctx) {
        return DeliveryOutcome::ShortCircuited;
    }

    tracing::debug!(
        task_id = %task.id,
        recipient = %task.recipient,
        uri = %task.uri,
        payload = %task.payload,
        "Sending reminder"
    );

    let response = match ctx.client.post(&task.uri, &task.payload).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                task_id = %task.id,
                recipient = %task.recipient,
                error = %e,
                "Reminder delivery failed"
            );
            return DeliveryOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };
    drop(permit);

    if !response.is_success() {
        tracing::warn!(
            task_id = %task.id,
            status = response.status,
            "Endpoint answered with a non-success status"
        );
    }

    let ack = response.ack();
    tracing::info!(
        task_id = %task.id,
        recipient = %task.recipient,
        status = response.status,
        body = %response.body_text(),
        paid = ack.paid,
        "Reminder response"
    );

    ctx.cache.set(&task.payload, ack.paid);

    DeliveryOutcome::Acknowledged {
        paid: ack.paid,
        status: response.status,
    }
}

fn already_paid(task: &DeliveryTask, ctx: &DeliveryContext) -> bool {
    let paid = ctx.cache.get(&task.payload);
    if paid {
        tracing::info!(
            task_id = %task.id,
            recipient = %task.recipient,
            "Reminder skipped, payload already acknowledged as paid"
        );
    }
    paid
}

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::db;
use crate::gateway::{DeliveryGateway, SendRequest};
use crate::models::{QueueItem, Recipient, RecipientRef, SequenceStep};
use crate::token;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub batch_size: i64,
    pub stale_lock: Duration,
    pub max_retries: i32,
    pub token_secret: String,
}

/// Outcome counts for one invocation, returned to the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub errors: usize,
    pub total: usize,
}

/// Per-item failure classification. Transient failures are retried up to
/// the budget; permanent ones go straight to the dead-letter state.
#[derive(Debug)]
pub enum StepFailure {
    Transient(String),
    Permanent(String),
}

enum ItemOutcome {
    Sent,
    Cancelled,
}

#[derive(Debug, PartialEq, Eq)]
enum RetryDecision {
    Requeue,
    DeadLetter,
}

fn retry_decision(retry_count: i32, max_retries: i32) -> RetryDecision {
    if retry_count + 1 >= max_retries {
        RetryDecision::DeadLetter
    } else {
        RetryDecision::Requeue
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Advancement {
    Advance {
        step_number: i32,
        scheduled_for: DateTime<Utc>,
    },
    Complete,
}

fn plan_advancement(next: Option<&SequenceStep>, now: DateTime<Utc>) -> Advancement {
    match next {
        Some(step) => Advancement::Advance {
            step_number: step.step_number,
            scheduled_for: now + Duration::days(i64::from(step.delay_days)),
        },
        None => Advancement::Complete,
    }
}

fn db_transient(e: sqlx::Error) -> StepFailure {
    StepFailure::Transient(format!("Database error: {e}"))
}

/// Claim a batch of due queue items and process each one to a state
/// transition. Safe to invoke concurrently and repeatedly; with nothing
/// due it is a no-op. Per-item failures never escape; they become
/// transitions plus counter increments. Only a claim failure aborts the
/// invocation, and at that point no row has been touched.
pub async fn process_due_batch(
    pool: &PgPool,
    gateway: &dyn DeliveryGateway,
    opts: &EngineOptions,
    now: DateTime<Utc>,
) -> Result<BatchSummary, sqlx::Error> {
    let items = db::queue::claim_batch(pool, opts.batch_size, now, opts.stale_lock).await?;
    if items.is_empty() {
        return Ok(BatchSummary::default());
    }

    tracing::debug!("Claimed {} due queue items", items.len());

    let refs: Vec<RecipientRef> = items
        .iter()
        .filter_map(|item| item.recipient_ref().ok())
        .collect();

    // One directory read per recipient kind for the whole batch. If the
    // read itself fails, every claimed item is requeued as a transient
    // failure rather than aborting mid-claim.
    let recipients = match db::recipients::resolve_batch(pool, &refs).await {
        Ok(map) => map,
        Err(e) => {
            let failure = StepFailure::Transient(format!("Recipient resolution failed: {e}"));
            for item in &items {
                apply_failure(pool, item, &failure, opts.max_retries, now).await;
            }
            return Ok(BatchSummary {
                processed: 0,
                errors: items.len(),
                total: items.len(),
            });
        }
    };

    let mut summary = BatchSummary {
        total: items.len(),
        ..Default::default()
    };

    for item in &items {
        match process_item(pool, gateway, item, &recipients, opts, now).await {
            Ok(_) => summary.processed += 1,
            Err(failure) => {
                summary.errors += 1;
                apply_failure(pool, item, &failure, opts.max_retries, now).await;
            }
        }
    }

    tracing::info!(
        "Sequence batch done: {} processed, {} errors, {} total",
        summary.processed,
        summary.errors,
        summary.total
    );

    Ok(summary)
}

/// Run one claimed item through the step state machine. Every transition
/// out of `processing` clears `processing_started_at`.
async fn process_item(
    pool: &PgPool,
    gateway: &dyn DeliveryGateway,
    item: &QueueItem,
    recipients: &HashMap<RecipientRef, Recipient>,
    opts: &EngineOptions,
    now: DateTime<Utc>,
) -> Result<ItemOutcome, StepFailure> {
    let recipient_ref = item.recipient_ref().map_err(StepFailure::Permanent)?;

    let recipient = recipients.get(&recipient_ref).ok_or_else(|| {
        StepFailure::Permanent(format!(
            "{} profile {} no longer exists",
            recipient_ref.kind().as_str(),
            recipient_ref.profile_id()
        ))
    })?;

    if recipient.email_unsubscribed {
        db::queue::cancel(pool, item.id, now)
            .await
            .map_err(db_transient)?;
        tracing::debug!("Item {} cancelled: recipient unsubscribed", item.id);
        return Ok(ItemOutcome::Cancelled);
    }

    // A deactivated step can be reactivated later, so a miss is retryable.
    let step = db::sequences::find_active_step(pool, item.sequence_id, item.current_step)
        .await
        .map_err(db_transient)?
        .ok_or_else(|| {
            StepFailure::Transient(format!(
                "No active step {} in sequence {}",
                item.current_step, item.sequence_id
            ))
        })?;

    let tpl = db::templates::find_by_key(pool, &step.template_key)
        .await
        .map_err(db_transient)?
        .ok_or_else(|| StepFailure::Transient(format!("Template '{}' not found", step.template_key)))?;

    let request = build_send_request(item, recipient, &step, &tpl.subject, &tpl.body_html, opts);

    gateway
        .send(&request)
        .await
        .map_err(|e| StepFailure::Transient(format!("Delivery failed: {e}")))?;

    // The email is out the door. Nothing past this point may undo that:
    // sink writes are best-effort, and advancement must still happen.
    if let Err(e) =
        db::activity::record_email_event(pool, item.id, &recipient.email, &step.template_key, "sent")
            .await
    {
        tracing::warn!("Failed to record sent event for item {}: {e}", item.id);
    }

    let next = db::sequences::next_active_step(pool, item.sequence_id, item.current_step)
        .await
        .map_err(db_transient)?;

    match plan_advancement(next.as_ref(), now) {
        Advancement::Advance {
            step_number,
            scheduled_for,
        } => {
            db::queue::advance(pool, item.id, step_number, scheduled_for, now)
                .await
                .map_err(db_transient)?;
            tracing::debug!(
                "Item {} advanced to step {step_number}, due {scheduled_for}",
                item.id
            );
        }
        Advancement::Complete => {
            db::queue::complete(pool, item.id, now)
                .await
                .map_err(db_transient)?;
            tracing::debug!("Item {} completed its sequence", item.id);
        }
    }

    // Best-effort bookkeeping, strictly after the committed transition.
    if let Err(e) = db::activity::record_crm_activity(
        pool,
        recipient.organization_id,
        recipient.kind,
        recipient.id,
        "sequence_email_sent",
        &format!(
            "Sent step {} of sequence {} ({})",
            item.current_step, item.sequence_id, step.template_key
        ),
    )
    .await
    {
        tracing::warn!("Failed to record CRM activity for item {}: {e}", item.id);
    }

    if let Err(e) = db::recipients::directory(recipient.kind)
        .touch_last_contact(pool, recipient.id, now)
        .await
    {
        tracing::warn!("Failed to update last_contact_at for {}: {e}", recipient.id);
    }

    Ok(ItemOutcome::Sent)
}

fn build_send_request(
    item: &QueueItem,
    recipient: &Recipient,
    step: &SequenceStep,
    subject: &str,
    body_html: &str,
    opts: &EngineOptions,
) -> SendRequest {
    let mut variables: HashMap<String, String> = HashMap::new();
    variables.insert("name".into(), recipient.name.clone());
    variables.insert(
        "property_address".into(),
        recipient.property_address.clone().unwrap_or_default(),
    );
    variables.insert(
        "bedrooms".into(),
        recipient.bedrooms.map(|b| b.to_string()).unwrap_or_default(),
    );
    variables.insert("budget".into(), recipient.budget.clone().unwrap_or_default());
    variables.insert("queue_item_id".into(), item.id.to_string());
    variables.insert(
        "unsubscribe_token".into(),
        token::unsubscribe_token(&opts.token_secret, recipient.kind, recipient.id),
    );

    SendRequest {
        recipient_email: recipient.email.clone(),
        recipient_kind: recipient.kind,
        recipient_id: recipient.id,
        organization_id: recipient.organization_id,
        template_key: step.template_key.clone(),
        subject: subject.to_string(),
        body_html: body_html.to_string(),
        variables,
    }
}

/// Convert a classified failure into its queue transition. If this write
/// itself fails the row stays `processing` and is recovered later by the
/// stale-lock reclaim.
async fn apply_failure(
    pool: &PgPool,
    item: &QueueItem,
    failure: &StepFailure,
    max_retries: i32,
    now: DateTime<Utc>,
) {
    let result = match failure {
        StepFailure::Transient(msg) => match retry_decision(item.retry_count, max_retries) {
            RetryDecision::Requeue => {
                tracing::warn!(
                    "Item {} transient failure (attempt {}): {msg}",
                    item.id,
                    item.retry_count + 1
                );
                db::queue::requeue_for_retry(pool, item.id, msg, now).await
            }
            RetryDecision::DeadLetter => {
                tracing::error!("Item {} dead-lettered after {} retries: {msg}", item.id, max_retries);
                db::queue::dead_letter(pool, item.id, msg, now).await
            }
        },
        StepFailure::Permanent(msg) => {
            tracing::error!("Item {} failed permanently: {msg}", item.id);
            db::queue::mark_permanent_failure(pool, item.id, msg, now).await
        }
    };

    if let Err(e) = result {
        tracing::error!("Failed to record failure state for item {}: {e}", item.id);
    }
}

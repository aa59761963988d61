use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{QueueItem, RecipientRef};

pub async fn enqueue(
    pool: &PgPool,
    recipient: RecipientRef,
    sequence_id: Uuid,
    scheduled_for: DateTime<Utc>,
) -> Result<QueueItem, sqlx::Error> {
    let (seller_id, buyer_id) = match recipient {
        RecipientRef::Seller(id) => (Some(id), None),
        RecipientRef::Buyer(id) => (None, Some(id)),
    };

    sqlx::query_as::<_, QueueItem>(
        "INSERT INTO sequence_queue (seller_profile_id, buyer_profile_id, sequence_id, scheduled_for)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(seller_id)
    .bind(buyer_id)
    .bind(sequence_id)
    .bind(scheduled_for)
    .fetch_one(pool)
    .await
}

/// Atomically claim up to `max_items` due items: pending rows plus
/// processing rows whose claim went stale. The status flip and the
/// `processing_started_at` stamp happen in the same statement as the
/// selection, so two concurrent invocations can never claim the same row
/// (row locks + SKIP LOCKED close the read-to-update window).
pub async fn claim_batch(
    pool: &PgPool,
    max_items: i64,
    now: DateTime<Utc>,
    stale_lock: Duration,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    let stale_before = now - stale_lock;

    let mut items = sqlx::query_as::<_, QueueItem>(
        "UPDATE sequence_queue
         SET status = 'processing', processing_started_at = $1, updated_at = $1
         WHERE id IN (
             SELECT id FROM sequence_queue
             WHERE scheduled_for <= $1
               AND (status = 'pending'
                    OR (status = 'processing' AND processing_started_at < $2))
             ORDER BY scheduled_for ASC
             LIMIT $3
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .bind(now)
    .bind(stale_before)
    .bind(max_items)
    .fetch_all(pool)
    .await?;

    // RETURNING does not preserve the subquery order.
    items.sort_by_key(|item| item.scheduled_for);
    Ok(items)
}

/// Success path with a further active step: back to pending at the next
/// step's scheduled time.
pub async fn advance(
    pool: &PgPool,
    id: Uuid,
    next_step: i32,
    next_scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sequence_queue
         SET status = 'pending',
             current_step = $2,
             scheduled_for = $3,
             last_sent_at = $4,
             processing_started_at = NULL,
             error_message = NULL,
             updated_at = $4
         WHERE id = $1",
    )
    .bind(id)
    .bind(next_step)
    .bind(next_scheduled_for)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Success path with no further active step: sequence exhausted.
pub async fn complete(pool: &PgPool, id: Uuid, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sequence_queue
         SET status = 'completed',
             last_sent_at = $2,
             processing_started_at = NULL,
             error_message = NULL,
             updated_at = $2
         WHERE id = $1",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Recipient unsubscribed. No send happened, no retry is charged.
pub async fn cancel(pool: &PgPool, id: Uuid, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sequence_queue
         SET status = 'cancelled',
             processing_started_at = NULL,
             updated_at = $2
         WHERE id = $1",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Retryable failure with budget left: charge one retry and requeue as
/// pending. `scheduled_for` is untouched, so the item is claimable again
/// on the very next trigger.
pub async fn requeue_for_retry(
    pool: &PgPool,
    id: Uuid,
    error: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sequence_queue
         SET status = 'pending',
             retry_count = retry_count + 1,
             error_message = $2,
             processing_started_at = NULL,
             updated_at = $3
         WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Retryable failure with the budget spent: charge the final retry and
/// park the item in the dead-letter state for manual remediation.
pub async fn dead_letter(
    pool: &PgPool,
    id: Uuid,
    error: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sequence_queue
         SET status = 'failed',
             retry_count = retry_count + 1,
             error_message = $2,
             processing_started_at = NULL,
             updated_at = $3
         WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Non-retryable failure: straight to the dead-letter state without
/// touching the retry budget.
pub async fn mark_permanent_failure(
    pool: &PgPool,
    id: Uuid,
    error: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sequence_queue
         SET status = 'failed',
             error_message = $2,
             processing_started_at = NULL,
             updated_at = $3
         WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>("SELECT * FROM sequence_queue WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Per-status row counts for operational inspection.
pub async fn status_counts(pool: &PgPool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM sequence_queue GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await
}

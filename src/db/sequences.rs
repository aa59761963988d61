use sqlx::PgPool;
use uuid::Uuid;

use crate::models::SequenceStep;

/// The step about to be attempted. Inactive steps are not executed and
/// not skipped over; a missing active step is the caller's problem.
pub async fn find_active_step(
    pool: &PgPool,
    sequence_id: Uuid,
    step_number: i32,
) -> Result<Option<SequenceStep>, sqlx::Error> {
    sqlx::query_as::<_, SequenceStep>(
        "SELECT * FROM sequence_steps
         WHERE sequence_id = $1 AND step_number = $2 AND is_active = TRUE",
    )
    .bind(sequence_id)
    .bind(step_number)
    .fetch_optional(pool)
    .await
}

/// The smallest active step beyond `after_step`, if the sequence has one.
pub async fn next_active_step(
    pool: &PgPool,
    sequence_id: Uuid,
    after_step: i32,
) -> Result<Option<SequenceStep>, sqlx::Error> {
    sqlx::query_as::<_, SequenceStep>(
        "SELECT * FROM sequence_steps
         WHERE sequence_id = $1 AND step_number > $2 AND is_active = TRUE
         ORDER BY step_number ASC
         LIMIT 1",
    )
    .bind(sequence_id)
    .bind(after_step)
    .fetch_optional(pool)
    .await
}

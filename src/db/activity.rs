use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ProfileKind;

/// Append a delivery event. Write-only from the engine's perspective;
/// nothing reads these rows back for control decisions.
pub async fn record_email_event(
    pool: &PgPool,
    queue_item_id: Uuid,
    recipient_email: &str,
    template_key: &str,
    event_type: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO email_events (queue_item_id, recipient_email, template_key, event_type)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(queue_item_id)
    .bind(recipient_email)
    .bind(template_key)
    .bind(event_type)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_crm_activity(
    pool: &PgPool,
    organization_id: Uuid,
    kind: ProfileKind,
    profile_id: Uuid,
    activity_type: &str,
    description: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO crm_activities (organization_id, profile_kind, profile_id, activity_type, description)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(organization_id)
    .bind(kind.as_str())
    .bind(profile_id)
    .bind(activity_type)
    .bind(description)
    .execute(pool)
    .await?;
    Ok(())
}

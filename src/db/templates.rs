use sqlx::PgPool;

use crate::models::EmailTemplate;

pub async fn find_by_key(pool: &PgPool, key: &str) -> Result<Option<EmailTemplate>, sqlx::Error> {
    sqlx::query_as::<_, EmailTemplate>("SELECT * FROM email_templates WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

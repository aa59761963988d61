use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ProfileKind, Recipient, RecipientRef};

/// Directory access for one recipient kind. Seller and buyer profiles
/// live in disjoint tables; everything past resolution works on the
/// flattened `Recipient` shape.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn get(&self, pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Recipient>, sqlx::Error>;

    async fn touch_last_contact(
        &self,
        pool: &PgPool,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Returns false when no such profile exists.
    async fn set_unsubscribed(&self, pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error>;
}

pub struct SellerDirectory;
pub struct BuyerDirectory;

pub fn directory(kind: ProfileKind) -> &'static dyn ProfileDirectory {
    match kind {
        ProfileKind::Seller => &SellerDirectory,
        ProfileKind::Buyer => &BuyerDirectory,
    }
}

#[derive(sqlx::FromRow)]
struct SellerRow {
    id: Uuid,
    organization_id: Uuid,
    email: String,
    name: String,
    property_address: Option<String>,
    bedrooms: Option<i32>,
    email_unsubscribed: bool,
    last_contact_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct BuyerRow {
    id: Uuid,
    organization_id: Uuid,
    email: String,
    name: String,
    budget: Option<String>,
    email_unsubscribed: bool,
    last_contact_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl ProfileDirectory for SellerDirectory {
    async fn get(&self, pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Recipient>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SellerRow>(
            "SELECT id, organization_id, email, name, property_address, bedrooms,
                    email_unsubscribed, last_contact_at
             FROM seller_profiles WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Recipient {
                id: r.id,
                kind: ProfileKind::Seller,
                organization_id: r.organization_id,
                email: r.email,
                name: r.name,
                property_address: r.property_address,
                bedrooms: r.bedrooms,
                budget: None,
                email_unsubscribed: r.email_unsubscribed,
                last_contact_at: r.last_contact_at,
            })
            .collect())
    }

    async fn touch_last_contact(
        &self,
        pool: &PgPool,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE seller_profiles SET last_contact_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn set_unsubscribed(&self, pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE seller_profiles SET email_unsubscribed = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProfileDirectory for BuyerDirectory {
    async fn get(&self, pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Recipient>, sqlx::Error> {
        let rows = sqlx::query_as::<_, BuyerRow>(
            "SELECT id, organization_id, email, name, budget,
                    email_unsubscribed, last_contact_at
             FROM buyer_profiles WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Recipient {
                id: r.id,
                kind: ProfileKind::Buyer,
                organization_id: r.organization_id,
                email: r.email,
                name: r.name,
                property_address: None,
                bedrooms: None,
                budget: r.budget,
                email_unsubscribed: r.email_unsubscribed,
                last_contact_at: r.last_contact_at,
            })
            .collect())
    }

    async fn touch_last_contact(
        &self,
        pool: &PgPool,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE buyer_profiles SET last_contact_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn set_unsubscribed(&self, pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE buyer_profiles SET email_unsubscribed = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Resolve every reference in the batch with at most one directory read
/// per kind, regardless of batch size.
pub async fn resolve_batch(
    pool: &PgPool,
    refs: &[RecipientRef],
) -> Result<HashMap<RecipientRef, Recipient>, sqlx::Error> {
    let mut by_kind: HashMap<ProfileKind, Vec<Uuid>> = HashMap::new();
    for r in refs {
        by_kind.entry(r.kind()).or_default().push(r.profile_id());
    }

    let mut resolved = HashMap::with_capacity(refs.len());
    for (kind, ids) in by_kind {
        for recipient in directory(kind).get(pool, &ids).await? {
            let key = match kind {
                ProfileKind::Seller => RecipientRef::Seller(recipient.id),
                ProfileKind::Buyer => RecipientRef::Buyer(recipient.id),
            };
            resolved.insert(key, recipient);
        }
    }
    Ok(resolved)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::recipient::ProfileKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// One recipient's progress through one sequence.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub seller_profile_id: Option<Uuid>,
    pub buyer_profile_id: Option<Uuid>,
    pub sequence_id: Uuid,
    pub current_step: i32,
    pub status: QueueStatus,
    pub scheduled_for: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which directory a queue item points into. Exactly one of the two
/// profile columns must be set; anything else is a malformed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientRef {
    Seller(Uuid),
    Buyer(Uuid),
}

impl RecipientRef {
    pub fn kind(&self) -> ProfileKind {
        match self {
            RecipientRef::Seller(_) => ProfileKind::Seller,
            RecipientRef::Buyer(_) => ProfileKind::Buyer,
        }
    }

    pub fn profile_id(&self) -> Uuid {
        match self {
            RecipientRef::Seller(id) | RecipientRef::Buyer(id) => *id,
        }
    }
}

impl QueueItem {
    /// Extract the recipient reference, rejecting rows where both or
    /// neither profile column is set.
    pub fn recipient_ref(&self) -> Result<RecipientRef, String> {
        match (self.seller_profile_id, self.buyer_profile_id) {
            (Some(id), None) => Ok(RecipientRef::Seller(id)),
            (None, Some(id)) => Ok(RecipientRef::Buyer(id)),
            (Some(_), Some(_)) => Err(format!(
                "Queue item {} has both seller and buyer profile references",
                self.id
            )),
            (None, None) => Err(format!(
                "Queue item {} has no recipient profile reference",
                self.id
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(seller: Option<Uuid>, buyer: Option<Uuid>) -> QueueItem {
        QueueItem {
            id: Uuid::now_v7(),
            seller_profile_id: seller,
            buyer_profile_id: buyer,
            sequence_id: Uuid::now_v7(),
            current_step: 1,
            status: QueueStatus::Pending,
            scheduled_for: Utc::now(),
            processing_started_at: None,
            retry_count: 0,
            last_sent_at: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn recipient_ref_seller() {
        let id = Uuid::now_v7();
        let r = item(Some(id), None).recipient_ref().unwrap();
        assert_eq!(r, RecipientRef::Seller(id));
        assert_eq!(r.kind(), ProfileKind::Seller);
        assert_eq!(r.profile_id(), id);
    }

    #[test]
    fn recipient_ref_buyer() {
        let id = Uuid::now_v7();
        let r = item(None, Some(id)).recipient_ref().unwrap();
        assert_eq!(r, RecipientRef::Buyer(id));
        assert_eq!(r.kind(), ProfileKind::Buyer);
    }

    #[test]
    fn recipient_ref_rejects_both_and_neither() {
        let id = Uuid::now_v7();
        assert!(item(Some(id), Some(id)).recipient_ref().is_err());
        assert!(item(None, None).recipient_ref().is_err());
    }
}

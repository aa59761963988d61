use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Seller,
    Buyer,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Seller => "seller",
            ProfileKind::Buyer => "buyer",
        }
    }
}

impl std::str::FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seller" => Ok(ProfileKind::Seller),
            "buyer" => Ok(ProfileKind::Buyer),
            other => Err(format!("Unknown profile kind: {other}")),
        }
    }
}

/// Contact and personalization fields for one seller or buyer profile,
/// flattened into a single shape so the engine never branches on kind
/// past directory resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub kind: ProfileKind,
    pub organization_id: Uuid,
    pub email: String,
    pub name: String,
    pub property_address: Option<String>,
    pub bedrooms: Option<i32>,
    pub budget: Option<String>,
    pub email_unsubscribed: bool,
    pub last_contact_at: Option<DateTime<Utc>>,
}

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::ProfileKind;

/// Derive the unsubscribe token for a profile. Stable per profile so the
/// link keeps working across every email in a sequence.
pub fn unsubscribe_token(secret: &str, kind: ProfileKind, profile_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(profile_id.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify(secret: &str, kind: ProfileKind, profile_id: Uuid, token: &str) -> bool {
    unsubscribe_token(secret, kind, profile_id) == token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        let id = Uuid::now_v7();
        let token = unsubscribe_token("secret", ProfileKind::Seller, id);
        assert!(verify("secret", ProfileKind::Seller, id, &token));
    }

    #[test]
    fn token_is_bound_to_kind_and_profile() {
        let id = Uuid::now_v7();
        let token = unsubscribe_token("secret", ProfileKind::Seller, id);
        assert!(!verify("secret", ProfileKind::Buyer, id, &token));
        assert!(!verify("secret", ProfileKind::Seller, Uuid::now_v7(), &token));
        assert!(!verify("other", ProfileKind::Seller, id, &token));
    }
}

pub mod smtp;

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::ProfileKind;

/// One outbound email, fully resolved: contact info, rendered-template
/// inputs, and the personalization variables the provider embeds in
/// tracking and unsubscribe links.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub recipient_email: String,
    pub recipient_kind: ProfileKind,
    pub recipient_id: Uuid,
    pub organization_id: Uuid,
    pub template_key: String,
    pub subject: String,
    pub body_html: String,
    pub variables: HashMap<String, String>,
}

#[derive(Debug)]
pub struct GatewayError {
    pub message: String,
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<String> for GatewayError {
    fn from(s: String) -> Self {
        GatewayError { message: s }
    }
}

impl From<&str> for GatewayError {
    fn from(s: &str) -> Self {
        GatewayError {
            message: s.to_string(),
        }
    }
}

/// External delivery collaborator, invoked once per queue item. A failed
/// call is always treated as retryable by the engine.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send(&self, request: &SendRequest) -> Result<(), GatewayError>;
}

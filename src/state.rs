use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::gateway::DeliveryGateway;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// None when no SMTP block is configured; the trigger route refuses
    /// to run the engine in that case rather than pretending to send.
    pub gateway: Option<Arc<dyn DeliveryGateway>>,
}

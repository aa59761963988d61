pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod state;
pub mod template;
pub mod token;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::PgPool;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::gateway::smtp::SmtpGateway;
use crate::gateway::DeliveryGateway;
use crate::state::{AppState, SharedState};

pub fn build_state(pool: PgPool, config: Config) -> SharedState {
    let gateway: Option<Arc<dyn DeliveryGateway>> = config.smtp.as_ref().and_then(|smtp| {
        match SmtpGateway::new(smtp, &config.base_url) {
            Ok(gateway) => {
                tracing::info!("SMTP delivery gateway configured");
                Some(Arc::new(gateway) as Arc<dyn DeliveryGateway>)
            }
            Err(e) => {
                tracing::warn!("SMTP delivery gateway not available: {e}");
                None
            }
        }
    });

    Arc::new(AppState {
        pool,
        config,
        gateway,
    })
}

pub fn build_app(state: SharedState) -> Router {
    Router::new()
        .merge(routes::routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

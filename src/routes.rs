use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;
use crate::engine::{self, BatchSummary};
use crate::error::AppError;
use crate::models::ProfileKind;
use crate::state::SharedState;
use crate::token;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/internal/v1/sequences/process", post(process_batch))
        .route("/internal/v1/sequences/queue/stats", get(queue_stats))
        .route("/v1/unsubscribe/{kind}/{profile_id}", get(unsubscribe))
}

#[derive(Deserialize, Default)]
pub struct ProcessRequest {
    pub batch_size: Option<i64>,
    pub stale_lock_minutes: Option<i64>,
}

/// Scheduler trigger. Safe to call repeatedly and concurrently; with
/// nothing due it returns all zeros.
async fn process_batch(
    State(state): State<SharedState>,
    body: Option<Json<ProcessRequest>>,
) -> Result<Json<BatchSummary>, AppError> {
    let gateway = state.gateway.clone().ok_or_else(|| {
        AppError::ServiceUnavailable("No delivery gateway configured".to_string())
    })?;

    let req = body.map(|Json(r)| r).unwrap_or_default();

    let mut opts = state.config.engine_options();
    if let Some(batch_size) = req.batch_size {
        if batch_size <= 0 {
            return Err(AppError::BadRequest("batch_size must be positive".to_string()));
        }
        opts.batch_size = batch_size;
    }
    if let Some(minutes) = req.stale_lock_minutes {
        if minutes <= 0 {
            return Err(AppError::BadRequest(
                "stale_lock_minutes must be positive".to_string(),
            ));
        }
        opts.stale_lock = Duration::minutes(minutes);
    }

    let summary = engine::process_due_batch(&state.pool, gateway.as_ref(), &opts, Utc::now()).await?;
    Ok(Json(summary))
}

/// Per-status row counts, mainly for watching the dead-letter pile.
async fn queue_stats(State(state): State<SharedState>) -> Result<Json<Value>, AppError> {
    let counts = db::queue::status_counts(&state.pool).await?;
    let mut stats = serde_json::Map::new();
    for (status, count) in counts {
        stats.insert(status, json!(count));
    }
    Ok(Json(Value::Object(stats)))
}

#[derive(Deserialize)]
pub struct UnsubscribeQuery {
    pub token: String,
}

async fn unsubscribe(
    State(state): State<SharedState>,
    Path((kind, profile_id)): Path<(String, Uuid)>,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<Html<&'static str>, AppError> {
    let kind: ProfileKind = kind
        .parse()
        .map_err(|e: String| AppError::BadRequest(e))?;

    if !token::verify(&state.config.token_secret, kind, profile_id, &query.token) {
        return Err(AppError::Forbidden("Invalid unsubscribe token".to_string()));
    }

    let updated = db::recipients::directory(kind)
        .set_unsubscribed(&state.pool, profile_id)
        .await?;

    if !updated {
        return Err(AppError::NotFound("Profile not found".to_string()));
    }

    tracing::info!("{} profile {profile_id} unsubscribed", kind.as_str());

    Ok(Html(
        "<html><body style=\"font-family: sans-serif; max-width: 600px; margin: 40px auto;\">\
         <h2>You've been unsubscribed</h2>\
         <p>You won't receive any further emails from this sequence.</p>\
         </body></html>",
    ))
}

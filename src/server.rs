use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::AppError;
use crate::events::{AttendanceWebhook, LifecycleWebhook};
use crate::lifecycle::LifecycleSync;
use crate::reconcile::{EventOutcome, Reconciler};
use crate::token::TokenProvider;

const WEBHOOK_KEY_HEADER: &str = "x-webhook-key";

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    pub lifecycle: Arc<LifecycleSync>,
    pub hr_tokens: Arc<TokenProvider>,
    pub occupancy_tokens: Arc<TokenProvider>,
    pub webhook_secret: Arc<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/attendance", post(attendance_webhook))
        .route("/webhooks/hr", post(hr_webhook))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_webhook_key,
        ))
        .route("/health", get(health))
        .route("/status/tokens", get(token_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_webhook_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = request
        .headers()
        .get(WEBHOOK_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided != Some(state.webhook_secret.as_str()) {
        warn!("webhook call rejected, bad or missing {WEBHOOK_KEY_HEADER}");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}

async fn attendance_webhook(
    State(state): State<AppState>,
    Json(payload): Json<AttendanceWebhook>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = state.reconciler.process_attendance(&payload).await?;
    Ok(Json(outcome_body(&outcome)))
}

async fn hr_webhook(
    State(state): State<AppState>,
    Json(payload): Json<LifecycleWebhook>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = state.lifecycle.process(&payload).await?;
    Ok(Json(outcome_body(&outcome)))
}

fn outcome_body(outcome: &EventOutcome) -> serde_json::Value {
    match outcome {
        EventOutcome::Processed { detail } => serde_json::json!({
            "status": "processed",
            "detail": detail,
        }),
        EventOutcome::SignedIn => serde_json::json!({
            "status": "signed_in",
            "detail": "entry recorded, awaiting exit event",
        }),
        EventOutcome::Ignored(reason) => serde_json::json!({
            "status": "ignored",
            "detail": reason,
        }),
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn token_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let hr = state.hr_tokens.status().await;
    let occupancy = state.occupancy_tokens.status().await;
    Json(serde_json::json!({
        "hr": hr,
        "occupancy": occupancy,
    }))
}

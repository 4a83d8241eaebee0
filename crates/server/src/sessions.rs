//! Conversation endpoints.
//!
//! - `POST   /sessions`              start a conversation
//! - `POST   /sessions/{id}/turns`   send one customer message (an unseen id starts a session)
//! - `POST   /sessions/{id}/reset`   forget context and history
//! - `DELETE /sessions/{id}`         end the conversation
//! - `GET    /sessions/{id}/plan`    inspect the current plan

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use trailhead_agent::{Engine, PlanState, SessionId, TurnOutcome};
use trailhead_core::errors::{ApplicationError, InterfaceError};
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionsState {
    pub engine: Arc<Engine>,
}

pub fn router(state: SessionsState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", delete(end_session))
        .route("/sessions/{id}/turns", post(submit_turn))
        .route("/sessions/{id}/reset", post(reset_session))
        .route("/sessions/{id}/plan", get(plan_snapshot))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub plan_id: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub session_id: String,
    pub plan_id: String,
    pub turn: u64,
    pub outcome: TurnOutcome,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session_id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

/// Maps interface errors onto HTTP statuses with a user-safe body.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn from_application(error: ApplicationError) -> Self {
        Self(error.into_interface(Uuid::new_v4().to_string()))
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(
            event_name = "server.request.failed",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "request failed"
        );
        let body = ErrorBody {
            error: self.0.user_message(),
            detail: self.0.to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub async fn create_session(
    State(state): State<SessionsState>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let session_id = state.engine.create_session().await;
    let plan = state.engine.plan_snapshot(&session_id).await.map_err(ApiError::from_application)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated { session_id: session_id.to_string(), plan_id: plan.plan_id }),
    ))
}

pub async fn submit_turn(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let report = state
        .engine
        .submit_turn(&SessionId(id), message)
        .await
        .map_err(ApiError::from_application)?;

    Ok(Json(TurnResponse {
        session_id: report.session_id.to_string(),
        plan_id: report.plan_id,
        turn: report.turn,
        outcome: report.outcome,
        reply: report.reply,
    }))
}

pub async fn reset_session(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let session_id = SessionId(id);
    state.engine.reset_session(&session_id).await.map_err(ApiError::from_application)?;
    Ok(Json(ResetResponse { session_id: session_id.to_string(), status: "reset" }))
}

pub async fn end_session(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine.end_session(&SessionId(id)).await.map_err(ApiError::from_application)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn plan_snapshot(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
) -> Result<Json<PlanState>, ApiError> {
    let plan = state.engine.plan_snapshot(&SessionId(id)).await.map_err(ApiError::from_application)?;
    Ok(Json(plan))
}

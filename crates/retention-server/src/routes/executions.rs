use axum::extract::{Path, Query, State};
use axum::Json;
use retention_core::types::ExecutionStatus;
use serde::Deserialize;
use uuid::Uuid;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListExecutionsQuery {
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
}

/// GET /api/orgs/{org}/executions?status=: executions, oldest trigger first.
pub async fn list_executions(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
    Query(q): Query<ListExecutionsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let executions = blocking(move || db.list_executions(org, q.status)).await?;
    Ok(Json(serde_json::to_value(executions)?))
}

/// GET /api/orgs/{org}/executions/{id}
pub async fn get_execution(
    State(app): State<AppState>,
    Path((org, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let execution = blocking(move || db.execution(org, id)).await?;
    Ok(Json(serde_json::to_value(execution)?))
}

/// GET /api/orgs/{org}/messages: outbox records written by the processor.
pub async fn list_messages(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let messages = blocking(move || db.messages(org)).await?;
    Ok(Json(serde_json::to_value(messages)?))
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use retention_core::playbook::{PlaybookDefinition, PlaybookPatch};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/orgs/{org}/playbooks: non-archived playbooks, oldest first.
pub async fn list_playbooks(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let db = app.db.clone();
    let playbooks = blocking(move || db.list_playbooks(org)).await?;
    Ok(Json(serde_json::to_value(playbooks)?))
}

#[derive(Deserialize)]
pub struct CreatePlaybookBody {
    #[serde(flatten)]
    pub definition: PlaybookDefinition,
    #[serde(default)]
    pub change_summary: Option<String>,
}

/// POST /api/orgs/{org}/playbooks: create a draft playbook (version 1).
pub async fn create_playbook(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
    Json(body): Json<CreatePlaybookBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let db = app.db.clone();
    let (playbook, version) = blocking(move || {
        db.create_playbook(org, body.definition, body.change_summary, Utc::now())
    })
    .await?;
    let mut json = serde_json::to_value(playbook)?;
    json["version"] = version.version.into();
    Ok((StatusCode::CREATED, Json(json)))
}

/// GET /api/orgs/{org}/playbooks/{id}
pub async fn get_playbook(
    State(app): State<AppState>,
    Path((org, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let db = app.db.clone();
    let (playbook, latest) = blocking(move || {
        let playbook = db.playbook(org, id)?;
        let latest = db.latest_version(id)?;
        Ok((playbook, latest))
    })
    .await?;
    let mut json = serde_json::to_value(playbook)?;
    json["version"] = latest.map(|v| v.version).into();
    Ok(Json(json))
}

#[derive(Deserialize)]
pub struct UpdatePlaybookBody {
    #[serde(flatten)]
    pub patch: PlaybookPatch,
    #[serde(default)]
    pub change_summary: Option<String>,
}

/// PUT /api/orgs/{org}/playbooks/{id}: partial update, appends a version.
pub async fn update_playbook(
    State(app): State<AppState>,
    Path((org, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdatePlaybookBody>,
) -> Result<Json<Value>, AppError> {
    let db = app.db.clone();
    let (playbook, version) = blocking(move || {
        db.update_playbook(org, id, body.patch, body.change_summary, Utc::now())
    })
    .await?;
    let mut json = serde_json::to_value(playbook)?;
    json["version"] = version.version.into();
    Ok(Json(json))
}

/// POST /api/orgs/{org}/playbooks/{id}/activate
pub async fn activate_playbook(
    State(app): State<AppState>,
    Path((org, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let db = app.db.clone();
    let playbook = blocking(move || db.activate_playbook(org, id, Utc::now())).await?;
    Ok(Json(serde_json::to_value(playbook)?))
}

/// POST /api/orgs/{org}/playbooks/{id}/pause
pub async fn pause_playbook(
    State(app): State<AppState>,
    Path((org, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let db = app.db.clone();
    let playbook = blocking(move || db.pause_playbook(org, id, Utc::now())).await?;
    Ok(Json(serde_json::to_value(playbook)?))
}

/// POST /api/orgs/{org}/playbooks/{id}/archive
pub async fn archive_playbook(
    State(app): State<AppState>,
    Path((org, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let db = app.db.clone();
    let playbook = blocking(move || db.archive_playbook(org, id, Utc::now())).await?;
    Ok(Json(serde_json::to_value(playbook)?))
}

/// GET /api/orgs/{org}/playbooks/{id}/versions: ascending version history.
pub async fn list_versions(
    State(app): State<AppState>,
    Path((org, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let db = app.db.clone();
    let versions = blocking(move || {
        db.playbook(org, id)?;
        db.playbook_versions(id)
    })
    .await?;
    Ok(Json(serde_json::to_value(versions)?))
}

#[derive(Deserialize)]
pub struct TriggerBody {
    #[serde(default)]
    pub member_id: Option<Uuid>,
    #[serde(default)]
    pub lead_id: Option<Uuid>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// POST /api/orgs/{org}/playbooks/{id}/trigger: record a pending execution
/// and enqueue it. Returns 202 without waiting for processing.
pub async fn trigger_playbook(
    State(app): State<AppState>,
    Path((org, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<TriggerBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let db = app.db.clone();
    let execution = match (body.member_id, body.lead_id) {
        (Some(member_id), None) => {
            blocking(move || {
                retention_core::dispatch::trigger_for_member(
                    &db,
                    org,
                    member_id,
                    id,
                    body.context,
                    Utc::now(),
                )
            })
            .await?
        }
        (None, Some(lead_id)) => {
            blocking(move || {
                retention_core::dispatch::trigger_for_lead(
                    &db,
                    org,
                    lead_id,
                    id,
                    body.context,
                    Utc::now(),
                )
            })
            .await?
        }
        _ => return Err(AppError::bad_request("exactly one of member_id or lead_id is required")),
    };
    Ok((StatusCode::ACCEPTED, Json(serde_json::to_value(execution)?)))
}

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

fn settings_view(
    db: &retention_core::store::RetentionDb,
    org: Uuid,
) -> retention_core::Result<serde_json::Value> {
    let overrides = db.list_settings(org)?;
    let resolved = db.resolve_settings(org)?;
    Ok(serde_json::json!({
        "overrides": overrides,
        "resolved": resolved,
    }))
}

/// GET /api/orgs/{org}/settings: stored overrides and the resolved result.
pub async fn get_settings(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let view = blocking(move || settings_view(&db, org)).await?;
    Ok(Json(view))
}

/// PUT /api/orgs/{org}/settings/{key}: body is the raw JSON override value.
pub async fn put_setting(
    State(app): State<AppState>,
    Path((org, key)): Path<(Uuid, String)>,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let view = blocking(move || {
        db.set_setting(org, &key, &value)?;
        settings_view(&db, org)
    })
    .await?;
    Ok(Json(view))
}

/// DELETE /api/orgs/{org}/settings/{key}: drop an override.
pub async fn delete_setting(
    State(app): State<AppState>,
    Path((org, key)): Path<(Uuid, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let (removed, view) = blocking(move || {
        let removed = db.clear_setting(org, &key)?;
        Ok((removed, settings_view(&db, org)?))
    })
    .await?;
    let mut body = view;
    body["removed"] = serde_json::Value::Bool(removed);
    Ok(Json(body))
}

use axum::extract::{Path, State};
use axum::Json;
use retention_core::campaigns::{self, DEFAULT_WIN_BACK_DAYS};
use serde::Deserialize;
use uuid::Uuid;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WinBackBody {
    #[serde(default)]
    pub days: Option<u32>,
}

/// POST /api/orgs/{org}/win-back: trigger win-back for recent cancellations.
pub async fn win_back(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
    Json(body): Json<WinBackBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let days = body.days.unwrap_or(DEFAULT_WIN_BACK_DAYS);
    let db = app.db.clone();
    let triggered =
        blocking(move || campaigns::run_win_back(&db, org, days, chrono::Utc::now())).await?;
    Ok(Json(serde_json::json!({ "days": days, "triggered": triggered })))
}

/// POST /api/orgs/{org}/members/{id}/freeze-intent: run freeze rescue.
///
/// `execution` is null when the organization has no active freeze playbook.
pub async fn freeze_intent(
    State(app): State<AppState>,
    Path((org, member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let execution = blocking(move || {
        campaigns::freeze_rescue(&db, org, member_id, chrono::Utc::now())
    })
    .await?;
    Ok(Json(serde_json::json!({ "execution": execution })))
}

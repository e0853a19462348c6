use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// POST /api/orgs/{org}/risk/recalculate: rescore every member.
pub async fn recalculate(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let scored = blocking(move || {
        retention_core::risk::calculate_for_organization(&db, org, chrono::Utc::now())
    })
    .await?;
    Ok(Json(serde_json::json!({ "scored": scored })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RosterQuery {
    #[serde(default)]
    pub class_type: Option<String>,
}

/// GET /api/orgs/{org}/risk/roster?class_type=: scored members and heatmap.
pub async fn roster(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
    Query(q): Query<RosterQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let roster = blocking(move || {
        retention_core::campaigns::roster(&db, org, q.class_type.as_deref())
    })
    .await?;
    Ok(Json(serde_json::to_value(roster)?))
}

/// GET /api/orgs/{org}/members/{id}/risk: live score, band, and history.
pub async fn member_risk(
    State(app): State<AppState>,
    Path((org, member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let (risk, history) = blocking(move || {
        db.member(org, member_id)?;
        let risk = retention_core::risk::member_risk(&db, org, member_id)?;
        let history = db.risk_history(member_id)?;
        Ok((risk, history))
    })
    .await?;

    let Some(risk) = risk else {
        return Err(AppError::not_found(format!("member {member_id} has not been scored")));
    };
    let mut body = serde_json::to_value(risk)?;
    body["history"] = serde_json::to_value(history)?;
    Ok(Json(body))
}

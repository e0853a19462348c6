use axum::extract::{Path, State};
use axum::Json;
use retention_core::policy::CommunicationPolicy;
use uuid::Uuid;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/orgs/{org}/policy: stored policy, or the default.
pub async fn get_policy(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
) -> Result<Json<CommunicationPolicy>, AppError> {
    let db = app.db.clone();
    let policy = blocking(move || db.policy(org)).await?;
    Ok(Json(policy))
}

/// PUT /api/orgs/{org}/policy: replace the policy. Omitted fields take their defaults.
pub async fn put_policy(
    State(app): State<AppState>,
    Path(org): Path<Uuid>,
    Json(policy): Json<CommunicationPolicy>,
) -> Result<Json<CommunicationPolicy>, AppError> {
    let db = app.db.clone();
    let policy = blocking(move || {
        db.set_policy(org, &policy)?;
        Ok(policy)
    })
    .await?;
    Ok(Json(policy))
}

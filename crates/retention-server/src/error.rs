use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use retention_core::RetentionError;

// ---------------------------------------------------------------------------
// Sentinels for statuses that have no RetentionError variant
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Always renders `{"error": "..."}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequestError>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if self.0.downcast_ref::<NotFoundError>().is_some() {
            return StatusCode::NOT_FOUND;
        }
        match self.0.downcast_ref::<RetentionError>() {
            Some(e) => match e {
                RetentionError::MemberNotFound(_)
                | RetentionError::LeadNotFound(_)
                | RetentionError::PlaybookNotFound(_)
                | RetentionError::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
                RetentionError::PlaybookArchived(_) => StatusCode::CONFLICT,
                RetentionError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                RetentionError::Invalid { .. } | RetentionError::NotInitialized => {
                    StatusCode::BAD_REQUEST
                }
                RetentionError::Store(_)
                | RetentionError::Io(_)
                | RetentionError::Yaml(_)
                | RetentionError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: RetentionError) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn not_found_variants_map_to_404() {
        assert_eq!(status_of(RetentionError::MemberNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(RetentionError::PlaybookNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(RetentionError::ExecutionNotFound(Uuid::nil())),
            StatusCode::NOT_FOUND,
        );
    }

    #[test]
    fn archived_maps_to_409() {
        assert_eq!(status_of(RetentionError::PlaybookArchived(Uuid::nil())), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_transition_maps_to_422() {
        let err = RetentionError::InvalidTransition {
            from: "draft".into(),
            to: "paused".into(),
            reason: "only active playbooks can be paused".into(),
        };
        assert_eq!(status_of(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(status_of(RetentionError::invalid("name", "empty")), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::bad_request("pick one").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn store_and_foreign_errors_map_to_500() {
        assert_eq!(
            status_of(RetentionError::Store("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_constructor_maps_to_404() {
        assert_eq!(
            AppError::not_found("member not scored").into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}

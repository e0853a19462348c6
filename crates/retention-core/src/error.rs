use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("not initialized: run 'retention init'")]
    NotInitialized,

    #[error("member not found: {0}")]
    MemberNotFound(Uuid),

    #[error("lead not found: {0}")]
    LeadNotFound(Uuid),

    #[error("playbook not found: {0}")]
    PlaybookNotFound(Uuid),

    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("playbook {0} is archived")]
    PlaybookArchived(Uuid),

    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RetentionError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RetentionError>;

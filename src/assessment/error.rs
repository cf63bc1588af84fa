use axum::{response::IntoResponse, Json};

use crate::configuration::ConfigurationError;
use crate::core::shared::models::AssessmentStatus;
use crate::core::shared::utils::StorageFailure;
use crate::directory::DirectoryError;
use crate::framework::FrameworkError;
use crate::security::RbacError;

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Cannot change assessment status from {from} to {to}")]
    InvalidTransition {
        from: AssessmentStatus,
        to: AssessmentStatus,
    },
    #[error("Assessment is not complete")]
    Incomplete,
    #[error(transparent)]
    Access(#[from] RbacError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Framework(#[from] FrameworkError),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<StorageFailure> for AssessmentError {
    fn from(e: StorageFailure) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<DirectoryError> for AssessmentError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::NotFound(what) => Self::NotFound(what),
            DirectoryError::Access(e) => Self::Access(e),
            DirectoryError::Validation(message) => Self::Validation(message),
            DirectoryError::Duplicate(_) => Self::Validation(e.to_string()),
            DirectoryError::Database(message) => Self::Database(message),
        }
    }
}

impl From<diesel::result::Error> for AssessmentError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl IntoResponse for AssessmentError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match self {
            Self::Access(e) => return e.into_response(),
            Self::Configuration(e) => return e.into_response(),
            Self::Framework(e) => return e.into_response(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidTransition { .. } | Self::Incomplete => {
                StatusCode::BAD_REQUEST
            }
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

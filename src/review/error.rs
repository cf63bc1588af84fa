use axum::{response::IntoResponse, Json};

use crate::assessment::AssessmentError;
use crate::configuration::ConfigurationError;
use crate::core::shared::models::ReviewStatus;
use crate::core::shared::utils::StorageFailure;
use crate::directory::DirectoryError;
use crate::security::RbacError;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Cannot change review status from {from} to {to}")]
    InvalidTransition { from: ReviewStatus, to: ReviewStatus },
    #[error("The review has been updated by another user, reload and try again")]
    Conflict { expected: i32, actual: i32 },
    #[error(transparent)]
    Access(#[from] RbacError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<StorageFailure> for ReviewError {
    fn from(e: StorageFailure) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<DirectoryError> for ReviewError {
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

impl From<diesel::result::Error> for ReviewError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match self {
            Self::Access(e) => return e.into_response(),
            Self::Configuration(e) => return e.into_response(),
            Self::Assessment(e) => return e.into_response(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

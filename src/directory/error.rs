use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::core::shared::utils::{is_unique_violation, StorageFailure};
use crate::security::RbacError;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Access(#[from] RbacError),
    #[error("Database error: {0}")]
    Database(String),
}

impl DirectoryError {
    /// Maps a unique violation to `Duplicate(what)`, anything else to `Database`.
    pub fn from_diesel(e: diesel::result::Error, what: impl Into<String>) -> Self {
        if is_unique_violation(&e) {
            Self::Duplicate(what.into())
        } else {
            Self::Database(e.to_string())
        }
    }
}

impl From<StorageFailure> for DirectoryError {
    fn from(e: StorageFailure) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<diesel::result::Error> for DirectoryError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl IntoResponse for DirectoryError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            Self::Access(e) => return e.into_response(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Duplicate(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

use axum::{response::IntoResponse, Json};

use crate::core::shared::utils::StorageFailure;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("No assessment period is currently open")]
    NoCurrentPeriod,
    #[error("Invalid assessment period '{0}', expected YY/YY")]
    InvalidPeriod(String),
    #[error("Invalid assessment period end '{0}'")]
    InvalidDate(String),
    #[error("Unknown framework: {0}")]
    UnknownFramework(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<StorageFailure> for ConfigurationError {
    fn from(e: StorageFailure) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<diesel::result::Error> for ConfigurationError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl IntoResponse for ConfigurationError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::NoCurrentPeriod => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidPeriod(_)
            | Self::InvalidDate(_)
            | Self::UnknownFramework(_)
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

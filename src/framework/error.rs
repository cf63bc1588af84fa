use axum::{response::IntoResponse, Json};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("Failed to read framework file {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("Malformed framework '{framework}': {message}")]
    Parse { framework: String, message: String },
    #[error("Duplicate outcome '{outcome}' in framework '{framework}'")]
    DuplicateOutcome { framework: String, outcome: String },
    #[error("Duplicate indicator '{indicator}' in framework '{framework}'")]
    DuplicateIndicator { framework: String, indicator: String },
    #[error("Unknown indicator level '{0}'")]
    UnknownIndicatorLevel(String),
    #[error("No framework definitions found in {0}")]
    NoFrameworks(PathBuf),
    #[error("Unknown framework: {0}")]
    UnknownFramework(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl IntoResponse for FrameworkError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::UnknownFramework(_) | Self::InvalidStatus(_) | Self::InvalidKey(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

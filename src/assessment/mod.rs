//! Self-assessments and their draft → submitted → completed lifecycle.

pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod storage;
pub mod types;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use error::AssessmentError;
pub use lifecycle::{can_transition, change_status, check_transition, load_for_profile};
pub use storage::{AssessmentStore, InMemoryAssessmentStore, PgAssessmentStore};
pub use types::{Assessment, AssessmentResponse, CreateAssessmentRequest, NewAssessment};

pub fn configure_assessment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::ASSESSMENTS, post(handlers::handle_create_assessment))
        .route(ApiUrls::ASSESSMENT_BY_ID, get(handlers::handle_get_assessment))
        .route(ApiUrls::ASSESSMENT_OUTCOME, put(handlers::handle_save_outcome))
        .route(ApiUrls::ASSESSMENT_PROGRESS, get(handlers::handle_get_progress))
        .route(ApiUrls::ASSESSMENT_STATUS, post(handlers::handle_change_status))
}

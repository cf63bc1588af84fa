//! Assessor reviews of submitted assessments.

pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod snapshot;
pub mod storage;
pub mod types;
pub mod versioning;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use error::ReviewError;
pub use lifecycle::{
    all_reviews_completed, can_transition, check_editable, complete_assessment_if_done,
    is_visible, reviews_for_profile,
};
pub use storage::{InMemoryReviewStore, PgReviewStore, ReviewStore};
pub use types::{NewReview, Review, ReviewResponse, ReviewVersion};

pub fn configure_review_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::REVIEWS,
            get(handlers::handle_list_reviews).post(handlers::handle_create_review),
        )
        .route(ApiUrls::REVIEW_BY_ID, get(handlers::handle_get_review))
        .route(ApiUrls::REVIEW_SECTION, put(handlers::handle_update_section))
        .route(ApiUrls::REVIEW_SYSTEM, put(handlers::handle_update_system))
        .route(ApiUrls::REVIEW_STATUS, post(handlers::handle_change_status))
        .route(ApiUrls::REVIEW_VERSION, get(handlers::handle_get_version))
}

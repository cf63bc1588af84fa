use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::security::{AuthenticatedUser, ReviewAccess};

use super::error::ReviewError;
use super::lifecycle::{
    change_status, create_review, load_visible, reviews_for_profile, update_section, update_system,
};
use super::types::{
    CreateReviewRequest, Review, ReviewResponse, ReviewStatusRequest, ReviewVersion,
    SectionUpdateRequest, SystemFieldUpdateRequest,
};
use super::versioning::{all_versions, current_version_number, get_version};

fn authorize(state: &AppState, user: &AuthenticatedUser) -> Result<ReviewAccess, ReviewError> {
    Ok(state
        .review_access
        .authorize(user.current_profile.as_ref())?)
}

async fn respond(
    state: &AppState,
    access: &ReviewAccess,
    review: Review,
) -> Result<ReviewResponse, ReviewError> {
    let versions = state.reviews.versions(review.id).await?;
    Ok(ReviewResponse {
        current_version_number: current_version_number(&versions),
        all_versions: all_versions(versions),
        can_edit: access.can_edit,
        review,
    })
}

pub async fn handle_list_reviews(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Review>>, ReviewError> {
    let access = authorize(&state, &user)?;
    Ok(Json(reviews_for_profile(&state, &access.profile).await?))
}

pub async fn handle_create_review(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ReviewError> {
    let access = authorize(&state, &user)?;
    let review = create_review(&state, &user, &access, req).await?;
    Ok((StatusCode::CREATED, Json(respond(&state, &access, review).await?)))
}

pub async fn handle_get_review(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ReviewResponse>, ReviewError> {
    let access = authorize(&state, &user)?;
    let review = load_visible(&state, &access.profile, id).await?;
    Ok(Json(respond(&state, &access, review).await?))
}

pub async fn handle_update_section(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((id, section)): Path<(i64, String)>,
    Json(req): Json<SectionUpdateRequest>,
) -> Result<Json<ReviewResponse>, ReviewError> {
    let access = authorize(&state, &user)?;
    let review = update_section(
        &state,
        &user,
        &access,
        id,
        &section,
        req.data,
        req.expected_version,
    )
    .await?;
    Ok(Json(respond(&state, &access, review).await?))
}

pub async fn handle_update_system(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<SystemFieldUpdateRequest>,
) -> Result<Json<ReviewResponse>, ReviewError> {
    let access = authorize(&state, &user)?;
    let review = update_system(
        &state,
        &user,
        &access,
        id,
        &req.field,
        req.value,
        req.expected_version,
    )
    .await?;
    Ok(Json(respond(&state, &access, review).await?))
}

pub async fn handle_change_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<ReviewStatusRequest>,
) -> Result<Json<ReviewResponse>, ReviewError> {
    let access = authorize(&state, &user)?;
    let review = change_status(
        &state,
        &user,
        &access,
        id,
        req.status,
        req.reopen,
        req.expected_version,
    )
    .await?;
    Ok(Json(respond(&state, &access, review).await?))
}

pub async fn handle_get_version(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((id, number)): Path<(i64, i64)>,
) -> Result<Json<ReviewVersion>, ReviewError> {
    let access = authorize(&state, &user)?;
    let review = load_visible(&state, &access.profile, id).await?;
    let versions = state.reviews.versions(review.id).await?;
    get_version(&versions, number)
        .cloned()
        .map(Json)
        .ok_or_else(|| ReviewError::NotFound(format!("Version {} of review {}", number, id)))
}

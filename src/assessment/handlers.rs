use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::framework::{is_complete, objective_progress};
use crate::security::{AuthenticatedUser, PermissionUtil};

use super::error::AssessmentError;
use super::lifecycle::{change_status, load_for_profile, save_outcome, start_assessment};
use super::types::{
    Assessment, AssessmentProgress, AssessmentResponse, CreateAssessmentRequest,
    StatusChangeRequest,
};

fn respond(state: &AppState, assessment: Assessment) -> Result<AssessmentResponse, AssessmentError> {
    let framework = state.frameworks.get(&assessment.framework)?;
    let is_complete = is_complete(framework, &assessment.assessments_data);
    Ok(AssessmentResponse {
        assessment,
        is_complete,
    })
}

pub async fn handle_create_assessment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateAssessmentRequest>,
) -> Result<(StatusCode, Json<AssessmentResponse>), AssessmentError> {
    let assessment = start_assessment(&state, &user, req).await?;
    Ok((StatusCode::CREATED, Json(respond(&state, assessment)?)))
}

pub async fn handle_get_assessment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<AssessmentResponse>, AssessmentError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_view_assessments,
        "view assessments",
    )?;
    let assessment = load_for_profile(&state, id, profile).await?;
    Ok(Json(respond(&state, assessment)?))
}

pub async fn handle_save_outcome(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((id, code)): Path<(i64, String)>,
    Json(answers): Json<serde_json::Value>,
) -> Result<Json<AssessmentResponse>, AssessmentError> {
    let assessment = save_outcome(&state, &user, id, &code, answers).await?;
    Ok(Json(respond(&state, assessment)?))
}

pub async fn handle_get_progress(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<AssessmentProgress>, AssessmentError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_view_assessments,
        "view assessments",
    )?;
    let assessment = load_for_profile(&state, id, profile).await?;
    let framework = state.frameworks.get(&assessment.framework)?;

    Ok(Json(AssessmentProgress {
        assessment_id: assessment.id,
        is_complete: is_complete(framework, &assessment.assessments_data),
        objectives: objective_progress(
            framework,
            &assessment.assessments_data,
            assessment.caf_profile,
        ),
    }))
}

pub async fn handle_change_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<AssessmentResponse>, AssessmentError> {
    let assessment = change_status(&state, &user, id, req.status).await?;
    Ok(Json(respond(&state, assessment)?))
}

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::configuration::current_configuration;
use crate::core::shared::models::{AssessmentStatus, UserProfile};
use crate::core::shared::state::AppState;
use crate::framework::is_complete;
use crate::review::all_reviews_completed;
use crate::security::{AuthenticatedUser, PermissionUtil};

use super::error::AssessmentError;
use super::types::{Assessment, CreateAssessmentRequest, NewAssessment};

pub fn can_transition(from: AssessmentStatus, to: AssessmentStatus) -> bool {
    use AssessmentStatus::*;
    matches!(
        (from, to),
        (Draft, Submitted) | (Submitted, Completed) | (Draft, Cancelled) | (Submitted, Cancelled)
    )
}

pub fn check_transition(from: AssessmentStatus, to: AssessmentStatus) -> Result<(), AssessmentError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(AssessmentError::InvalidTransition { from, to })
    }
}

/// Loads an assessment whose system belongs to the profile's organisation.
/// Anything else is reported as not found.
pub async fn load_for_profile(
    state: &AppState,
    id: i64,
    profile: &UserProfile,
) -> Result<Assessment, AssessmentError> {
    let not_found = || AssessmentError::NotFound(format!("Assessment {}", id));
    let assessment = state.assessments.get(id).await?.ok_or_else(not_found)?;
    let system = state
        .directory
        .get_system(assessment.system_id)
        .await?
        .ok_or_else(not_found)?;
    if system.organisation_id != profile.organisation_id {
        return Err(not_found());
    }
    Ok(assessment)
}

pub async fn start_assessment(
    state: &AppState,
    user: &AuthenticatedUser,
    req: CreateAssessmentRequest,
) -> Result<Assessment, AssessmentError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_start_assessment,
        "start an assessment",
    )?;

    let system = state
        .directory
        .get_system(req.system_id)
        .await?
        .filter(|s| s.organisation_id == profile.organisation_id)
        .ok_or_else(|| AssessmentError::NotFound(format!("System {}", req.system_id)))?;

    let configuration = current_configuration(state.configurations.as_ref(), Utc::now()).await?;
    let framework = req
        .framework
        .unwrap_or_else(|| configuration.default_framework.clone());
    state.frameworks.get(&framework)?;

    let assessment = state
        .assessments
        .create(NewAssessment {
            system_id: system.id,
            assessment_period: configuration.current_assessment_period,
            status: AssessmentStatus::Draft,
            framework,
            caf_profile: req.caf_profile,
            review_type: req.review_type,
            assessments_data: Value::Object(Default::default()),
            created_by: Some(user.user_id),
            last_updated_by: Some(user.user_id),
        })
        .await?;

    info!(
        "Assessment {} started for system {} in period {}",
        assessment.id, system.id, assessment.assessment_period
    );
    Ok(assessment)
}

/// Stores the answers for one outcome while the assessment is still a draft.
pub async fn save_outcome(
    state: &AppState,
    user: &AuthenticatedUser,
    id: i64,
    outcome_code: &str,
    answers: Value,
) -> Result<Assessment, AssessmentError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_view_assessments,
        "edit assessments",
    )?;
    let assessment = load_for_profile(state, id, profile).await?;

    if assessment.status != AssessmentStatus::Draft {
        return Err(AssessmentError::Validation(format!(
            "Assessment is {} and can no longer be edited",
            assessment.status
        )));
    }
    if !answers.is_object() {
        return Err(AssessmentError::Validation(
            "Outcome answers must be a JSON object".to_string(),
        ));
    }
    let framework = state.frameworks.get(&assessment.framework)?;
    if framework.outcome(outcome_code).is_none() {
        return Err(AssessmentError::NotFound(format!("Outcome {}", outcome_code)));
    }

    let mut data = match assessment.assessments_data {
        Value::Object(map) => map,
        _ => Default::default(),
    };
    data.insert(outcome_code.to_string(), answers);

    state
        .assessments
        .update_data(id, Value::Object(data), Some(user.user_id))
        .await
}

/// Moves an assessment through its lifecycle on behalf of a user.
pub async fn change_status(
    state: &AppState,
    user: &AuthenticatedUser,
    id: i64,
    to: AssessmentStatus,
) -> Result<Assessment, AssessmentError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_submit_assessment,
        "change assessment status",
    )?;
    let assessment = load_for_profile(state, id, profile).await?;
    check_transition(assessment.status, to)?;

    match to {
        AssessmentStatus::Submitted => {
            let framework = state.frameworks.get(&assessment.framework)?;
            if !is_complete(framework, &assessment.assessments_data) {
                return Err(AssessmentError::Incomplete);
            }
        }
        AssessmentStatus::Completed => {
            let reviews = state
                .reviews
                .list_for_assessment(id)
                .await
                .map_err(|e| AssessmentError::Database(e.to_string()))?;
            if !all_reviews_completed(&reviews) {
                return Err(AssessmentError::Validation(
                    "Every active review must be completed first".to_string(),
                ));
            }
        }
        AssessmentStatus::Draft | AssessmentStatus::Cancelled => {}
    }

    let updated = state
        .assessments
        .set_status(id, to, Some(user.user_id))
        .await?;
    info!(
        "Assessment {} moved from {} to {}",
        id, assessment.status, updated.status
    );
    Ok(updated)
}

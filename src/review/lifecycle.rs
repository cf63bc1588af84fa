use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::assessment::{load_for_profile, Assessment};
use crate::configuration::current_assessment_period;
use crate::core::shared::models::{AssessmentStatus, Assessor, ReviewStatus, Role, UserProfile};
use crate::core::shared::state::AppState;
use crate::security::{mask_email, AuthenticatedUser, ReviewAccess};

use super::error::ReviewError;
use super::snapshot::{
    apply_system_edit, set_section, system_and_scope_confirmed, update_system_field, with_snapshot,
    EDITABLE_SYSTEM_FIELDS, SYSTEM_AND_SCOPE,
};
use super::types::{CreateReviewRequest, NewReview, Review, ReviewUpdate};

// ============================================================================
// Transitions
// ============================================================================

pub fn can_transition(from: ReviewStatus, to: ReviewStatus) -> bool {
    use ReviewStatus::*;
    match (from, to) {
        (ToDo, InProgress)
        | (InProgress, Clarify)
        | (Clarify, InProgress)
        | (InProgress, Completed) => true,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

pub fn check_transition(from: ReviewStatus, to: ReviewStatus) -> Result<(), ReviewError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(ReviewError::InvalidTransition { from, to })
    }
}

/// Only a completed review can be reopened, and it goes back to in progress.
pub fn reopen_target(from: ReviewStatus) -> Result<ReviewStatus, ReviewError> {
    match from {
        ReviewStatus::Completed => Ok(ReviewStatus::InProgress),
        other => Err(ReviewError::Validation(format!(
            "Only a completed review can be reopened, this one is {}",
            other
        ))),
    }
}

/// True when at least one review is completed and every review that is not
/// cancelled is completed.
pub fn all_reviews_completed(reviews: &[Review]) -> bool {
    let active: Vec<&Review> = reviews
        .iter()
        .filter(|r| r.status != ReviewStatus::Cancelled)
        .collect();
    !active.is_empty() && active.iter().all(|r| r.status == ReviewStatus::Completed)
}

/// Guards applied before any review save.
pub fn check_editable(
    review: &Review,
    new_data: &Value,
    can_edit: bool,
    expected_version: Option<i32>,
) -> Result<(), ReviewError> {
    if !can_edit {
        return Err(ReviewError::Validation(
            "You do not have permission to modify this review".to_string(),
        ));
    }
    if review.status == ReviewStatus::Completed && &review.review_data != new_data {
        return Err(ReviewError::Validation(
            "A completed review cannot be modified, reopen it first".to_string(),
        ));
    }
    check_version(review, expected_version)
}

pub fn check_version(review: &Review, expected_version: Option<i32>) -> Result<(), ReviewError> {
    match expected_version {
        Some(expected) if expected != review.version => Err(ReviewError::Conflict {
            expected,
            actual: review.version,
        }),
        _ => Ok(()),
    }
}

// ============================================================================
// Visibility
// ============================================================================

/// Whether `profile` may see a review of `assessment` made by `assessor`.
///
/// The assessor must be active, and the assessment must be submitted, in the
/// current period and for a system in the profile's organisation. Organisation
/// leads and cyber advisors see every such review. Other roles also need to be
/// a member of an assessor in their own organisation.
pub fn is_visible(
    profile: &UserProfile,
    period: &str,
    assessment: &Assessment,
    system_organisation_id: i64,
    assessor: Option<&Assessor>,
) -> bool {
    let Some(assessor) = assessor else {
        return false;
    };
    let base = assessor.is_active
        && assessment.status == AssessmentStatus::Submitted
        && system_organisation_id == profile.organisation_id
        && assessment.assessment_period == period;
    if !base {
        return false;
    }
    match profile.role {
        Role::OrganisationLead | Role::CyberAdvisor => true,
        _ => assessor.has_member(profile.id) && assessor.organisation_id == profile.organisation_id,
    }
}

/// Reviews the profile may see in the current assessment period.
pub async fn reviews_for_profile(
    state: &AppState,
    profile: &UserProfile,
) -> Result<Vec<Review>, ReviewError> {
    let period = current_assessment_period(state.configurations.as_ref(), Utc::now()).await?;
    let system_ids: Vec<i64> = state
        .directory
        .systems_for_organisation(profile.organisation_id)
        .await?
        .iter()
        .map(|s| s.id)
        .collect();
    let assessments: HashMap<i64, Assessment> = state
        .assessments
        .list_for_systems(&system_ids, &period, Some(AssessmentStatus::Submitted))
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();
    let assessment_ids: Vec<i64> = assessments.keys().copied().collect();

    let mut assessors: HashMap<i64, Option<Assessor>> = HashMap::new();
    let mut visible = Vec::new();
    for review in state.reviews.list_for_assessments(&assessment_ids).await? {
        let Some(assessment) = assessments.get(&review.assessment_id) else {
            continue;
        };
        let assessor = match review.assessed_by_id {
            Some(id) => {
                if !assessors.contains_key(&id) {
                    assessors.insert(id, state.directory.get_assessor(id).await?);
                }
                assessors.get(&id).and_then(Option::as_ref)
            }
            None => None,
        };
        // Systems were listed for this organisation.
        if is_visible(profile, &period, assessment, profile.organisation_id, assessor) {
            visible.push(review);
        }
    }
    Ok(visible)
}

/// Loads a review the profile may see. Anything else is reported as not found.
pub async fn load_visible(
    state: &AppState,
    profile: &UserProfile,
    id: i64,
) -> Result<Review, ReviewError> {
    let not_found = || ReviewError::NotFound(format!("Review {}", id));
    let review = state.reviews.get(id).await?.ok_or_else(not_found)?;
    let assessment = state
        .assessments
        .get(review.assessment_id)
        .await?
        .ok_or_else(not_found)?;
    let system = state
        .directory
        .get_system(assessment.system_id)
        .await?
        .ok_or_else(not_found)?;
    let assessor = match review.assessed_by_id {
        Some(assessor_id) => state.directory.get_assessor(assessor_id).await?,
        None => None,
    };
    let period = current_assessment_period(state.configurations.as_ref(), Utc::now()).await?;

    if !is_visible(profile, &period, &assessment, system.organisation_id, assessor.as_ref()) {
        return Err(not_found());
    }
    Ok(review)
}

// ============================================================================
// Operations
// ============================================================================

fn require_edit(access: &ReviewAccess) -> Result<(), ReviewError> {
    if access.can_edit {
        Ok(())
    } else {
        warn!("Read-only role {} attempted a review change", access.profile.role);
        Err(ReviewError::Validation(
            "You do not have permission to modify this review".to_string(),
        ))
    }
}

pub async fn create_review(
    state: &AppState,
    user: &AuthenticatedUser,
    access: &ReviewAccess,
    req: CreateReviewRequest,
) -> Result<Review, ReviewError> {
    require_edit(access)?;

    let assessment = load_for_profile(state, req.assessment_id, &access.profile).await?;
    if assessment.status != AssessmentStatus::Submitted {
        return Err(ReviewError::Validation(format!(
            "Assessment {} is {} and cannot be reviewed",
            assessment.id, assessment.status
        )));
    }
    let assessor = state
        .directory
        .get_assessor(req.assessor_id)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| ReviewError::Validation(format!("Assessor {} is not active", req.assessor_id)))?;

    let review_data = if req.status == ReviewStatus::ToDo {
        let not_found = || ReviewError::NotFound(format!("System {}", assessment.system_id));
        let system = state
            .directory
            .get_system(assessment.system_id)
            .await?
            .ok_or_else(not_found)?;
        let organisation = state
            .directory
            .get_organisation(system.organisation_id)
            .await?
            .ok_or_else(not_found)?;
        with_snapshot(req.review_data, &assessment, &system, &organisation, &assessor)
    } else {
        req.review_data
            .unwrap_or_else(|| Value::Object(Default::default()))
    };

    let review = state
        .reviews
        .create(
            NewReview {
                assessment_id: assessment.id,
                assessed_by_id: Some(assessor.id),
                status: req.status,
                review_data,
                last_updated_by: Some(user.user_id),
            },
            state.config.review.single_review_per_assessment,
        )
        .await?;
    info!(
        "Review {} created for assessment {} by assessor {}",
        review.id, assessment.id, assessor.id
    );
    Ok(review)
}

/// Stores one assessor response section.
pub async fn update_section(
    state: &AppState,
    user: &AuthenticatedUser,
    access: &ReviewAccess,
    id: i64,
    section: &str,
    body: Value,
    expected_version: Option<i32>,
) -> Result<Review, ReviewError> {
    let review = load_visible(state, &access.profile, id).await?;

    let mut data = review.review_data.clone();
    set_section(&mut data, section, body);
    check_editable(&review, &data, access.can_edit, expected_version)?;

    let status = if section == SYSTEM_AND_SCOPE
        && review.status == ReviewStatus::ToDo
        && system_and_scope_confirmed(&data)
    {
        ReviewStatus::InProgress
    } else {
        review.status
    };

    state
        .reviews
        .save(ReviewUpdate {
            id,
            status,
            review_data: data,
            updated_by: Some(user.user_id),
            expected_version,
        })
        .await
}

/// Corrects a system field from the review, updating both the system record
/// and the review snapshot.
pub async fn update_system(
    state: &AppState,
    user: &AuthenticatedUser,
    access: &ReviewAccess,
    id: i64,
    field: &str,
    value: Value,
    expected_version: Option<i32>,
) -> Result<Review, ReviewError> {
    if !EDITABLE_SYSTEM_FIELDS.contains(&field) {
        return Err(ReviewError::Validation(format!("Unknown system field '{}'", field)));
    }
    let review = load_visible(state, &access.profile, id).await?;
    let assessment = state
        .assessments
        .get(review.assessment_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound(format!("Assessment {}", review.assessment_id)))?;
    let original = state
        .directory
        .get_system(assessment.system_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound(format!("System {}", assessment.system_id)))?;
    let mut system = original.clone();

    let mut data = review.review_data.clone();
    apply_system_edit(
        &mut data,
        system.id,
        field,
        value.clone(),
        &user.email,
        Utc::now(),
    );
    check_editable(&review, &data, access.can_edit, expected_version)?;
    update_system_field(&mut system, field, &value)?;

    // The system row goes first so a name clash leaves the review untouched.
    state.directory.update_system(&system).await?;
    let saved = match state
        .reviews
        .save(ReviewUpdate {
            id,
            status: review.status,
            review_data: data,
            updated_by: Some(user.user_id),
            expected_version,
        })
        .await
    {
        Ok(saved) => saved,
        Err(e) => {
            if let Err(restore) = state.directory.update_system(&original).await {
                warn!(
                    "Could not restore system {} after a failed review save: {}",
                    original.id, restore
                );
            }
            return Err(e);
        }
    };

    info!(
        "System {} field {} updated from review {} by {}",
        system.id,
        field,
        id,
        mask_email(&user.email)
    );
    Ok(saved)
}

/// Moves a review to `to`, or reopens it when `reopen` is set.
pub async fn change_status(
    state: &AppState,
    user: &AuthenticatedUser,
    access: &ReviewAccess,
    id: i64,
    to: Option<ReviewStatus>,
    reopen: bool,
    expected_version: Option<i32>,
) -> Result<Review, ReviewError> {
    require_edit(access)?;
    let review = load_visible(state, &access.profile, id).await?;

    let target = match (reopen, to) {
        (true, _) => reopen_target(review.status)?,
        (false, Some(to)) => {
            check_transition(review.status, to)?;
            to
        }
        (false, None) => {
            return Err(ReviewError::Validation(
                "Either a status or reopen is required".to_string(),
            ))
        }
    };
    check_version(&review, expected_version)?;
    if target == ReviewStatus::Completed {
        check_assessment_completable(state, &review).await?;
    }

    let saved = state
        .reviews
        .save(ReviewUpdate {
            id,
            status: target,
            review_data: review.review_data.clone(),
            updated_by: Some(user.user_id),
            expected_version,
        })
        .await?;
    info!("Review {} moved from {} to {}", id, review.status, saved.status);

    if saved.status == ReviewStatus::Completed {
        // The review is already stored, so a late conflict leaves the assessment submitted.
        if let Err(e) = complete_assessment_if_done(state, saved.assessment_id, user.user_id).await {
            warn!(
                "Assessment {} not completed after review {}: {}",
                saved.assessment_id, saved.id, e
            );
        }
    }
    Ok(saved)
}

/// Rejects completing `review` when that would complete an assessment whose
/// system already has a completed assessment in the same period.
pub async fn check_assessment_completable(
    state: &AppState,
    review: &Review,
) -> Result<(), ReviewError> {
    let Some(assessment) = state.assessments.get(review.assessment_id).await? else {
        return Ok(());
    };
    if assessment.status != AssessmentStatus::Submitted {
        return Ok(());
    }
    let mut reviews = state.reviews.list_for_assessment(assessment.id).await?;
    for other in reviews.iter_mut().filter(|r| r.id == review.id) {
        other.status = ReviewStatus::Completed;
    }
    if !all_reviews_completed(&reviews) {
        return Ok(());
    }
    let completed = state
        .assessments
        .list_for_systems(
            &[assessment.system_id],
            &assessment.assessment_period,
            Some(AssessmentStatus::Completed),
        )
        .await?;
    if completed.iter().any(|a| a.id != assessment.id) {
        return Err(ReviewError::Validation(format!(
            "System {} already has a completed assessment for {}",
            assessment.system_id, assessment.assessment_period
        )));
    }
    Ok(())
}

/// Completes a submitted assessment once all of its reviews are done.
pub async fn complete_assessment_if_done(
    state: &AppState,
    assessment_id: i64,
    user_id: i64,
) -> Result<bool, ReviewError> {
    let Some(assessment) = state.assessments.get(assessment_id).await? else {
        return Ok(false);
    };
    if assessment.status != AssessmentStatus::Submitted {
        return Ok(false);
    }
    let reviews = state.reviews.list_for_assessment(assessment_id).await?;
    if !all_reviews_completed(&reviews) {
        return Ok(false);
    }
    state
        .assessments
        .set_status(assessment_id, AssessmentStatus::Completed, Some(user_id))
        .await?;
    info!("Assessment {} completed after its reviews", assessment_id);
    Ok(true)
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::core::shared::models::{Organisation, Role, System};
use crate::core::shared::state::AppState;
use crate::security::{mask_email, AuthenticatedUser, PermissionUtil};

use super::error::DirectoryError;
use super::types::{
    CreateOrganisationRequest, CreateProfileRequest, CreateSystemRequest, NewOrganisation,
    NewSystem, ProfileSummary,
};
use super::find_or_create_user;

fn required(value: &str, field: &str) -> Result<String, DirectoryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DirectoryError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

pub async fn handle_create_organisation(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateOrganisationRequest>,
) -> Result<(StatusCode, Json<Organisation>), DirectoryError> {
    PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_create_organisation,
        "register organisations",
    )?;
    let organisation = state
        .directory
        .create_organisation(NewOrganisation {
            name: required(&req.name, "Name")?,
            organisation_type: req.organisation_type,
            parent_organisation_id: req.parent_organisation_id,
        })
        .await?;
    info!("Organisation {} registered", organisation.id);
    Ok((StatusCode::CREATED, Json(organisation)))
}

pub async fn handle_list_systems(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<System>>, DirectoryError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_view_systems,
        "view systems",
    )?;
    Ok(Json(
        state
            .directory
            .systems_for_organisation(profile.organisation_id)
            .await?,
    ))
}

pub async fn handle_create_system(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateSystemRequest>,
) -> Result<(StatusCode, Json<System>), DirectoryError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_create_system,
        "create systems",
    )?;
    let system = state
        .directory
        .create_system(NewSystem {
            organisation_id: profile.organisation_id,
            name: required(&req.name, "System name")?,
            description: req.description,
            last_assessed: req.last_assessed,
            hosting_type: req.hosting_type,
            corporate_services: req.corporate_services,
        })
        .await?;
    info!(
        "System {} created in organisation {}",
        system.id, system.organisation_id
    );
    Ok((StatusCode::CREATED, Json(system)))
}

pub async fn handle_list_profiles(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ProfileSummary>>, DirectoryError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_view_users,
        "view users",
    )?;
    let mut summaries = Vec::new();
    for member in state
        .directory
        .profiles_for_organisation(profile.organisation_id)
        .await?
    {
        if let Some(person) = state.directory.get_user(member.user_id).await? {
            summaries.push(ProfileSummary::new(member, person));
        }
    }
    Ok(Json(summaries))
}

/// Adds a person to the current organisation, creating their user record if needed.
pub async fn handle_create_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<ProfileSummary>), DirectoryError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_create_user,
        "create users",
    )?;
    // Advisor profiles are only granted by administrators.
    if req.role == Role::CyberAdvisor {
        return Err(DirectoryError::Validation(
            "The cyber advisor role cannot be assigned here".to_string(),
        ));
    }
    let email = required(&req.email, "Email")?;
    if !email.contains('@') {
        return Err(DirectoryError::Validation(format!("'{}' is not an email address", email)));
    }

    let person = find_or_create_user(
        state.directory.as_ref(),
        &email,
        req.first_name.trim(),
        req.last_name.trim(),
    )
    .await?;
    let created = state
        .directory
        .create_profile(person.id, profile.organisation_id, req.role)
        .await?;
    info!(
        "Profile {} ({}) added for {}",
        created.id,
        created.role,
        mask_email(&person.email)
    );
    Ok((StatusCode::CREATED, Json(ProfileSummary::new(created, person))))
}

/// Removes a profile from the current organisation. The user record stays.
pub async fn handle_delete_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, DirectoryError> {
    let profile = PermissionUtil::require(
        user.current_profile.as_ref(),
        PermissionUtil::can_delete_user,
        "remove users",
    )?;
    let not_found = || DirectoryError::NotFound(format!("Profile {}", id));
    let target = state
        .directory
        .get_profile(id)
        .await?
        .filter(|p| p.organisation_id == profile.organisation_id)
        .ok_or_else(not_found)?;
    if target.id == profile.id {
        return Err(DirectoryError::Validation(
            "You cannot remove the profile you are using".to_string(),
        ));
    }
    if !state.directory.delete_profile(target.id).await? {
        return Err(not_found());
    }
    info!("Profile {} removed from organisation {}", target.id, target.organisation_id);
    Ok(StatusCode::NO_CONTENT)
}

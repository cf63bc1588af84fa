use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::collections::HashSet;
use tracing::warn;

use crate::core::shared::models::{Role, UserProfile};
use crate::core::urls::PageUrls;

/// Who may open review pages, and who may only read them.
#[derive(Debug, Clone)]
pub struct ReviewAccessPolicy {
    pub allowed_roles: HashSet<Role>,
    pub read_only_roles: HashSet<Role>,
    pub login_redirect: String,
}

impl Default for ReviewAccessPolicy {
    fn default() -> Self {
        Self {
            allowed_roles: [
                Role::CyberAdvisor,
                Role::OrganisationLead,
                Role::Reviewer,
                Role::Assessor,
            ]
            .into_iter()
            .collect(),
            read_only_roles: [Role::OrganisationLead].into_iter().collect(),
            login_redirect: PageUrls::OIDC_AUTHENTICATE.to_string(),
        }
    }
}

/// A profile that passed the review access check.
#[derive(Debug, Clone)]
pub struct ReviewAccess {
    pub profile: UserProfile,
    pub can_edit: bool,
}

impl ReviewAccessPolicy {
    pub fn is_allowed(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }

    pub fn can_edit(&self, role: Role) -> bool {
        !self.read_only_roles.contains(&role)
    }

    pub fn authorize(&self, profile: Option<&UserProfile>) -> Result<ReviewAccess, RbacError> {
        let Some(profile) = profile else {
            warn!("Review access without a current profile");
            return Err(RbacError::LoginRequired(self.login_redirect.clone()));
        };
        if !self.is_allowed(profile.role) {
            warn!("Role {} is not allowed to access reviews", profile.role);
            return Err(RbacError::LoginRequired(self.login_redirect.clone()));
        }
        Ok(ReviewAccess {
            profile: profile.clone(),
            can_edit: self.can_edit(profile.role),
        })
    }
}

// ============================================================================
// Permission checks
// ============================================================================

/// Role checks for organisation-level actions. Every check fails without a profile.
pub struct PermissionUtil;

impl PermissionUtil {
    fn has_role(profile: Option<&UserProfile>, roles: &[Role]) -> bool {
        profile.is_some_and(|p| roles.contains(&p.role))
    }

    pub fn can_create_organisation(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::CyberAdvisor])
    }

    pub fn can_create_system(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::CyberAdvisor])
    }

    pub fn can_view_systems(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::CyberAdvisor])
    }

    pub fn can_create_user(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::CyberAdvisor, Role::OrganisationLead])
    }

    pub fn can_delete_user(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::CyberAdvisor, Role::OrganisationLead])
    }

    pub fn can_view_users(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::CyberAdvisor, Role::OrganisationLead])
    }

    pub fn can_start_assessment(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::OrganisationLead])
    }

    pub fn can_view_assessments(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::OrganisationLead, Role::OrganisationUser])
    }

    pub fn can_submit_assessment(profile: Option<&UserProfile>) -> bool {
        Self::has_role(profile, &[Role::OrganisationLead])
    }

    /// Returns the profile when `check` passes.
    pub fn require<'a>(
        profile: Option<&'a UserProfile>,
        check: fn(Option<&UserProfile>) -> bool,
        action: &str,
    ) -> Result<&'a UserProfile, RbacError> {
        match profile {
            Some(p) if check(Some(p)) => Ok(p),
            Some(p) => {
                warn!("Role {} denied: {}", p.role, action);
                Err(RbacError::PermissionDenied(format!("Not permitted to {}", action)))
            }
            None => Err(RbacError::PermissionDenied("No profile selected".to_string())),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RbacError {
    #[error("Login required")]
    LoginRequired(String),
    #[error("{0}")]
    PermissionDenied(String),
}

impl IntoResponse for RbacError {
    fn into_response(self) -> Response {
        match self {
            Self::LoginRequired(location) => Redirect::to(&location).into_response(),
            Self::PermissionDenied(message) => {
                let body = serde_json::json!({
                    "error": "access_denied",
                    "message": message,
                    "code": "RBAC_DENIED"
                });
                (StatusCode::FORBIDDEN, Json(body)).into_response()
            }
        }
    }
}

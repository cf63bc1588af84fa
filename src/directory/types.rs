use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::models::{Role, User, UserProfile};
use crate::core::shared::schema::{organisations, systems};

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = organisations)]
pub struct NewOrganisation {
    pub name: String,
    pub organisation_type: Option<String>,
    pub parent_organisation_id: Option<i64>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = systems)]
pub struct NewSystem {
    pub organisation_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub last_assessed: Option<String>,
    pub hosting_type: Vec<String>,
    pub corporate_services: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganisationRequest {
    pub name: String,
    pub organisation_type: Option<String>,
    pub parent_organisation_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSystemRequest {
    pub name: String,
    pub description: Option<String>,
    pub last_assessed: Option<String>,
    #[serde(default)]
    pub hosting_type: Vec<String>,
    #[serde(default)]
    pub corporate_services: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProfileRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// A profile in the organisation together with the person it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: i64,
    pub user_id: i64,
    pub organisation_id: i64,
    pub role: Role,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl ProfileSummary {
    pub fn new(profile: UserProfile, user: User) -> Self {
        Self {
            id: profile.id,
            user_id: profile.user_id,
            organisation_id: profile.organisation_id,
            role: profile.role,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

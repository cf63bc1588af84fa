//! Organisations, systems, users, profiles and assessing bodies.
//!
//! Cyber advisors register organisations and systems and manage the profiles
//! of their organisation. Users are created on first sign-in, and system
//! details can also be corrected from a review.

pub mod error;
pub mod handlers;
pub mod storage;
pub mod types;

use async_trait::async_trait;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::models::{Assessor, Organisation, Role, System, User, UserProfile};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::references::{generate_reference_with, PrimeSet};

pub use error::DirectoryError;
pub use storage::{InMemoryDirectory, PgDirectory};
pub use types::{
    CreateOrganisationRequest, CreateProfileRequest, CreateSystemRequest, NewOrganisation,
    NewSystem, ProfileSummary,
};

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn get_organisation(&self, id: i64) -> Result<Option<Organisation>, DirectoryError>;
    /// Inserts the row and assigns its reference.
    async fn create_organisation(&self, new: NewOrganisation) -> Result<Organisation, DirectoryError>;
    async fn get_system(&self, id: i64) -> Result<Option<System>, DirectoryError>;
    async fn systems_for_organisation(&self, organisation_id: i64) -> Result<Vec<System>, DirectoryError>;
    /// Inserts the row and assigns its reference. Names are unique per organisation.
    async fn create_system(&self, new: NewSystem) -> Result<System, DirectoryError>;
    async fn update_system(&self, system: &System) -> Result<(), DirectoryError>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, DirectoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    async fn create_user(&self, email: &str, first_name: &str, last_name: &str) -> Result<User, DirectoryError>;
    async fn get_profile(&self, id: i64) -> Result<Option<UserProfile>, DirectoryError>;
    async fn profiles_for_user(&self, user_id: i64) -> Result<Vec<UserProfile>, DirectoryError>;
    async fn profiles_for_organisation(&self, organisation_id: i64) -> Result<Vec<UserProfile>, DirectoryError>;
    /// One profile per user and organisation.
    async fn create_profile(
        &self,
        user_id: i64,
        organisation_id: i64,
        role: Role,
    ) -> Result<UserProfile, DirectoryError>;
    /// Returns false when there was no such profile.
    async fn delete_profile(&self, id: i64) -> Result<bool, DirectoryError>;
    async fn get_assessor(&self, id: i64) -> Result<Option<Assessor>, DirectoryError>;
}

/// Find the local user for an SSO identity, creating it on first sign-in.
pub async fn find_or_create_user(
    directory: &dyn DirectoryStore,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<User, DirectoryError> {
    if let Some(user) = directory.find_user_by_email(email).await? {
        return Ok(user);
    }
    directory.create_user(email, first_name, last_name).await
}

pub(crate) fn reference_for(id: i64, prime_set: PrimeSet) -> Option<String> {
    u64::try_from(id)
        .ok()
        .and_then(|pk| generate_reference_with(pk, prime_set).ok())
}

pub(crate) fn duplicate_system(name: &str) -> DirectoryError {
    DirectoryError::Duplicate(format!("A system named '{}'", name))
}

pub fn configure_directory_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::ORGANISATIONS, post(handlers::handle_create_organisation))
        .route(
            ApiUrls::SYSTEMS,
            get(handlers::handle_list_systems).post(handlers::handle_create_system),
        )
        .route(
            ApiUrls::PROFILES,
            get(handlers::handle_list_profiles).post(handlers::handle_create_profile),
        )
        .route(ApiUrls::PROFILE_BY_ID, delete(handlers::handle_delete_profile))
}

use async_trait::async_trait;
use diesel::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::shared::models::{
    Assessor, DbAssessor, Organisation, Role, System, User, UserProfile,
};
use crate::core::shared::schema::{
    assessor_members, assessors, organisations, systems, user_profiles, users,
};
use crate::core::shared::utils::{with_connection, DbPool};
use crate::references::PrimeSet;

use super::error::DirectoryError;
use super::types::{NewOrganisation, NewSystem};
use super::{duplicate_system, reference_for, DirectoryStore};

// ============================================================================
// In-memory directory
// ============================================================================

#[derive(Debug, Default)]
struct DirectoryData {
    next_id: i64,
    organisations: HashMap<i64, Organisation>,
    systems: HashMap<i64, System>,
    users: HashMap<i64, User>,
    profiles: HashMap<i64, UserProfile>,
    assessors: HashMap<i64, Assessor>,
}

impl DirectoryData {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn system_name_taken(&self, id: i64, organisation_id: i64, name: &str) -> bool {
        self.systems
            .values()
            .any(|s| s.id != id && s.organisation_id == organisation_id && s.name == name)
    }

    fn insert_organisation(&mut self, new: NewOrganisation) -> Organisation {
        let id = self.allocate_id();
        let organisation = Organisation {
            id,
            name: new.name,
            reference: reference_for(id, PrimeSet::Organisation),
            organisation_type: new.organisation_type,
            parent_organisation_id: new.parent_organisation_id,
        };
        self.organisations.insert(id, organisation.clone());
        organisation
    }
}

/// Directory held in process memory. Used by tests and when no database is configured.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    data: Arc<RwLock<DirectoryData>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_organisation(&self, name: &str) -> Organisation {
        self.data.write().await.insert_organisation(NewOrganisation {
            name: name.to_string(),
            organisation_type: None,
            parent_organisation_id: None,
        })
    }

    /// Stores the system under a fresh id; the id on the argument is ignored.
    pub async fn add_system(&self, mut system: System) -> System {
        let mut data = self.data.write().await;
        system.id = data.allocate_id();
        data.systems.insert(system.id, system.clone());
        system
    }

    pub async fn add_user(&self, email: &str) -> User {
        let mut data = self.data.write().await;
        let user = User {
            id: data.allocate_id(),
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        data.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_profile(&self, user_id: i64, organisation_id: i64, role: Role) -> UserProfile {
        let mut data = self.data.write().await;
        let profile = UserProfile {
            id: data.allocate_id(),
            user_id,
            organisation_id,
            role,
        };
        data.profiles.insert(profile.id, profile.clone());
        profile
    }

    /// Stores the assessor under a fresh id; the id on the argument is ignored.
    pub async fn add_assessor(&self, mut assessor: Assessor) -> Assessor {
        let mut data = self.data.write().await;
        assessor.id = data.allocate_id();
        data.assessors.insert(assessor.id, assessor.clone());
        assessor
    }

    pub async fn set_assessor_active(&self, assessor_id: i64, is_active: bool) {
        let mut data = self.data.write().await;
        if let Some(assessor) = data.assessors.get_mut(&assessor_id) {
            assessor.is_active = is_active;
        }
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectory {
    async fn get_organisation(&self, id: i64) -> Result<Option<Organisation>, DirectoryError> {
        Ok(self.data.read().await.organisations.get(&id).cloned())
    }

    async fn create_organisation(&self, new: NewOrganisation) -> Result<Organisation, DirectoryError> {
        let mut data = self.data.write().await;
        if data.organisations.values().any(|o| o.name == new.name) {
            return Err(DirectoryError::Duplicate(format!("An organisation named '{}'", new.name)));
        }
        Ok(data.insert_organisation(new))
    }

    async fn get_system(&self, id: i64) -> Result<Option<System>, DirectoryError> {
        Ok(self.data.read().await.systems.get(&id).cloned())
    }

    async fn systems_for_organisation(&self, organisation_id: i64) -> Result<Vec<System>, DirectoryError> {
        let data = self.data.read().await;
        let mut systems: Vec<System> = data
            .systems
            .values()
            .filter(|s| s.organisation_id == organisation_id)
            .cloned()
            .collect();
        systems.sort_by_key(|s| s.id);
        Ok(systems)
    }

    async fn create_system(&self, new: NewSystem) -> Result<System, DirectoryError> {
        let mut data = self.data.write().await;
        if data.system_name_taken(0, new.organisation_id, &new.name) {
            return Err(duplicate_system(&new.name));
        }
        let id = data.allocate_id();
        let system = System {
            id,
            organisation_id: new.organisation_id,
            name: new.name,
            description: new.description,
            reference: reference_for(id, PrimeSet::System),
            last_assessed: new.last_assessed,
            hosting_type: new.hosting_type,
            corporate_services: new.corporate_services,
        };
        data.systems.insert(id, system.clone());
        Ok(system)
    }

    async fn update_system(&self, system: &System) -> Result<(), DirectoryError> {
        let mut data = self.data.write().await;
        if data.system_name_taken(system.id, system.organisation_id, &system.name) {
            return Err(duplicate_system(&system.name));
        }
        match data.systems.get_mut(&system.id) {
            Some(existing) => {
                *existing = system.clone();
                Ok(())
            }
            None => Err(DirectoryError::NotFound(format!("System {}", system.id))),
        }
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, DirectoryError> {
        Ok(self.data.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let data = self.data.read().await;
        Ok(data
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, email: &str, first_name: &str, last_name: &str) -> Result<User, DirectoryError> {
        let mut data = self.data.write().await;
        if data.users.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(DirectoryError::Duplicate(format!("A user with email {}", email)));
        }
        let user = User {
            id: data.allocate_id(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        data.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_profile(&self, id: i64) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.data.read().await.profiles.get(&id).cloned())
    }

    async fn profiles_for_user(&self, user_id: i64) -> Result<Vec<UserProfile>, DirectoryError> {
        let data = self.data.read().await;
        let mut profiles: Vec<UserProfile> = data
            .profiles
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        profiles.sort_by_key(|p| p.id);
        Ok(profiles)
    }

    async fn profiles_for_organisation(&self, organisation_id: i64) -> Result<Vec<UserProfile>, DirectoryError> {
        let data = self.data.read().await;
        let mut profiles: Vec<UserProfile> = data
            .profiles
            .values()
            .filter(|p| p.organisation_id == organisation_id)
            .cloned()
            .collect();
        profiles.sort_by_key(|p| p.id);
        Ok(profiles)
    }

    async fn create_profile(
        &self,
        user_id: i64,
        organisation_id: i64,
        role: Role,
    ) -> Result<UserProfile, DirectoryError> {
        let mut data = self.data.write().await;
        if data
            .profiles
            .values()
            .any(|p| p.user_id == user_id && p.organisation_id == organisation_id)
        {
            return Err(DirectoryError::Duplicate(
                "A profile for this user in the organisation".to_string(),
            ));
        }
        let profile = UserProfile {
            id: data.allocate_id(),
            user_id,
            organisation_id,
            role,
        };
        data.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn delete_profile(&self, id: i64) -> Result<bool, DirectoryError> {
        let mut data = self.data.write().await;
        let removed = data.profiles.remove(&id).is_some();
        for assessor in data.assessors.values_mut() {
            assessor.members.retain(|m| *m != id);
        }
        Ok(removed)
    }

    async fn get_assessor(&self, id: i64) -> Result<Option<Assessor>, DirectoryError> {
        Ok(self.data.read().await.assessors.get(&id).cloned())
    }
}

// ============================================================================
// PostgreSQL directory
// ============================================================================

diesel::define_sql_function! {
    fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = user_profiles)]
struct NewProfile {
    user_id: i64,
    organisation_id: i64,
    role: Role,
}

#[derive(Clone)]
pub struct PgDirectory {
    pool: DbPool,
}

impl PgDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryStore for PgDirectory {
    async fn get_organisation(&self, id: i64) -> Result<Option<Organisation>, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            Ok(organisations::table
                .find(id)
                .select(Organisation::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn create_organisation(&self, new: NewOrganisation) -> Result<Organisation, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, DirectoryError, _>(|conn| {
                let inserted: Organisation = diesel::insert_into(organisations::table)
                    .values(&new)
                    .returning(Organisation::as_returning())
                    .get_result(conn)
                    .map_err(|e| {
                        DirectoryError::from_diesel(e, format!("An organisation named '{}'", new.name))
                    })?;
                Ok(diesel::update(organisations::table.find(inserted.id))
                    .set(
                        organisations::reference
                            .eq(reference_for(inserted.id, PrimeSet::Organisation)),
                    )
                    .returning(Organisation::as_returning())
                    .get_result(conn)?)
            })
        })
        .await
    }

    async fn get_system(&self, id: i64) -> Result<Option<System>, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            Ok(systems::table
                .find(id)
                .select(System::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn systems_for_organisation(&self, organisation_id: i64) -> Result<Vec<System>, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            Ok(systems::table
                .filter(systems::organisation_id.eq(organisation_id))
                .order(systems::id.asc())
                .select(System::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn create_system(&self, new: NewSystem) -> Result<System, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, DirectoryError, _>(|conn| {
                let inserted: System = diesel::insert_into(systems::table)
                    .values(&new)
                    .returning(System::as_returning())
                    .get_result(conn)
                    .map_err(|e| {
                        DirectoryError::from_diesel(e, format!("A system named '{}'", new.name))
                    })?;
                Ok(diesel::update(systems::table.find(inserted.id))
                    .set(systems::reference.eq(reference_for(inserted.id, PrimeSet::System)))
                    .returning(System::as_returning())
                    .get_result(conn)?)
            })
        })
        .await
    }

    async fn update_system(&self, system: &System) -> Result<(), DirectoryError> {
        let system = system.clone();
        with_connection(&self.pool, move |conn| {
            let updated = diesel::update(systems::table.find(system.id))
                .set((
                    systems::name.eq(&system.name),
                    systems::description.eq(&system.description),
                    systems::last_assessed.eq(&system.last_assessed),
                    systems::hosting_type.eq(&system.hosting_type),
                    systems::corporate_services.eq(&system.corporate_services),
                ))
                .execute(conn)
                .map_err(|e| DirectoryError::from_diesel(e, format!("A system named '{}'", system.name)))?;
            if updated == 0 {
                return Err(DirectoryError::NotFound(format!("System {}", system.id)));
            }
            Ok(())
        })
        .await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            Ok(users::table
                .find(id)
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let email = email.to_lowercase();
        with_connection(&self.pool, move |conn| {
            Ok(users::table
                .filter(lower(users::email).eq(email))
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn create_user(&self, email: &str, first_name: &str, last_name: &str) -> Result<User, DirectoryError> {
        let (email, first_name, last_name) =
            (email.to_string(), first_name.to_string(), last_name.to_string());
        with_connection(&self.pool, move |conn| {
            diesel::insert_into(users::table)
                .values(NewUser {
                    email: &email,
                    first_name: &first_name,
                    last_name: &last_name,
                })
                .returning(User::as_returning())
                .get_result(conn)
                .map_err(|e| DirectoryError::from_diesel(e, format!("A user with email {}", email)))
        })
        .await
    }

    async fn get_profile(&self, id: i64) -> Result<Option<UserProfile>, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            Ok(user_profiles::table
                .find(id)
                .select(UserProfile::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn profiles_for_user(&self, user_id: i64) -> Result<Vec<UserProfile>, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            Ok(user_profiles::table
                .filter(user_profiles::user_id.eq(user_id))
                .order(user_profiles::id.asc())
                .select(UserProfile::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn profiles_for_organisation(&self, organisation_id: i64) -> Result<Vec<UserProfile>, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            Ok(user_profiles::table
                .filter(user_profiles::organisation_id.eq(organisation_id))
                .order(user_profiles::id.asc())
                .select(UserProfile::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn create_profile(
        &self,
        user_id: i64,
        organisation_id: i64,
        role: Role,
    ) -> Result<UserProfile, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            diesel::insert_into(user_profiles::table)
                .values(NewProfile {
                    user_id,
                    organisation_id,
                    role,
                })
                .returning(UserProfile::as_returning())
                .get_result(conn)
                .map_err(|e| {
                    DirectoryError::from_diesel(e, "A profile for this user in the organisation")
                })
        })
        .await
    }

    async fn delete_profile(&self, id: i64) -> Result<bool, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            let deleted = diesel::delete(user_profiles::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn get_assessor(&self, id: i64) -> Result<Option<Assessor>, DirectoryError> {
        with_connection(&self.pool, move |conn| {
            let Some(db_assessor) = assessors::table
                .find(id)
                .select(DbAssessor::as_select())
                .first(conn)
                .optional()?
            else {
                return Ok(None);
            };
            let members: Vec<i64> = assessor_members::table
                .filter(assessor_members::assessor_id.eq(id))
                .select(assessor_members::user_profile_id)
                .load(conn)?;
            Ok(Some(Assessor::from_db(db_assessor, members)))
        })
        .await
    }
}

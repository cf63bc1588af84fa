use std::sync::Arc;

use crate::assessment::{AssessmentStore, InMemoryAssessmentStore, PgAssessmentStore};
use crate::config::AppConfig;
use crate::configuration::{ConfigurationStore, InMemoryConfigurationStore, PgConfigurationStore};
use crate::directory::{DirectoryStore, InMemoryDirectory, PgDirectory};
use crate::framework::FrameworkRegistry;
use crate::review::{InMemoryReviewStore, PgReviewStore, ReviewStore};
use crate::security::auth::{InMemoryUserSessionStore, PgUserSessionStore};
use crate::security::session::{InMemoryLastAccessStore, PgLastAccessStore};
use crate::security::{
    IdentityProvider, LastAccessStore, LoginConfig, OidcClient, ReviewAccessPolicy,
    SessionRegistry, UserSessionStore,
};

use super::utils::DbPool;

/// Shared by every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub frameworks: Arc<FrameworkRegistry>,
    pub sessions: Arc<dyn UserSessionStore>,
    pub last_access: Arc<dyn LastAccessStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub configurations: Arc<dyn ConfigurationStore>,
    pub assessments: Arc<dyn AssessmentStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub login: LoginConfig,
    pub review_access: ReviewAccessPolicy,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("frameworks", &self.frameworks.ids().collect::<Vec<_>>())
            .field("login", &self.login)
            .field("review_access", &self.review_access)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Every store kept in process memory. Data is lost on restart.
    pub fn in_memory(config: AppConfig, frameworks: FrameworkRegistry) -> Self {
        let identity = Arc::new(OidcClient::new(config.sso.clone()));
        Self {
            config: Arc::new(config),
            frameworks: Arc::new(frameworks),
            sessions: Arc::new(InMemoryUserSessionStore::new()),
            last_access: Arc::new(InMemoryLastAccessStore::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            configurations: Arc::new(InMemoryConfigurationStore::new()),
            assessments: Arc::new(InMemoryAssessmentStore::new()),
            reviews: Arc::new(InMemoryReviewStore::new()),
            identity,
            login: LoginConfig::default(),
            review_access: ReviewAccessPolicy::default(),
        }
    }

    /// Every store backed by PostgreSQL through `pool`.
    pub fn with_pool(config: AppConfig, frameworks: FrameworkRegistry, pool: DbPool) -> Self {
        let identity = Arc::new(OidcClient::new(config.sso.clone()));
        Self {
            config: Arc::new(config),
            frameworks: Arc::new(frameworks),
            sessions: Arc::new(PgUserSessionStore::new(pool.clone())),
            last_access: Arc::new(PgLastAccessStore::new(pool.clone())),
            directory: Arc::new(PgDirectory::new(pool.clone())),
            configurations: Arc::new(PgConfigurationStore::new(pool.clone())),
            assessments: Arc::new(PgAssessmentStore::new(pool.clone())),
            reviews: Arc::new(PgReviewStore::new(pool)),
            identity,
            login: LoginConfig::default(),
            review_access: ReviewAccessPolicy::default(),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryStore>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_identity_provider(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn registry(&self) -> SessionRegistry {
        SessionRegistry::new(
            Arc::clone(&self.directory),
            Arc::clone(&self.sessions),
            Arc::clone(&self.last_access),
        )
    }
}

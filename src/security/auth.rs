use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_cookies::{Cookie, Cookies};
use tracing::{debug, info, warn};

use crate::core::shared::models::UserProfile;
use crate::core::shared::schema::user_sessions;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_connection, DbPool};
use crate::core::urls::PageUrls;
use crate::directory::{find_or_create_user, DirectoryError, DirectoryStore};

use super::log_sanitizer::mask_email;
use super::session::LastAccessStore;

pub const SESSION_COOKIE: &str = "webcaf_session";
pub const SESSION_ID_LENGTH: usize = 32;

// ============================================================================
// Login configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub login_url: String,
    pub exempt_prefixes: Vec<String>,
    pub exempt_paths: Vec<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            login_url: PageUrls::OIDC_AUTHENTICATE.to_string(),
            exempt_prefixes: vec![
                PageUrls::OIDC_AUTHENTICATE.to_string(),
                PageUrls::OIDC_CALLBACK.to_string(),
                PageUrls::OIDC_LOGOUT.to_string(),
                "/assets/".to_string(),
                "/static/".to_string(),
                "/public/".to_string(),
                PageUrls::SESSION_EXPIRED.to_string(),
                PageUrls::HEALTH.to_string(),
            ],
            exempt_paths: vec![PageUrls::ROOT.to_string()],
        }
    }
}

impl LoginConfig {
    /// Paths reachable without signing in. Everything else is a secured path.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path)
            || self.exempt_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

// ============================================================================
// Authenticated identity
// ============================================================================

/// The signed-in user attached to a request by the session resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub session_id: String,
    pub user_id: i64,
    pub email: String,
    pub current_profile: Option<UserProfile>,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| Redirect::to(PageUrls::OIDC_AUTHENTICATE))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Profile does not belong to the signed-in user")]
    ProfileNotOwned,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Database error: {0}")]
    Database(String),
}

impl From<DirectoryError> for AuthError {
    fn from(e: DirectoryError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ProfileNotOwned => StatusCode::FORBIDDEN,
            Self::SessionNotFound => StatusCode::UNAUTHORIZED,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// ============================================================================
// Local sessions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_sessions)]
pub struct UserSession {
    pub id: String,
    pub email: String,
    pub current_profile_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserSessionStore: Send + Sync {
    async fn create(&self, session: UserSession) -> Result<()>;
    async fn get(&self, session_id: &str) -> Result<Option<UserSession>>;
    async fn set_current_profile(&self, session_id: &str, profile_id: i64) -> Result<()>;
    async fn delete(&self, session_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserSessionStore {
    sessions: Arc<RwLock<HashMap<String, UserSession>>>,
}

impl InMemoryUserSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserSessionStore for InMemoryUserSessionStore {
    async fn create(&self, session: UserSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<UserSession>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn set_current_profile(&self, session_id: &str, profile_id: i64) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.current_profile_id = Some(profile_id);
                Ok(())
            }
            None => Err(anyhow::anyhow!("Session not found")),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgUserSessionStore {
    pool: DbPool,
}

impl PgUserSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserSessionStore for PgUserSessionStore {
    async fn create(&self, session: UserSession) -> Result<()> {
        with_connection(&self.pool, move |conn| {
            diesel::insert_into(user_sessions::table)
                .values(&session)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get(&self, session_id: &str) -> Result<Option<UserSession>> {
        let session_id = session_id.to_string();
        with_connection(&self.pool, move |conn| {
            Ok(user_sessions::table
                .find(session_id)
                .select(UserSession::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn set_current_profile(&self, session_id: &str, profile_id: i64) -> Result<()> {
        let session_id = session_id.to_string();
        with_connection(&self.pool, move |conn| {
            let updated = diesel::update(user_sessions::table.find(session_id))
                .set(user_sessions::current_profile_id.eq(Some(profile_id)))
                .execute(conn)?;
            if updated == 0 {
                return Err(anyhow::anyhow!("Session not found"));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        with_connection(&self.pool, move |conn| {
            diesel::delete(user_sessions::table.find(session_id)).execute(conn)?;
            Ok(())
        })
        .await
    }
}

pub fn generate_session_id(length: usize) -> String {
    use rand::Rng;

    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();

    (0..length)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

pub fn session_cookie(session_id: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Creates, resolves and destroys local sessions for SSO identities.
#[derive(Clone)]
pub struct SessionRegistry {
    directory: Arc<dyn DirectoryStore>,
    sessions: Arc<dyn UserSessionStore>,
    last_access: Arc<dyn LastAccessStore>,
}

impl SessionRegistry {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        sessions: Arc<dyn UserSessionStore>,
        last_access: Arc<dyn LastAccessStore>,
    ) -> Self {
        Self {
            directory,
            sessions,
            last_access,
        }
    }

    /// Called once the SSO provider has authenticated `email`.
    pub async fn login(&self, email: &str, first_name: &str, last_name: &str) -> Result<UserSession> {
        let user = find_or_create_user(self.directory.as_ref(), email, first_name, last_name).await?;
        let profiles = self.directory.profiles_for_user(user.id).await?;

        let session = UserSession {
            id: generate_session_id(SESSION_ID_LENGTH),
            email: user.email.clone(),
            current_profile_id: profiles.first().map(|p| p.id),
            created_at: Utc::now(),
        };
        self.sessions.create(session.clone()).await?;
        self.last_access.touch(&user.email, Utc::now()).await?;

        info!("User {} signed in", mask_email(&user.email));
        Ok(session)
    }

    pub async fn logout(&self, session_id: &str) -> Result<()> {
        self.sessions.delete(session_id).await?;
        debug!("Session destroyed");
        Ok(())
    }

    /// Looks up the identity behind a session cookie. Unknown sessions and
    /// sessions whose user has gone resolve to `None`.
    pub async fn resolve(&self, session_id: &str) -> Result<Option<AuthenticatedUser>> {
        let Some(session) = self.sessions.get(session_id).await? else {
            return Ok(None);
        };
        let Some(user) = self.directory.find_user_by_email(&session.email).await? else {
            return Ok(None);
        };

        let current_profile = match session.current_profile_id {
            Some(profile_id) => self
                .directory
                .get_profile(profile_id)
                .await?
                .filter(|p| p.user_id == user.id),
            None => None,
        };

        Ok(Some(AuthenticatedUser {
            session_id: session.id,
            user_id: user.id,
            email: user.email,
            current_profile,
        }))
    }

    pub async fn select_profile(
        &self,
        user: &AuthenticatedUser,
        profile_id: i64,
    ) -> Result<UserProfile, AuthError> {
        let profile = self
            .directory
            .get_profile(profile_id)
            .await?
            .filter(|p| p.user_id == user.user_id)
            .ok_or(AuthError::ProfileNotOwned)?;

        self.sessions
            .set_current_profile(&user.session_id, profile.id)
            .await
            .map_err(|_| AuthError::SessionNotFound)?;
        info!(
            "User {} switched to profile {}",
            mask_email(&user.email),
            profile.id
        );
        Ok(profile)
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Attaches the session's user to the request. Unknown cookies are anonymous.
pub async fn resolve_session_middleware(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        match state.registry().resolve(cookie.value()).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(user);
            }
            Ok(None) => debug!("Unknown session cookie"),
            Err(e) => warn!("Session lookup failed: {}", e),
        }
    }

    next.run(request).await
}

/// Redirects anonymous requests for secured paths to the login route.
pub async fn login_required_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !state.login.is_exempt(path) && request.extensions().get::<AuthenticatedUser>().is_none() {
        debug!("Anonymous request to {} redirected to login", path);
        return Redirect::to(&state.login.login_url).into_response();
    }

    next.run(request).await
}

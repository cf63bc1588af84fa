use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::config::SsoConfig;
use crate::core::shared::schema::last_accessed_times;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_connection, DbPool};
use crate::core::urls::PageUrls;

use super::auth::AuthenticatedUser;
use super::log_sanitizer::mask_email;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub idle_timeout_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 30,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::minutes(self.idle_timeout_minutes)
    }
}

/// A missing timestamp counts as expired.
pub fn is_expired(last_accessed: Option<DateTime<Utc>>, now: DateTime<Utc>, idle: Duration) -> bool {
    match last_accessed {
        Some(last) => now - last > idle,
        None => true,
    }
}

// ============================================================================
// Last-access storage
// ============================================================================

/// Most recent authenticated activity, keyed by user email.
#[async_trait]
pub trait LastAccessStore: Send + Sync {
    async fn get(&self, email: &str) -> Result<Option<DateTime<Utc>>>;
    async fn touch(&self, email: &str, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLastAccessStore {
    times: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryLastAccessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LastAccessStore for InMemoryLastAccessStore {
    async fn get(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.times.read().await.get(email).copied())
    }

    async fn touch(&self, email: &str, at: DateTime<Utc>) -> Result<()> {
        self.times.write().await.insert(email.to_string(), at);
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgLastAccessStore {
    pool: DbPool,
}

impl PgLastAccessStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LastAccessStore for PgLastAccessStore {
    async fn get(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        let email = email.to_string();
        with_connection(&self.pool, move |conn| {
            Ok(last_accessed_times::table
                .find(email)
                .select(last_accessed_times::last_accessed)
                .first::<DateTime<Utc>>(conn)
                .optional()?)
        })
        .await
    }

    async fn touch(&self, email: &str, at: DateTime<Utc>) -> Result<()> {
        let email = email.to_string();
        with_connection(&self.pool, move |conn| {
            diesel::insert_into(last_accessed_times::table)
                .values((
                    last_accessed_times::email.eq(&email),
                    last_accessed_times::last_accessed.eq(at),
                ))
                .on_conflict(last_accessed_times::email)
                .do_update()
                .set(last_accessed_times::last_accessed.eq(at))
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}

// ============================================================================
// Middleware
// ============================================================================

fn secured_user<'a>(state: &AppState, request: &'a Request<Body>) -> Option<&'a AuthenticatedUser> {
    if state.login.is_exempt(request.uri().path()) {
        return None;
    }
    request.extensions().get::<AuthenticatedUser>()
}

/// Sends authenticated users who have been idle too long to the session-expired page.
pub async fn session_expiry_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(user) = secured_user(&state, &request) else {
        return next.run(request).await;
    };

    match state.last_access.get(&user.email).await {
        Ok(last) => {
            if is_expired(last, Utc::now(), state.config.session.idle_timeout()) {
                info!("Session expired for {}", mask_email(&user.email));
                return Redirect::to(PageUrls::SESSION_EXPIRED).into_response();
            }
        }
        Err(e) => {
            error!("Failed to read last access time: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Session check failed" })),
            )
                .into_response();
        }
    }

    next.run(request).await
}

/// Records the access time before the view runs.
pub async fn last_access_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(user) = secured_user(&state, &request) {
        if let Err(e) = state.last_access.touch(&user.email, Utc::now()).await {
            error!("Failed to record last access time: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Session update failed" })),
            )
                .into_response();
        }
        debug!("Recorded access for {}", mask_email(&user.email));
    }

    next.run(request).await
}

/// Refreshes the timestamp when the user lands back on the root page from SSO sign-out.
///
/// Returns true when the timestamp was updated.
pub async fn record_access_after_sign_out(
    store: &dyn LastAccessStore,
    sso: &SsoConfig,
    referer: Option<&str>,
    user: Option<&AuthenticatedUser>,
) -> Result<bool> {
    let (Some(referer), Some(user)) = (referer, user) else {
        return Ok(false);
    };
    if referer != sso.sign_out_url() {
        return Ok(false);
    }
    store.touch(&user.email, Utc::now()).await?;
    info!("Refreshed access time after sign-out for {}", mask_email(&user.email));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            session_id: "abc".into(),
            user_id: 1,
            email: email.into(),
            current_profile: None,
        }
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.idle_timeout_minutes, 30);
        assert_eq!(config.idle_timeout(), Duration::minutes(30));
    }

    #[test]
    fn test_missing_timestamp_is_expired() {
        assert!(is_expired(None, Utc::now(), Duration::minutes(30)));
    }

    #[test]
    fn test_expiry_threshold() {
        let now = Utc::now();
        let idle = Duration::minutes(30);

        assert!(!is_expired(Some(now - Duration::minutes(29)), now, idle));
        assert!(!is_expired(Some(now - Duration::minutes(30)), now, idle));
        assert!(is_expired(Some(now - Duration::minutes(31)), now, idle));
    }

    #[tokio::test]
    async fn test_in_memory_store_upserts() {
        let store = InMemoryLastAccessStore::new();
        assert!(store.get("a@example.com").await.expect("get failed").is_none());

        let first = Utc::now() - Duration::minutes(5);
        store.touch("a@example.com", first).await.expect("touch failed");
        let second = Utc::now();
        store.touch("a@example.com", second).await.expect("touch failed");

        assert_eq!(store.get("a@example.com").await.expect("get failed"), Some(second));
    }

    #[tokio::test]
    async fn test_sign_out_referer_refreshes_access() {
        let store = InMemoryLastAccessStore::new();
        let sso = SsoConfig::default();
        let signed_in = user("lead@example.com");

        let updated = record_access_after_sign_out(
            &store,
            &sso,
            Some(&sso.sign_out_url()),
            Some(&signed_in),
        )
        .await
        .expect("record failed");

        assert!(updated);
        assert!(store.get("lead@example.com").await.expect("get failed").is_some());
    }

    #[tokio::test]
    async fn test_sign_out_referer_requires_user_and_match() {
        let store = InMemoryLastAccessStore::new();
        let sso = SsoConfig::default();
        let signed_in = user("lead@example.com");

        let no_user = record_access_after_sign_out(&store, &sso, Some(&sso.sign_out_url()), None)
            .await
            .expect("record failed");
        let other_referer = record_access_after_sign_out(
            &store,
            &sso,
            Some("https://elsewhere.example.com/"),
            Some(&signed_in),
        )
        .await
        .expect("record failed");

        assert!(!no_user);
        assert!(!other_referer);
        assert!(store.get("lead@example.com").await.expect("get failed").is_none());
    }
}

//! Authorization code sign-in against the external SSO provider.

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};
use tracing::{info, warn};

use crate::config::SsoConfig;
use crate::core::shared::state::AppState;
use crate::core::urls::PageUrls;

use super::auth::{generate_session_id, session_cookie};
use super::log_sanitizer::mask_email;

pub const OIDC_STATE_COOKIE: &str = "webcaf_oidc_state";
const OIDC_STATE_LENGTH: usize = 32;

/// The identity the provider vouches for after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SsoIdentity {
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("Sign-in was rejected by the provider: {0}")]
    Provider(String),
    #[error("Missing authorization code")]
    MissingCode,
    #[error("Sign-in state does not match")]
    StateMismatch,
    #[error("Could not complete sign-in with the provider: {0}")]
    Exchange(String),
    #[error("The provider did not return an email address")]
    MissingEmail,
    #[error("Could not start a session: {0}")]
    Session(String),
}

impl From<reqwest::Error> for OidcError {
    fn from(e: reqwest::Error) -> Self {
        Self::Exchange(e.to_string())
    }
}

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Provider(_) | Self::MissingCode | Self::StateMismatch => StatusCode::BAD_REQUEST,
            Self::Exchange(_) | Self::MissingEmail => StatusCode::BAD_GATEWAY,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Turns an authorization code into the signed-in identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<SsoIdentity, OidcError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Token and userinfo calls over HTTP.
#[derive(Debug, Clone)]
pub struct OidcClient {
    http: reqwest::Client,
    config: SsoConfig,
}

impl OidcClient {
    pub fn new(config: SsoConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    async fn exchange_code(&self, code: &str) -> Result<SsoIdentity, OidcError> {
        let token: TokenResponse = self
            .http
            .post(self.config.token_url())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(self
            .http
            .get(self.config.userinfo_url())
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

fn state_cookie(value: String) -> Cookie<'static> {
    Cookie::build((OIDC_STATE_COOKIE, value))
        .path("/oidc/")
        .http_only(true)
        .build()
}

/// Sends the browser to the provider with a fresh anti-forgery state.
pub async fn handle_oidc_authenticate(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Redirect {
    let csrf_state = generate_session_id(OIDC_STATE_LENGTH);
    let location = state.config.sso.authorization_url(&csrf_state);
    cookies.add(state_cookie(csrf_state));
    Redirect::to(&location)
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Provider redirect target: checks the state, exchanges the code and signs the user in.
pub async fn handle_oidc_callback(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, OidcError> {
    let expected = cookies.get(OIDC_STATE_COOKIE).map(|c| c.value().to_string());
    cookies.remove(state_cookie(String::new()));

    if let Some(error) = params.error {
        warn!("SSO provider returned error: {}", error);
        return Err(OidcError::Provider(error));
    }
    match (expected, params.state) {
        (Some(expected), Some(actual)) if !expected.is_empty() && expected == actual => {}
        _ => {
            warn!("SSO callback with a missing or mismatched state");
            return Err(OidcError::StateMismatch);
        }
    }
    let code = params.code.filter(|c| !c.is_empty()).ok_or(OidcError::MissingCode)?;

    let identity = state.identity.exchange_code(&code).await?;
    let email = identity.email.trim();
    if email.is_empty() {
        return Err(OidcError::MissingEmail);
    }

    let session = state
        .registry()
        .login(
            email,
            identity.given_name.as_deref().unwrap_or_default(),
            identity.family_name.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(|e| OidcError::Session(e.to_string()))?;
    cookies.add(session_cookie(&session.id));
    info!("SSO sign-in completed for {}", mask_email(email));
    Ok(Redirect::to(PageUrls::ROOT))
}

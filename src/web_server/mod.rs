//! Router assembly, session pages and the HTTP listener.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_cookies::{CookieManagerLayer, Cookies};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::assessment::configure_assessment_routes;
use crate::configuration::configure_configuration_routes;
use crate::core::shared::models::UserProfile;
use crate::core::shared::state::AppState;
use crate::core::urls::PageUrls;
use crate::directory::configure_directory_routes;
use crate::review::configure_review_routes;
use crate::security::auth::removal_cookie;
use crate::security::oidc::{handle_oidc_authenticate, handle_oidc_callback};
use crate::security::{
    last_access_middleware, login_required_middleware, record_access_after_sign_out,
    request_log_context_middleware, resolve_session_middleware, session_expiry_middleware,
    AuthError, AuthenticatedUser,
};

// ============================================================================
// Pages
// ============================================================================

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{} - WebCAF</title></head>\n<body>\n<main>\n<h1>{}</h1>\n{}\n</main>\n</body>\n</html>\n",
        title, title, body
    ))
}

/// Landing page. Coming back from the SSO sign-out page counts as activity.
pub async fn handle_landing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    user: Option<AuthenticatedUser>,
) -> Html<String> {
    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = record_access_after_sign_out(
        state.last_access.as_ref(),
        &state.config.sso,
        referer,
        user.as_ref(),
    )
    .await
    {
        warn!("Could not refresh access time on landing: {}", e);
    }

    page(
        "Cyber Assessment Framework",
        &format!(
            "<p>Self-assess your organisation's systems against the NCSC CAF.</p>\n<p><a href=\"{}\">Sign in</a></p>",
            PageUrls::OIDC_AUTHENTICATE
        ),
    )
}

pub async fn handle_session_expired(State(state): State<Arc<AppState>>) -> Html<String> {
    page(
        "Your session has expired",
        &format!(
            "<p>You have been inactive for {} minutes, so we have signed you out.</p>\n<p><a href=\"{}\">Sign in again</a></p>",
            state.config.session.idle_timeout_minutes,
            state.config.sso.sign_out_url()
        ),
    )
}

/// Drops the local session and hands over to the SSO sign-out page.
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    user: Option<AuthenticatedUser>,
) -> Redirect {
    if let Some(user) = user {
        if let Err(e) = state.registry().logout(&user.session_id).await {
            error!("Failed to destroy session: {}", e);
        }
    }
    cookies.remove(removal_cookie());
    Redirect::to(&state.config.sso.sign_out_url())
}

pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "webcaf",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct SelectProfileRequest {
    pub profile_id: i64,
}

pub async fn handle_select_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<SelectProfileRequest>,
) -> Result<Json<UserProfile>, AuthError> {
    Ok(Json(state.registry().select_profile(&user, req.profile_id).await?))
}

async fn handle_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
        .into_response()
}

// ============================================================================
// Router
// ============================================================================

/// Builds the application with its middleware stack. The last layer added
/// runs first.
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    Router::new()
        .route(PageUrls::ROOT, get(handle_landing))
        .route(PageUrls::SESSION_EXPIRED, get(handle_session_expired))
        .route(PageUrls::OIDC_AUTHENTICATE, get(handle_oidc_authenticate))
        .route(PageUrls::OIDC_CALLBACK, get(handle_oidc_callback))
        .route(PageUrls::LOGOUT, get(handle_logout))
        .route(PageUrls::HEALTH, get(health_check))
        .route(PageUrls::SELECT_PROFILE, post(handle_select_profile))
        .merge(configure_configuration_routes())
        .merge(configure_assessment_routes())
        .merge(configure_review_routes())
        .merge(configure_directory_routes())
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(handle_not_found)
        .layer(from_fn_with_state(state.clone(), last_access_middleware))
        .layer(from_fn_with_state(state.clone(), session_expiry_middleware))
        .layer(from_fn_with_state(state.clone(), login_required_middleware))
        .layer(from_fn(request_log_context_middleware))
        .layer(from_fn_with_state(state.clone(), resolve_session_middleware))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

pub async fn run_server(state: Arc<AppState>) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}

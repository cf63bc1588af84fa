pub mod auth;
pub mod log_sanitizer;
pub mod oidc;
pub mod rbac_middleware;
pub mod session;

pub use auth::{
    login_required_middleware, resolve_session_middleware, AuthError, AuthenticatedUser,
    LoginConfig, SessionRegistry, UserSession, UserSessionStore, SESSION_COOKIE,
};
pub use log_sanitizer::{mask_email, request_log_context_middleware, sanitize_for_log};
pub use oidc::{IdentityProvider, OidcClient, OidcError, SsoIdentity, OIDC_STATE_COOKIE};
pub use rbac_middleware::{PermissionUtil, RbacError, ReviewAccess, ReviewAccessPolicy};
pub use session::{
    is_expired, last_access_middleware, record_access_after_sign_out, session_expiry_middleware,
    LastAccessStore, SessionConfig,
};

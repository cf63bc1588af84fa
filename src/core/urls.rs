#[derive(Debug)]
pub struct PageUrls;

impl PageUrls {
    pub const ROOT: &'static str = "/";
    pub const SESSION_EXPIRED: &'static str = "/session-expired/";
    pub const LOGOUT: &'static str = "/logout/";
    pub const HEALTH: &'static str = "/health";
    pub const SELECT_PROFILE: &'static str = "/session/profile";

    // SSO integration points
    pub const OIDC_AUTHENTICATE: &'static str = "/oidc/authenticate/";
    pub const OIDC_CALLBACK: &'static str = "/oidc/callback/";
    pub const OIDC_LOGOUT: &'static str = "/oidc/logout/";
}

#[derive(Debug)]
pub struct ApiUrls;

impl ApiUrls {
    // Assessment period configuration
    pub const CURRENT_CONFIGURATION: &'static str = "/api/configuration/current";
    pub const CONFIGURATIONS: &'static str = "/api/configurations";

    // Directory
    pub const ORGANISATIONS: &'static str = "/api/organisations";
    pub const SYSTEMS: &'static str = "/api/systems";
    pub const PROFILES: &'static str = "/api/profiles";
    pub const PROFILE_BY_ID: &'static str = "/api/profiles/:id";

    // Assessments
    pub const ASSESSMENTS: &'static str = "/api/assessments";
    pub const ASSESSMENT_BY_ID: &'static str = "/api/assessments/:id";
    pub const ASSESSMENT_OUTCOME: &'static str = "/api/assessments/:id/outcomes/:code";
    pub const ASSESSMENT_PROGRESS: &'static str = "/api/assessments/:id/progress";
    pub const ASSESSMENT_STATUS: &'static str = "/api/assessments/:id/status";

    // Reviews
    pub const REVIEWS: &'static str = "/api/reviews";
    pub const REVIEW_BY_ID: &'static str = "/api/reviews/:id";
    pub const REVIEW_SECTION: &'static str = "/api/reviews/:id/sections/:section";
    pub const REVIEW_SYSTEM: &'static str = "/api/reviews/:id/system";
    pub const REVIEW_STATUS: &'static str = "/api/reviews/:id/status";
    pub const REVIEW_VERSION: &'static str = "/api/reviews/:id/versions/:number";
}

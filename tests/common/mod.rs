#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use webcaf::config::AppConfig;
use webcaf::configuration::{ConfigurationStore, NewConfiguration};
use webcaf::core::shared::models::{Assessor, AssessorType, Organisation, Role, System, UserProfile};
use webcaf::directory::InMemoryDirectory;
use webcaf::framework::FrameworkRegistry;
use webcaf::security::{IdentityProvider, SESSION_COOKIE};
use webcaf::web_server::build_router;
use webcaf::AppState;

pub const FRAMEWORK_YAML: &str = include_str!("../../frameworks/caf32.yaml");
pub const OUTCOMES: [&str; 4] = ["A1.a", "A1.b", "A2.a", "B1.a"];
pub const PERIOD: &str = "25/26";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub directory: InMemoryDirectory,
    pub router: Router,
    pub organisation: Organisation,
    pub system: System,
}

/// A signed-in user and the cookie that identifies their session.
pub struct Session {
    pub cookie: String,
    pub email: String,
    pub profile: UserProfile,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        Self::build(config, None, Utc::now() + Duration::days(90)).await
    }

    /// Signs in through `identity` instead of the real SSO provider.
    pub async fn with_identity_provider(identity: Arc<dyn IdentityProvider>) -> Self {
        Self::build(AppConfig::default(), Some(identity), Utc::now() + Duration::days(90)).await
    }

    /// The fixture period closes at `end` instead of three months from now.
    pub async fn with_period_end(end: DateTime<Utc>) -> Self {
        Self::build(AppConfig::default(), None, end).await
    }

    async fn build(
        config: AppConfig,
        identity: Option<Arc<dyn IdentityProvider>>,
        period_end: DateTime<Utc>,
    ) -> Self {
        let frameworks = FrameworkRegistry::new()
            .with_yaml("caf32", FRAMEWORK_YAML)
            .expect("bundled framework parses");
        let directory = InMemoryDirectory::new();
        let mut state =
            AppState::in_memory(config, frameworks).with_directory(Arc::new(directory.clone()));
        if let Some(identity) = identity {
            state = state.with_identity_provider(identity);
        }
        let state = Arc::new(state);

        state
            .configurations
            .create(NewConfiguration {
                name: "2025-26".into(),
                current_assessment_period: PERIOD.into(),
                assessment_period_end: period_end,
                default_framework: "caf32".into(),
            })
            .await
            .expect("configuration created");

        let organisation = directory.add_organisation("Example Council").await;
        let system = directory
            .add_system(System {
                id: 0,
                organisation_id: organisation.id,
                name: "Payments".into(),
                description: Some("Card processing".into()),
                reference: None,
                last_assessed: Some("assessed_in_24_25".into()),
                hosting_type: vec!["hosted_on_cloud".into()],
                corporate_services: vec!["payroll".into()],
            })
            .await;

        Self {
            router: build_router(state.clone()),
            state,
            directory,
            organisation,
            system,
        }
    }

    /// Creates a user with a single profile in `organisation_id` and signs them in.
    pub async fn sign_in_to(&self, email: &str, role: Role, organisation_id: i64) -> Session {
        let user = self.directory.add_user(email).await;
        let profile = self.directory.add_profile(user.id, organisation_id, role).await;
        let session = self
            .state
            .registry()
            .login(email, "Test", "User")
            .await
            .expect("login succeeds");
        Session {
            cookie: format!("{}={}", SESSION_COOKIE, session.id),
            email: email.to_string(),
            profile,
        }
    }

    pub async fn sign_in(&self, email: &str, role: Role) -> Session {
        self.sign_in_to(email, role, self.organisation.id).await
    }

    pub async fn add_assessor(&self, name: &str, members: Vec<i64>) -> Assessor {
        self.directory
            .add_assessor(Assessor {
                id: 0,
                organisation_id: self.organisation.id,
                name: name.into(),
                email: "assessor@example.com".into(),
                contact_name: "Jane Doe".into(),
                address: "1 High St, London".into(),
                phone_number: "0123456789".into(),
                assessor_type: AssessorType::Independent,
                is_active: true,
                members,
            })
            .await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, session: &Session) -> Response<Body> {
        self.send(Method::GET, uri, Some(&session.cookie), None).await
    }

    pub async fn post(&self, uri: &str, session: &Session, body: Value) -> Response<Body> {
        self.send(Method::POST, uri, Some(&session.cookie), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, session: &Session, body: Value) -> Response<Body> {
        self.send(Method::PUT, uri, Some(&session.cookie), Some(body))
            .await
    }

    /// Starts an assessment for the fixture system and answers every outcome.
    pub async fn submitted_assessment(&self, lead: &Session) -> i64 {
        let created = self
            .post(
                "/api/assessments",
                lead,
                json!({"system_id": self.system.id, "review_type": "independent"}),
            )
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let id = body_json(created).await["id"]
            .as_i64()
            .expect("assessment id");

        for code in OUTCOMES {
            let saved = self
                .put(
                    &format!("/api/assessments/{}/outcomes/{}", id, code),
                    lead,
                    confirmed_outcome(),
                )
                .await;
            assert_eq!(saved.status(), StatusCode::OK);
        }

        let submitted = self
            .post(
                &format!("/api/assessments/{}/status", id),
                lead,
                json!({"status": "submitted"}),
            )
            .await;
        assert_eq!(submitted.status(), StatusCode::OK);
        id
    }
}

pub fn confirmed_outcome() -> Value {
    json!({
        "indicators": {"achieved_A1.a.3": "agreed"},
        "confirmation": {"confirm_outcome": "confirm"}
    })
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

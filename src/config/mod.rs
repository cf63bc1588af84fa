use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::security::session::SessionConfig;

pub const DEFAULT_CONFIG_FILE: &str = "webcaf.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sso: SsoConfig,
    pub session: SessionConfig,
    pub review: ReviewSettings,
    pub frameworks: FrameworksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8020,
            static_dir: PathBuf::from("static"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// Endpoints of the external single sign-on provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoConfig {
    pub provider_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Where the provider sends the browser back to, i.e. this service's `/oidc/callback/`.
    pub redirect_uri: String,
    pub scope: String,
    pub authorize_path: String,
    pub token_path: String,
    pub userinfo_path: String,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://localhost:8080".to_string(),
            client_id: "webcaf".to_string(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8020/oidc/callback/".to_string(),
            scope: "openid email profile".to_string(),
            authorize_path: "/authorize".to_string(),
            token_path: "/token".to_string(),
            userinfo_path: "/userinfo".to_string(),
        }
    }
}

impl SsoConfig {
    fn base(&self) -> &str {
        self.provider_url.trim_end_matches('/')
    }

    pub fn sign_out_url(&self) -> String {
        format!(
            "{}/sign-out?to_client={}",
            self.base(),
            urlencoding::encode(&self.client_id)
        )
    }

    /// Authorization code request carrying the anti-forgery `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.base(),
            self.authorize_path,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope),
            urlencoding::encode(state)
        )
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.base(), self.token_path)
    }

    pub fn userinfo_url(&self) -> String {
        format!("{}{}", self.base(), self.userinfo_path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewSettings {
    /// Legacy mode: at most one review per assessment, whoever the assessor is.
    pub single_review_per_assessment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworksConfig {
    pub directory: PathBuf,
}

impl Default for FrameworksConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("frameworks"),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file named by `WEBCAF_CONFIG` (or `webcaf.toml`),
    /// then `WEBCAF_*` environment variables with `__` as the section separator.
    pub fn load() -> Result<Self, figment::Error> {
        let path = std::env::var("WEBCAF_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let mut config: AppConfig = Self::figment(Toml::file(path)).extract()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }

        Ok(config)
    }

    pub fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(file)
            .merge(Env::prefixed("WEBCAF_").split("__"))
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref()
    }
}

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::core::shared::models::Role;
use crate::core::shared::state::AppState;
use crate::security::AuthenticatedUser;

use super::error::ConfigurationError;
use super::types::{
    Configuration, CreateConfigurationRequest, CurrentConfiguration, NewConfiguration,
};
use super::{current_configuration, format_period_end, parse_period_end, validate_period};

pub async fn handle_get_current_configuration(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CurrentConfiguration>, ConfigurationError> {
    let configuration = current_configuration(state.configurations.as_ref(), Utc::now()).await?;
    Ok(Json(CurrentConfiguration {
        assessment_period_end_text: format_period_end(configuration.assessment_period_end),
        configuration,
    }))
}

pub async fn handle_create_configuration(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateConfigurationRequest>,
) -> Result<(StatusCode, Json<Configuration>), ConfigurationError> {
    let is_advisor = user
        .current_profile
        .as_ref()
        .is_some_and(|p| p.role == Role::CyberAdvisor);
    if !is_advisor {
        return Err(ConfigurationError::Forbidden(
            "Only cyber advisors can create configurations".to_string(),
        ));
    }

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ConfigurationError::Validation("Name is required".to_string()));
    }
    validate_period(&req.current_assessment_period)?;
    let assessment_period_end = parse_period_end(&req.assessment_period_end)?;
    if !state.frameworks.contains(&req.default_framework) {
        return Err(ConfigurationError::UnknownFramework(req.default_framework));
    }

    let configuration = state
        .configurations
        .create(NewConfiguration {
            name: name.to_string(),
            current_assessment_period: req.current_assessment_period,
            assessment_period_end,
            default_framework: req.default_framework,
        })
        .await?;

    info!(
        "Created configuration {} for period {}",
        configuration.name, configuration.current_assessment_period
    );
    Ok((StatusCode::CREATED, Json(configuration)))
}

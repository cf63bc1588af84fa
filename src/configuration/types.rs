use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::schema::configurations;

/// One assessment period and its closing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = configurations)]
pub struct Configuration {
    pub id: i64,
    pub name: String,
    pub current_assessment_period: String,
    pub assessment_period_end: DateTime<Utc>,
    pub default_framework: String,
}

/// The open configuration with its closing time in the form shown to users.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentConfiguration {
    #[serde(flatten)]
    pub configuration: Configuration,
    pub assessment_period_end_text: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = configurations)]
pub struct NewConfiguration {
    pub name: String,
    pub current_assessment_period: String,
    pub assessment_period_end: DateTime<Utc>,
    pub default_framework: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConfigurationRequest {
    pub name: String,
    pub current_assessment_period: String,
    /// RFC 3339, or the admin text form such as `31 March 2026 11:59pm`.
    pub assessment_period_end: String,
    pub default_framework: String,
}

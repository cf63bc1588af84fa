use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::models::{AssessmentStatus, CafProfile};
use crate::core::shared::schema::assessments;
use crate::framework::ObjectiveProgress;

/// A self-assessment of one system for one assessment period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = assessments)]
pub struct Assessment {
    pub id: i64,
    pub reference: Option<String>,
    pub system_id: i64,
    pub assessment_period: String,
    pub status: AssessmentStatus,
    pub framework: String,
    pub caf_profile: CafProfile,
    pub review_type: Option<String>,
    /// Outcome code to `{indicators, confirmation}` answers.
    pub assessments_data: serde_json::Value,
    pub created_by: Option<i64>,
    pub last_updated_by: Option<i64>,
    pub created_on: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = assessments)]
pub struct NewAssessment {
    pub system_id: i64,
    pub assessment_period: String,
    pub status: AssessmentStatus,
    pub framework: String,
    pub caf_profile: CafProfile,
    pub review_type: Option<String>,
    pub assessments_data: serde_json::Value,
    pub created_by: Option<i64>,
    pub last_updated_by: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssessmentRequest {
    pub system_id: i64,
    pub framework: Option<String>,
    #[serde(default)]
    pub caf_profile: CafProfile,
    pub review_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusChangeRequest {
    pub status: AssessmentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentResponse {
    #[serde(flatten)]
    pub assessment: Assessment,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentProgress {
    pub assessment_id: i64,
    pub is_complete: bool,
    pub objectives: Vec<ObjectiveProgress>,
}

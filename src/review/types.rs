use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::shared::models::ReviewStatus;
use crate::core::shared::schema::{review_versions, reviews};

/// An assessor's review of a submitted assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = reviews)]
pub struct Review {
    pub id: i64,
    pub reference: Option<String>,
    pub assessment_id: i64,
    pub assessed_by_id: Option<i64>,
    pub status: ReviewStatus,
    pub review_data: Value,
    pub last_updated_by: Option<i64>,
    /// Bumped on every save.
    pub version: i32,
    pub created_on: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub assessment_id: i64,
    pub assessed_by_id: Option<i64>,
    pub status: ReviewStatus,
    pub review_data: Value,
    pub last_updated_by: Option<i64>,
}

/// Copy of `review_data` taken when a review is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = review_versions)]
pub struct ReviewVersion {
    pub id: i64,
    pub review_id: i64,
    pub version_number: i32,
    pub review_data: Value,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = review_versions)]
pub struct NewReviewVersion {
    pub review_id: i64,
    pub version_number: i32,
    pub review_data: Value,
}

/// A single save of a review row.
#[derive(Debug, Clone)]
pub struct ReviewUpdate {
    pub id: i64,
    pub status: ReviewStatus,
    pub review_data: Value,
    pub updated_by: Option<i64>,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub assessment_id: i64,
    pub assessor_id: i64,
    #[serde(default)]
    pub status: ReviewStatus,
    pub review_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionUpdateRequest {
    pub data: Value,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemFieldUpdateRequest {
    pub field: String,
    pub value: Value,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewStatusRequest {
    pub status: Option<ReviewStatus>,
    #[serde(default)]
    pub reopen: bool,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    #[serde(flatten)]
    pub review: Review,
    pub can_edit: bool,
    pub current_version_number: Option<usize>,
    pub all_versions: Vec<ReviewVersion>,
}

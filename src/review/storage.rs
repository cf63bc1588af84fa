use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::shared::models::ReviewStatus;
use crate::core::shared::schema::{assessments, review_versions, reviews};
use crate::core::shared::utils::{is_unique_violation, with_connection, DbPool};
use crate::references::generate_reference;

use super::error::ReviewError;
use super::types::{NewReview, NewReviewVersion, Review, ReviewUpdate, ReviewVersion};

fn reference_for(id: i64) -> Option<String> {
    u64::try_from(id)
        .ok()
        .and_then(|pk| generate_reference(pk).ok())
}

fn duplicate_error(new: &NewReview, single_per_assessment: bool) -> ReviewError {
    if single_per_assessment {
        ReviewError::Validation(format!(
            "Assessment {} already has a review",
            new.assessment_id
        ))
    } else {
        ReviewError::Validation(format!(
            "Assessment {} already has a review by this assessor",
            new.assessment_id
        ))
    }
}

fn not_found(id: i64) -> ReviewError {
    ReviewError::NotFound(format!("Review {}", id))
}

/// A completed review gets a new version unless its data matches the latest one.
pub fn needs_version(status: ReviewStatus, data: &Value, latest: Option<&ReviewVersion>) -> bool {
    status == ReviewStatus::Completed && latest.map_or(true, |v| &v.review_data != data)
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Inserts the review, enforcing one review per assessment and assessor, or
    /// per assessment when `single_per_assessment` is set.
    async fn create(&self, new: NewReview, single_per_assessment: bool) -> Result<Review, ReviewError>;
    async fn get(&self, id: i64) -> Result<Option<Review>, ReviewError>;
    async fn list_for_assessment(&self, assessment_id: i64) -> Result<Vec<Review>, ReviewError>;
    async fn list_for_assessments(&self, assessment_ids: &[i64]) -> Result<Vec<Review>, ReviewError>;
    /// Writes status and data, bumps `version` and records a version on
    /// completion. A stale `expected_version` is a conflict.
    async fn save(&self, update: ReviewUpdate) -> Result<Review, ReviewError>;
    /// Recorded versions, oldest first.
    async fn versions(&self, review_id: i64) -> Result<Vec<ReviewVersion>, ReviewError>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct ReviewRows {
    next_id: i64,
    next_version_id: i64,
    rows: HashMap<i64, Review>,
    versions: HashMap<i64, Vec<ReviewVersion>>,
}

impl ReviewRows {
    fn conflicts(&self, new: &NewReview, single_per_assessment: bool) -> bool {
        self.rows.values().any(|r| {
            r.assessment_id == new.assessment_id
                && (single_per_assessment || r.assessed_by_id == new.assessed_by_id)
        })
    }

    fn record_version_if_needed(&mut self, review: &Review) {
        let versions = self.versions.entry(review.id).or_default();
        if !needs_version(review.status, &review.review_data, versions.last()) {
            return;
        }
        self.next_version_id += 1;
        let number = versions.len() as i32 + 1;
        versions.push(ReviewVersion {
            id: self.next_version_id,
            review_id: review.id,
            version_number: number,
            review_data: review.review_data.clone(),
            recorded_at: Utc::now(),
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryReviewStore {
    data: Arc<RwLock<ReviewRows>>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewStore for InMemoryReviewStore {
    async fn create(&self, new: NewReview, single_per_assessment: bool) -> Result<Review, ReviewError> {
        let mut data = self.data.write().await;
        if data.conflicts(&new, single_per_assessment) {
            return Err(duplicate_error(&new, single_per_assessment));
        }
        data.next_id += 1;
        let id = data.next_id;
        let now = Utc::now();
        let review = Review {
            id,
            reference: reference_for(id),
            assessment_id: new.assessment_id,
            assessed_by_id: new.assessed_by_id,
            status: new.status,
            review_data: new.review_data,
            last_updated_by: new.last_updated_by,
            version: 0,
            created_on: now,
            last_updated: now,
        };
        data.rows.insert(id, review.clone());
        data.record_version_if_needed(&review);
        Ok(review)
    }

    async fn get(&self, id: i64) -> Result<Option<Review>, ReviewError> {
        Ok(self.data.read().await.rows.get(&id).cloned())
    }

    async fn list_for_assessment(&self, assessment_id: i64) -> Result<Vec<Review>, ReviewError> {
        self.list_for_assessments(&[assessment_id]).await
    }

    async fn list_for_assessments(&self, assessment_ids: &[i64]) -> Result<Vec<Review>, ReviewError> {
        let data = self.data.read().await;
        let mut found: Vec<Review> = data
            .rows
            .values()
            .filter(|r| assessment_ids.contains(&r.assessment_id))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }

    async fn save(&self, update: ReviewUpdate) -> Result<Review, ReviewError> {
        let mut data = self.data.write().await;
        let review = data.rows.get_mut(&update.id).ok_or_else(|| not_found(update.id))?;
        if let Some(expected) = update.expected_version {
            if expected != review.version {
                return Err(ReviewError::Conflict {
                    expected,
                    actual: review.version,
                });
            }
        }
        review.status = update.status;
        review.review_data = update.review_data;
        review.last_updated_by = update.updated_by;
        review.version += 1;
        review.last_updated = Utc::now();
        let saved = review.clone();
        data.record_version_if_needed(&saved);
        Ok(saved)
    }

    async fn versions(&self, review_id: i64) -> Result<Vec<ReviewVersion>, ReviewError> {
        Ok(self
            .data
            .read()
            .await
            .versions
            .get(&review_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// PostgreSQL store
// ============================================================================

#[derive(Clone)]
pub struct PgReviewStore {
    pool: DbPool,
}

impl PgReviewStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn record_version_if_needed(conn: &mut PgConnection, review: &Review) -> Result<(), ReviewError> {
    let latest: Option<ReviewVersion> = review_versions::table
        .filter(review_versions::review_id.eq(review.id))
        .order(review_versions::version_number.desc())
        .select(ReviewVersion::as_select())
        .first(conn)
        .optional()?;
    if !needs_version(review.status, &review.review_data, latest.as_ref()) {
        return Ok(());
    }
    diesel::insert_into(review_versions::table)
        .values(&NewReviewVersion {
            review_id: review.id,
            version_number: latest.map_or(1, |v| v.version_number + 1),
            review_data: review.review_data.clone(),
        })
        .execute(conn)?;
    Ok(())
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn create(&self, new: NewReview, single_per_assessment: bool) -> Result<Review, ReviewError> {
        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, ReviewError, _>(|conn| {
                if single_per_assessment {
                    // Holding the assessment row serialises creates for it.
                    assessments::table
                        .find(new.assessment_id)
                        .select(assessments::id)
                        .for_update()
                        .first::<i64>(conn)
                        .optional()?;
                    let existing: i64 = reviews::table
                        .filter(reviews::assessment_id.eq(new.assessment_id))
                        .count()
                        .get_result(conn)?;
                    if existing > 0 {
                        return Err(duplicate_error(&new, true));
                    }
                }
                let inserted: Review = diesel::insert_into(reviews::table)
                    .values(&new)
                    .returning(Review::as_returning())
                    .get_result(conn)
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            duplicate_error(&new, single_per_assessment)
                        } else {
                            ReviewError::from(e)
                        }
                    })?;
                let review: Review = diesel::update(reviews::table.find(inserted.id))
                    .set(reviews::reference.eq(reference_for(inserted.id)))
                    .returning(Review::as_returning())
                    .get_result(conn)?;
                record_version_if_needed(conn, &review)?;
                Ok(review)
            })
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<Review>, ReviewError> {
        with_connection(&self.pool, move |conn| {
            Ok(reviews::table
                .find(id)
                .select(Review::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn list_for_assessment(&self, assessment_id: i64) -> Result<Vec<Review>, ReviewError> {
        self.list_for_assessments(&[assessment_id]).await
    }

    async fn list_for_assessments(&self, assessment_ids: &[i64]) -> Result<Vec<Review>, ReviewError> {
        let assessment_ids = assessment_ids.to_vec();
        with_connection(&self.pool, move |conn| {
            Ok(reviews::table
                .filter(reviews::assessment_id.eq_any(assessment_ids))
                .order(reviews::id.asc())
                .select(Review::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn save(&self, update: ReviewUpdate) -> Result<Review, ReviewError> {
        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, ReviewError, _>(|conn| {
                let current: Review = reviews::table
                    .find(update.id)
                    .select(Review::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| not_found(update.id))?;
                if let Some(expected) = update.expected_version {
                    if expected != current.version {
                        return Err(ReviewError::Conflict {
                            expected,
                            actual: current.version,
                        });
                    }
                }
                let saved: Review = diesel::update(reviews::table.find(update.id))
                    .set((
                        reviews::status.eq(update.status),
                        reviews::review_data.eq(update.review_data),
                        reviews::last_updated_by.eq(update.updated_by),
                        reviews::version.eq(current.version + 1),
                        reviews::last_updated.eq(Utc::now()),
                    ))
                    .returning(Review::as_returning())
                    .get_result(conn)?;
                record_version_if_needed(conn, &saved)?;
                Ok(saved)
            })
        })
        .await
    }

    async fn versions(&self, review_id: i64) -> Result<Vec<ReviewVersion>, ReviewError> {
        with_connection(&self.pool, move |conn| {
            Ok(review_versions::table
                .filter(review_versions::review_id.eq(review_id))
                .order(review_versions::version_number.asc())
                .select(ReviewVersion::as_select())
                .load(conn)?)
        })
        .await
    }
}

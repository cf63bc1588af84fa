use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::shared::models::AssessmentStatus;
use crate::core::shared::schema::assessments;
use crate::core::shared::utils::{is_unique_violation, with_connection, DbPool};
use crate::references::{generate_reference_with, PrimeSet};

use super::error::AssessmentError;
use super::types::{Assessment, NewAssessment};

fn duplicate_error(system_id: i64, period: &str, status: AssessmentStatus) -> AssessmentError {
    AssessmentError::Validation(format!(
        "An assessment for system {} in period {} with status {} already exists",
        system_id, period, status
    ))
}

fn reference_for(id: i64) -> Option<String> {
    u64::try_from(id)
        .ok()
        .and_then(|pk| generate_reference_with(pk, PrimeSet::Assessment).ok())
}

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Inserts the row and assigns its reference.
    async fn create(&self, new: NewAssessment) -> Result<Assessment, AssessmentError>;
    async fn get(&self, id: i64) -> Result<Option<Assessment>, AssessmentError>;
    async fn list_for_systems(
        &self,
        system_ids: &[i64],
        period: &str,
        status: Option<AssessmentStatus>,
    ) -> Result<Vec<Assessment>, AssessmentError>;
    async fn update_data(
        &self,
        id: i64,
        data: serde_json::Value,
        updated_by: Option<i64>,
    ) -> Result<Assessment, AssessmentError>;
    /// Re-checks `(system, period, status)` uniqueness.
    async fn set_status(
        &self,
        id: i64,
        status: AssessmentStatus,
        updated_by: Option<i64>,
    ) -> Result<Assessment, AssessmentError>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct AssessmentRows {
    next_id: i64,
    rows: HashMap<i64, Assessment>,
}

impl AssessmentRows {
    fn conflicts(&self, id: i64, system_id: i64, period: &str, status: AssessmentStatus) -> bool {
        self.rows.values().any(|a| {
            a.id != id
                && a.system_id == system_id
                && a.assessment_period == period
                && a.status == status
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAssessmentStore {
    data: Arc<RwLock<AssessmentRows>>,
}

impl InMemoryAssessmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssessmentStore for InMemoryAssessmentStore {
    async fn create(&self, new: NewAssessment) -> Result<Assessment, AssessmentError> {
        let mut data = self.data.write().await;
        if data.conflicts(0, new.system_id, &new.assessment_period, new.status) {
            return Err(duplicate_error(new.system_id, &new.assessment_period, new.status));
        }
        data.next_id += 1;
        let id = data.next_id;
        let now = Utc::now();
        let assessment = Assessment {
            id,
            reference: reference_for(id),
            system_id: new.system_id,
            assessment_period: new.assessment_period,
            status: new.status,
            framework: new.framework,
            caf_profile: new.caf_profile,
            review_type: new.review_type,
            assessments_data: new.assessments_data,
            created_by: new.created_by,
            last_updated_by: new.last_updated_by,
            created_on: now,
            last_updated: now,
        };
        data.rows.insert(id, assessment.clone());
        Ok(assessment)
    }

    async fn get(&self, id: i64) -> Result<Option<Assessment>, AssessmentError> {
        Ok(self.data.read().await.rows.get(&id).cloned())
    }

    async fn list_for_systems(
        &self,
        system_ids: &[i64],
        period: &str,
        status: Option<AssessmentStatus>,
    ) -> Result<Vec<Assessment>, AssessmentError> {
        let data = self.data.read().await;
        let mut found: Vec<Assessment> = data
            .rows
            .values()
            .filter(|a| system_ids.contains(&a.system_id))
            .filter(|a| a.assessment_period == period)
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.id);
        Ok(found)
    }

    async fn update_data(
        &self,
        id: i64,
        data: serde_json::Value,
        updated_by: Option<i64>,
    ) -> Result<Assessment, AssessmentError> {
        let mut rows = self.data.write().await;
        let assessment = rows
            .rows
            .get_mut(&id)
            .ok_or_else(|| AssessmentError::NotFound(format!("Assessment {}", id)))?;
        assessment.assessments_data = data;
        assessment.last_updated_by = updated_by;
        assessment.last_updated = Utc::now();
        Ok(assessment.clone())
    }

    async fn set_status(
        &self,
        id: i64,
        status: AssessmentStatus,
        updated_by: Option<i64>,
    ) -> Result<Assessment, AssessmentError> {
        let mut data = self.data.write().await;
        let (system_id, period) = match data.rows.get(&id) {
            Some(a) => (a.system_id, a.assessment_period.clone()),
            None => return Err(AssessmentError::NotFound(format!("Assessment {}", id))),
        };
        if data.conflicts(id, system_id, &period, status) {
            return Err(duplicate_error(system_id, &period, status));
        }
        let assessment = data
            .rows
            .get_mut(&id)
            .ok_or_else(|| AssessmentError::NotFound(format!("Assessment {}", id)))?;
        assessment.status = status;
        assessment.last_updated_by = updated_by;
        assessment.last_updated = Utc::now();
        Ok(assessment.clone())
    }
}

// ============================================================================
// PostgreSQL store
// ============================================================================

#[derive(Clone)]
pub struct PgAssessmentStore {
    pool: DbPool,
}

impl PgAssessmentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssessmentStore for PgAssessmentStore {
    async fn create(&self, new: NewAssessment) -> Result<Assessment, AssessmentError> {
        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, AssessmentError, _>(|conn| {
                let inserted: Assessment = diesel::insert_into(assessments::table)
                    .values(&new)
                    .returning(Assessment::as_returning())
                    .get_result(conn)
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            duplicate_error(new.system_id, &new.assessment_period, new.status)
                        } else {
                            AssessmentError::from(e)
                        }
                    })?;
                Ok(diesel::update(assessments::table.find(inserted.id))
                    .set(assessments::reference.eq(reference_for(inserted.id)))
                    .returning(Assessment::as_returning())
                    .get_result(conn)?)
            })
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<Assessment>, AssessmentError> {
        with_connection(&self.pool, move |conn| {
            Ok(assessments::table
                .find(id)
                .select(Assessment::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn list_for_systems(
        &self,
        system_ids: &[i64],
        period: &str,
        status: Option<AssessmentStatus>,
    ) -> Result<Vec<Assessment>, AssessmentError> {
        let system_ids = system_ids.to_vec();
        let period = period.to_string();
        with_connection(&self.pool, move |conn| {
            let mut query = assessments::table
                .filter(assessments::system_id.eq_any(system_ids))
                .filter(assessments::assessment_period.eq(period))
                .into_boxed();
            if let Some(status) = status {
                query = query.filter(assessments::status.eq(status));
            }
            Ok(query
                .order(assessments::id.asc())
                .select(Assessment::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn update_data(
        &self,
        id: i64,
        data: serde_json::Value,
        updated_by: Option<i64>,
    ) -> Result<Assessment, AssessmentError> {
        with_connection(&self.pool, move |conn| {
            diesel::update(assessments::table.find(id))
                .set((
                    assessments::assessments_data.eq(data),
                    assessments::last_updated_by.eq(updated_by),
                    assessments::last_updated.eq(Utc::now()),
                ))
                .returning(Assessment::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| AssessmentError::NotFound(format!("Assessment {}", id)))
        })
        .await
    }

    async fn set_status(
        &self,
        id: i64,
        status: AssessmentStatus,
        updated_by: Option<i64>,
    ) -> Result<Assessment, AssessmentError> {
        with_connection(&self.pool, move |conn| {
            let updated = diesel::update(assessments::table.find(id))
                .set((
                    assessments::status.eq(status),
                    assessments::last_updated_by.eq(updated_by),
                    assessments::last_updated.eq(Utc::now()),
                ))
                .returning(Assessment::as_returning())
                .get_result(conn)
                .optional();
            match updated {
                Ok(Some(assessment)) => Ok(assessment),
                Ok(None) => Err(AssessmentError::NotFound(format!("Assessment {}", id))),
                Err(e) if is_unique_violation(&e) => Err(AssessmentError::Validation(format!(
                    "Another assessment for this system and period is already {}",
                    status
                ))),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::models::CafProfile;

    fn new_assessment(system_id: i64) -> NewAssessment {
        NewAssessment {
            system_id,
            assessment_period: "25/26".into(),
            status: AssessmentStatus::Draft,
            framework: "caf32".into(),
            caf_profile: CafProfile::Baseline,
            review_type: None,
            assessments_data: serde_json::json!({}),
            created_by: Some(1),
            last_updated_by: Some(1),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_reference() {
        let store = InMemoryAssessmentStore::new();
        let created = store.create(new_assessment(1)).await.expect("create failed");

        assert_eq!(created.status, AssessmentStatus::Draft);
        assert_eq!(created.reference, reference_for(created.id));
        assert!(created.reference.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_draft_rejected() {
        let store = InMemoryAssessmentStore::new();
        store.create(new_assessment(1)).await.expect("create failed");

        let duplicate = store.create(new_assessment(1)).await;
        assert!(matches!(duplicate, Err(AssessmentError::Validation(_))));

        store.create(new_assessment(2)).await.expect("other system is fine");
    }

    #[tokio::test]
    async fn test_status_change_rechecks_uniqueness() {
        let store = InMemoryAssessmentStore::new();
        let first = store.create(new_assessment(1)).await.expect("create failed");
        store
            .set_status(first.id, AssessmentStatus::Submitted, Some(1))
            .await
            .expect("submit failed");

        let second = store.create(new_assessment(1)).await.expect("new draft allowed");
        let clash = store
            .set_status(second.id, AssessmentStatus::Submitted, Some(1))
            .await;
        assert!(matches!(clash, Err(AssessmentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_for_systems_filters() {
        let store = InMemoryAssessmentStore::new();
        let a = store.create(new_assessment(1)).await.expect("create failed");
        store.create(new_assessment(2)).await.expect("create failed");
        store
            .set_status(a.id, AssessmentStatus::Submitted, None)
            .await
            .expect("submit failed");

        let submitted = store
            .list_for_systems(&[1, 2], "25/26", Some(AssessmentStatus::Submitted))
            .await
            .expect("list failed");
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].id, a.id);

        let other_period = store
            .list_for_systems(&[1, 2], "24/25", None)
            .await
            .expect("list failed");
        assert!(other_period.is_empty());
    }
}

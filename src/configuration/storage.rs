use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::shared::schema::configurations;
use crate::core::shared::utils::{is_unique_violation, with_connection, DbPool};

use super::error::ConfigurationError;
use super::types::{Configuration, NewConfiguration};

#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// All rows in insertion order.
    async fn list(&self) -> Result<Vec<Configuration>, ConfigurationError>;
    async fn create(&self, new: NewConfiguration) -> Result<Configuration, ConfigurationError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigurationStore {
    rows: Arc<RwLock<Vec<Configuration>>>,
}

impl InMemoryConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigurationStore for InMemoryConfigurationStore {
    async fn list(&self) -> Result<Vec<Configuration>, ConfigurationError> {
        Ok(self.rows.read().await.clone())
    }

    async fn create(&self, new: NewConfiguration) -> Result<Configuration, ConfigurationError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|c| c.name == new.name) {
            return Err(ConfigurationError::Validation(format!(
                "Configuration '{}' already exists",
                new.name
            )));
        }
        let configuration = Configuration {
            id: rows.iter().map(|c| c.id).max().unwrap_or(0) + 1,
            name: new.name,
            current_assessment_period: new.current_assessment_period,
            assessment_period_end: new.assessment_period_end,
            default_framework: new.default_framework,
        };
        rows.push(configuration.clone());
        Ok(configuration)
    }
}

#[derive(Clone)]
pub struct PgConfigurationStore {
    pool: DbPool,
}

impl PgConfigurationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigurationStore for PgConfigurationStore {
    async fn list(&self) -> Result<Vec<Configuration>, ConfigurationError> {
        with_connection(&self.pool, |conn| {
            Ok(configurations::table
                .order(configurations::id.asc())
                .select(Configuration::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn create(&self, new: NewConfiguration) -> Result<Configuration, ConfigurationError> {
        with_connection(&self.pool, move |conn| {
            diesel::insert_into(configurations::table)
                .values(&new)
                .returning(Configuration::as_returning())
                .get_result(conn)
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ConfigurationError::Validation(format!(
                            "Configuration '{}' already exists",
                            new.name
                        ))
                    } else {
                        ConfigurationError::from(e)
                    }
                })
        })
        .await
    }
}

//! CAF framework definitions and the walks over assessment answers.

pub mod completion;
pub mod error;
pub mod loader;
pub mod status;
pub mod types;

use std::collections::BTreeMap;
use std::path::Path;

pub use completion::{
    is_complete, is_objective_complete, is_outcome_complete, objective_progress,
    ObjectiveProgress, OutcomeProgress,
};
pub use error::FrameworkError;
pub use status::{
    calculate_outcome_status, key_to_status, min_profile_requirement_met, status_to_key,
    OutcomeStatus, Status,
};
pub use types::{Framework, Indicator, IndicatorLevel, Objective, Outcome, Principle};

/// Frameworks known to the service, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct FrameworkRegistry {
    frameworks: BTreeMap<String, Framework>,
}

impl FrameworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_dir(dir: &Path) -> Result<Self, FrameworkError> {
        let mut registry = Self::new();
        for framework in loader::load_dir(dir)? {
            registry.insert(framework);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, framework: Framework) {
        self.frameworks.insert(framework.id.clone(), framework);
    }

    pub fn with_yaml(mut self, id: &str, yaml: &str) -> Result<Self, FrameworkError> {
        self.insert(loader::parse_framework(id, yaml)?);
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Result<&Framework, FrameworkError> {
        self.frameworks
            .get(id)
            .ok_or_else(|| FrameworkError::UnknownFramework(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.frameworks.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.frameworks.keys().map(String::as_str)
    }
}

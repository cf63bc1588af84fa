use serde::{Deserialize, Serialize};

use crate::core::shared::models::CafProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorLevel {
    Achieved,
    PartiallyAchieved,
    NotAchieved,
}

impl IndicatorLevel {
    /// Prefix used for indicator keys in assessment data, e.g. `partially-achieved_A1.a.3`.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Achieved => "achieved",
            Self::PartiallyAchieved => "partially-achieved",
            Self::NotAchieved => "not-achieved",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "achieved" => Some(Self::Achieved),
            "partially-achieved" => Some(Self::PartiallyAchieved),
            "not-achieved" => Some(Self::NotAchieved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub level: IndicatorLevel,
    pub id: String,
    pub text: String,
}

impl Indicator {
    pub fn data_key(&self) -> String {
        format!("{}_{}", self.level.prefix(), self.id)
    }
}

/// Minimum status an outcome must reach for each CAF profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinProfileRequirement {
    pub baseline: Option<String>,
    pub enhanced: Option<String>,
}

impl MinProfileRequirement {
    pub fn for_profile(&self, profile: CafProfile) -> Option<&str> {
        match profile {
            CafProfile::Baseline => self.baseline.as_deref(),
            CafProfile::Enhanced => self.enhanced.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub min_profile_requirement: Option<MinProfileRequirement>,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principle {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub principles: Vec<Principle>,
}

impl Objective {
    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.principles.iter().flat_map(|p| p.outcomes.iter())
    }
}

/// A framework definition with its tree in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framework {
    pub id: String,
    pub objectives: Vec<Objective>,
}

impl Framework {
    pub fn objective(&self, code: &str) -> Option<&Objective> {
        self.objectives.iter().find(|o| o.code == code)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.objectives.iter().flat_map(|o| o.outcomes())
    }

    pub fn outcome(&self, code: &str) -> Option<&Outcome> {
        self.outcomes().find(|o| o.code == code)
    }
}

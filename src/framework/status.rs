use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::shared::models::CafProfile;

use super::error::FrameworkError;
use super::types::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Achieved")]
    Achieved,
    #[serde(rename = "Partially achieved")]
    PartiallyAchieved,
    #[serde(rename = "Not achieved")]
    NotAchieved,
}

impl Status {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Achieved => "Achieved",
            Self::PartiallyAchieved => "Partially achieved",
            Self::NotAchieved => "Not achieved",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Achieved => "achieved",
            Self::PartiallyAchieved => "partially_achieved",
            Self::NotAchieved => "not_achieved",
        }
    }

    pub fn score(&self) -> u8 {
        match self {
            Self::Achieved => 3,
            Self::PartiallyAchieved => 2,
            Self::NotAchieved => 1,
        }
    }

    pub fn from_text(text: &str) -> Result<Self, FrameworkError> {
        match text {
            "Achieved" => Ok(Self::Achieved),
            "Partially achieved" => Ok(Self::PartiallyAchieved),
            "Not achieved" => Ok(Self::NotAchieved),
            _ => Err(FrameworkError::InvalidStatus(text.to_string())),
        }
    }

    pub fn from_key(key: &str) -> Result<Self, FrameworkError> {
        match key {
            "achieved" => Ok(Self::Achieved),
            "partially_achieved" => Ok(Self::PartiallyAchieved),
            "not_achieved" => Ok(Self::NotAchieved),
            _ => Err(FrameworkError::InvalidKey(key.to_string())),
        }
    }
}

pub fn status_to_key(status: &str) -> Result<&'static str, FrameworkError> {
    Status::from_text(status).map(|s| s.key())
}

pub fn key_to_status(key: &str) -> Result<&'static str, FrameworkError> {
    Status::from_key(key).map(|s| s.text())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeStatus {
    pub outcome_status: Status,
    /// Set when the user changed the calculated status on the confirmation page.
    pub override_status: Option<String>,
}

impl OutcomeStatus {
    pub fn effective(&self) -> String {
        self.override_status
            .clone()
            .unwrap_or_else(|| self.outcome_status.text().to_string())
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Achieved only when every answered `achieved_*` statement is "agreed".
pub fn calculate_outcome_status(confirmation: &Value, indicators: &Value) -> OutcomeStatus {
    let override_status = confirmation
        .get("confirm_outcome")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|choice| capitalize(&choice.replace("change_to_", "").replace('_', " ")))
        .filter(|s| s != "Confirm");

    let mut answers: Vec<&Value> = Vec::new();
    if let Some(map) = indicators.as_object() {
        for (key, value) in map {
            if key.starts_with("achieved_") && !key.ends_with("_comment") && !answers.contains(&value) {
                answers.push(value);
            }
        }
    }

    let outcome_status = match answers.as_slice() {
        [only] if only.as_str() == Some("agreed") => Status::Achieved,
        _ => Status::NotAchieved,
    };

    OutcomeStatus {
        outcome_status,
        override_status,
    }
}

/// "Yes" when the outcome has no requirement for `profile` or `status` reaches it.
pub fn min_profile_requirement_met(
    outcome: &Outcome,
    profile: CafProfile,
    status: Option<&str>,
) -> Result<&'static str, FrameworkError> {
    let Some(required) = outcome
        .min_profile_requirement
        .as_ref()
        .and_then(|r| r.for_profile(profile))
    else {
        return Ok("Yes");
    };

    let status = match status {
        Some(s) if !s.is_empty() => Status::from_text(s)?,
        _ => return Ok("Not met"),
    };
    let required = Status::from_text(required)?;

    Ok(if status.score() >= required.score() {
        "Yes"
    } else {
        "Not met"
    })
}

use serde::Serialize;
use serde_json::Value;

use crate::core::shared::models::CafProfile;

use super::status::{calculate_outcome_status, min_profile_requirement_met, OutcomeStatus};
use super::types::Framework;

/// An outcome is complete once its confirmation page has a non-empty choice.
pub fn is_outcome_complete(data: &Value, outcome_code: &str) -> bool {
    data.get(outcome_code)
        .and_then(|o| o.get("confirmation"))
        .and_then(|c| c.get("confirm_outcome"))
        .and_then(Value::as_str)
        .is_some_and(|choice| !choice.is_empty())
}

/// Unknown objectives count as incomplete.
pub fn is_objective_complete(framework: &Framework, data: &Value, objective_code: &str) -> bool {
    framework
        .objective(objective_code)
        .is_some_and(|objective| objective.outcomes().all(|o| is_outcome_complete(data, &o.code)))
}

pub fn is_complete(framework: &Framework, data: &Value) -> bool {
    framework
        .objectives
        .iter()
        .all(|objective| is_objective_complete(framework, data, &objective.code))
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeProgress {
    pub code: String,
    pub title: String,
    pub complete: bool,
    pub status: OutcomeStatus,
    pub min_profile_met: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectiveProgress {
    pub code: String,
    pub title: String,
    pub completed_outcomes: usize,
    pub total_outcomes: usize,
    pub complete: bool,
    pub outcomes: Vec<OutcomeProgress>,
}

/// Per-objective completion with the computed status of every outcome.
pub fn objective_progress(
    framework: &Framework,
    data: &Value,
    profile: CafProfile,
) -> Vec<ObjectiveProgress> {
    framework
        .objectives
        .iter()
        .map(|objective| {
            let outcomes: Vec<OutcomeProgress> = objective
                .outcomes()
                .map(|outcome| {
                    let entry = data.get(&outcome.code);
                    let empty = Value::Null;
                    let confirmation = entry.and_then(|e| e.get("confirmation")).unwrap_or(&empty);
                    let indicators = entry.and_then(|e| e.get("indicators")).unwrap_or(&empty);
                    let status = calculate_outcome_status(confirmation, indicators);
                    let complete = is_outcome_complete(data, &outcome.code);
                    let min_profile_met = if complete {
                        min_profile_requirement_met(outcome, profile, Some(&status.effective())).ok()
                    } else {
                        None
                    };
                    OutcomeProgress {
                        code: outcome.code.clone(),
                        title: outcome.title.clone(),
                        complete,
                        status,
                        min_profile_met,
                    }
                })
                .collect();

            let completed_outcomes = outcomes.iter().filter(|o| o.complete).count();
            ObjectiveProgress {
                code: objective.code.clone(),
                title: objective.title.clone(),
                completed_outcomes,
                total_outcomes: outcomes.len(),
                complete: completed_outcomes == outcomes.len(),
                outcomes,
            }
        })
        .collect()
}

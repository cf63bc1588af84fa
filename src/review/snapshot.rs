//! Review data helpers: the creation snapshot and the assessor response sections.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::assessment::Assessment;
use crate::core::shared::models::{Assessor, Organisation, System};

use super::error::ReviewError;

pub const SYSTEM_DETAILS: &str = "system_details";
pub const ASSESSOR_DETAILS: &str = "assessor_details";
pub const ASSESSOR_RESPONSE_DATA: &str = "assessor_response_data";
pub const SYSTEM_AND_SCOPE: &str = "system_and_scope";
pub const ASSESSOR_ACTIONS: &str = "assessor_actions";

/// System fields an assessor may correct from the review.
pub const EDITABLE_SYSTEM_FIELDS: [&str; 5] = [
    "name",
    "description",
    "prev_assessments",
    "hosting_and_connectivity",
    "corporate_services",
];

pub fn system_details(assessment: &Assessment, system: &System, organisation: &Organisation) -> Value {
    json!({
        "reference": assessment.reference,
        "organisation": organisation.name,
        "assessment_period": assessment.assessment_period,
        "name": system.name,
        "description": system.description,
        "prev_assessments": system.last_assessed,
        "hosting_and_connectivity": system.hosting_type,
        "corporate_services": system.corporate_services,
    })
}

pub fn assessor_details(assessment: &Assessment, assessor: &Assessor) -> Value {
    json!({
        "review_type": assessment.review_type,
        "framework": assessment.framework,
        "profile": assessment.caf_profile.as_str(),
        "assessor": assessor.contact_block(),
    })
}

/// Adds the system and assessor snapshot to the initial review data.
pub fn with_snapshot(
    data: Option<Value>,
    assessment: &Assessment,
    system: &System,
    organisation: &Organisation,
    assessor: &Assessor,
) -> Value {
    let mut map = match data {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    map.insert(
        SYSTEM_DETAILS.to_string(),
        system_details(assessment, system, organisation),
    );
    map.insert(ASSESSOR_DETAILS.to_string(), assessor_details(assessment, assessor));
    Value::Object(map)
}

/// Replaces any non-object value with an empty object.
fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            ensure_object(other)
        }
    }
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    ensure_object(
        map.entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new())),
    )
}

fn root(data: &mut Value) -> &mut Map<String, Value> {
    ensure_object(data)
}

/// Stores `section` under `assessor_response_data`.
pub fn set_section(data: &mut Value, section: &str, body: Value) {
    object_entry(root(data), ASSESSOR_RESPONSE_DATA).insert(section.to_string(), body);
}

pub fn system_and_scope_confirmed(data: &Value) -> bool {
    data.get(ASSESSOR_RESPONSE_DATA)
        .and_then(|r| r.get(SYSTEM_AND_SCOPE))
        .and_then(|s| s.get("completed"))
        .and_then(Value::as_str)
        == Some("yes")
}

/// Records a system edit: the action log entry, a fresh scope confirmation
/// and the new snapshot value.
pub fn apply_system_edit(
    data: &mut Value,
    system_id: i64,
    field: &str,
    value: Value,
    who: &str,
    when: DateTime<Utc>,
) {
    let map = root(data);

    let response = object_entry(map, ASSESSOR_RESPONSE_DATA);
    let actions = object_entry(response, ASSESSOR_ACTIONS);
    let records = actions
        .entry("records".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !records.is_array() {
        *records = Value::Array(Vec::new());
    }
    if let Value::Array(records) = records {
        records.push(json!({
            "type": "modify",
            "details": {
                "what": "system",
                "id": system_id,
                "description": format!("Updated the field {}", field),
            },
            "who": who,
            "when": when.to_rfc3339(),
        }));
    }
    object_entry(response, SYSTEM_AND_SCOPE).remove("completed");

    object_entry(map, SYSTEM_DETAILS).insert(field.to_string(), value);
}

fn optional_text(field: &str, value: &Value) -> Result<Option<String>, ReviewError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(ReviewError::Validation(format!("{} must be a string", field))),
    }
}

fn text_list(field: &str, value: &Value) -> Result<Vec<String>, ReviewError> {
    let invalid = || ReviewError::Validation(format!("{} must be a list of strings", field));
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Applies a snapshot field edit to the system record.
pub fn update_system_field(system: &mut System, field: &str, value: &Value) -> Result<(), ReviewError> {
    match field {
        "name" => {
            system.name = optional_text(field, value)?
                .ok_or_else(|| ReviewError::Validation("name cannot be empty".to_string()))?;
        }
        "description" => system.description = optional_text(field, value)?,
        "prev_assessments" => system.last_assessed = optional_text(field, value)?,
        "hosting_and_connectivity" => system.hosting_type = text_list(field, value)?,
        "corporate_services" => system.corporate_services = text_list(field, value)?,
        other => {
            return Err(ReviewError::Validation(format!(
                "Unknown system field '{}'",
                other
            )))
        }
    }
    Ok(())
}

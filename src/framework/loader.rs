use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, info};

use super::error::FrameworkError;
use super::types::{
    Framework, Indicator, IndicatorLevel, MinProfileRequirement, Objective, Outcome, Principle,
};

/// Reads a YAML mapping as a list of entries, keeping document order.
fn ordered_map<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct OrderedVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::new();
            while let Some(entry) = map.next_entry::<String, T>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(OrderedVisitor(PhantomData))
}

#[derive(Deserialize)]
struct FrameworkFile {
    #[serde(default, deserialize_with = "ordered_map")]
    objectives: Vec<(String, ObjectiveDef)>,
}

#[derive(Deserialize)]
struct ObjectiveDef {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "ordered_map")]
    principles: Vec<(String, PrincipleDef)>,
}

#[derive(Deserialize)]
struct PrincipleDef {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "ordered_map")]
    outcomes: Vec<(String, OutcomeDef)>,
}

#[derive(Deserialize)]
struct OutcomeDef {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    min_profile_requirement: Option<MinProfileRequirement>,
    #[serde(default, deserialize_with = "ordered_map")]
    indicators: Vec<(String, IndicatorGroup)>,
}

struct IndicatorGroup(Vec<(String, serde_yaml::Value)>);

impl<'de> Deserialize<'de> for IndicatorGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ordered_map(deserializer).map(IndicatorGroup)
    }
}

/// Indicator statements are either plain text or a mapping with a `description`.
fn indicator_text(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Mapping(m) => m
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

pub fn parse_framework(id: &str, yaml: &str) -> Result<Framework, FrameworkError> {
    let file: FrameworkFile =
        serde_yaml::from_str(yaml).map_err(|e| FrameworkError::Parse {
            framework: id.to_string(),
            message: e.to_string(),
        })?;

    let mut seen_outcomes = HashSet::new();
    let mut seen_indicators = HashSet::new();
    let mut objectives = Vec::with_capacity(file.objectives.len());

    for (objective_code, objective) in file.objectives {
        let mut principles = Vec::with_capacity(objective.principles.len());
        for (principle_code, principle) in objective.principles {
            let mut outcomes = Vec::with_capacity(principle.outcomes.len());
            for (outcome_code, outcome) in principle.outcomes {
                if !seen_outcomes.insert(outcome_code.clone()) {
                    return Err(FrameworkError::DuplicateOutcome {
                        framework: id.to_string(),
                        outcome: outcome_code,
                    });
                }

                let mut indicators = Vec::new();
                for (level_key, group) in outcome.indicators {
                    let level = IndicatorLevel::from_prefix(&level_key)
                        .ok_or(FrameworkError::UnknownIndicatorLevel(level_key))?;
                    for (indicator_id, value) in group.0 {
                        let indicator = Indicator {
                            level,
                            id: indicator_id,
                            text: indicator_text(&value),
                        };
                        if !seen_indicators.insert(indicator.data_key()) {
                            return Err(FrameworkError::DuplicateIndicator {
                                framework: id.to_string(),
                                indicator: indicator.data_key(),
                            });
                        }
                        indicators.push(indicator);
                    }
                }

                outcomes.push(Outcome {
                    code: outcome_code,
                    title: outcome.title,
                    description: outcome.description,
                    min_profile_requirement: outcome.min_profile_requirement,
                    indicators,
                });
            }
            principles.push(Principle {
                code: principle_code,
                title: principle.title,
                description: principle.description,
                outcomes,
            });
        }
        objectives.push(Objective {
            code: objective_code,
            title: objective.title,
            description: objective.description,
            principles,
        });
    }

    debug!(
        "Parsed framework {} with {} outcomes",
        id,
        seen_outcomes.len()
    );
    Ok(Framework {
        id: id.to_string(),
        objectives,
    })
}

/// Loads every `*.yaml` / `*.yml` file in `dir`; the file stem is the framework id.
pub fn load_dir(dir: &Path) -> Result<Vec<Framework>, FrameworkError> {
    let io_error = |path: &Path, e: std::io::Error| FrameworkError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| io_error(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    paths.sort();

    let mut frameworks = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let yaml = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        let framework = parse_framework(id, &yaml)?;
        info!("Loaded framework {} from {}", id, path.display());
        frameworks.push(framework);
    }

    if frameworks.is_empty() {
        return Err(FrameworkError::NoFrameworks(dir.to_path_buf()));
    }
    Ok(frameworks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
objectives:
  B:
    title: Protecting against cyber attack
    principles:
      B1:
        title: Service protection policies
        outcomes:
          B1.a:
            title: Policy development
            indicators:
              achieved:
                B1.a.1: Policies are documented
              not-achieved:
                B1.a.2: Policies are absent
  A:
    title: Managing security risk
    principles:
      A1:
        title: Governance
        outcomes:
          A1.a:
            title: Board direction
            min_profile_requirement:
              baseline: Partially achieved
              enhanced: Achieved
            indicators:
              achieved:
                A1.a.1:
                  description: The board has cyber expertise
              partially-achieved:
                A1.a.2: Some direction exists
"#;

    #[test]
    fn test_parse_keeps_document_order() {
        let framework = parse_framework("caf32", SAMPLE).expect("should parse");

        let codes: Vec<&str> = framework.objectives.iter().map(|o| o.code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A"]);

        let outcome = framework.outcome("A1.a").expect("outcome present");
        assert_eq!(outcome.indicators.len(), 2);
        assert_eq!(outcome.indicators[0].data_key(), "achieved_A1.a.1");
        assert_eq!(outcome.indicators[0].text, "The board has cyber expertise");
        assert_eq!(outcome.indicators[1].level, IndicatorLevel::PartiallyAchieved);
        assert_eq!(
            outcome
                .min_profile_requirement
                .as_ref()
                .and_then(|r| r.enhanced.as_deref()),
            Some("Achieved")
        );
    }

    #[test]
    fn test_duplicate_outcome_rejected() {
        let yaml = r#"
objectives:
  A:
    principles:
      A1:
        outcomes:
          A1.a: {title: one}
      A2:
        outcomes:
          A1.a: {title: two}
"#;
        assert!(matches!(
            parse_framework("dup", yaml),
            Err(FrameworkError::DuplicateOutcome { .. })
        ));
    }

    #[test]
    fn test_duplicate_indicator_rejected() {
        let yaml = r#"
objectives:
  A:
    principles:
      A1:
        outcomes:
          A1.a:
            indicators:
              achieved: {A1.a.1: x}
          A1.b:
            indicators:
              achieved: {A1.a.1: y}
"#;
        assert!(matches!(
            parse_framework("dup", yaml),
            Err(FrameworkError::DuplicateIndicator { .. })
        ));
    }

    #[test]
    fn test_unknown_level_and_malformed_yaml() {
        let yaml = r#"
objectives:
  A:
    principles:
      A1:
        outcomes:
          A1.a:
            indicators:
              mostly-achieved: {A1.a.1: x}
"#;
        assert!(matches!(
            parse_framework("bad", yaml),
            Err(FrameworkError::UnknownIndicatorLevel(_))
        ));
        assert!(matches!(
            parse_framework("bad", "objectives: [1, 2"),
            Err(FrameworkError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("caf32.yaml"), SAMPLE).expect("write");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let frameworks = load_dir(dir.path()).expect("should load");
        assert_eq!(frameworks.len(), 1);
        assert_eq!(frameworks[0].id, "caf32");
    }

    #[test]
    fn test_load_empty_dir_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            load_dir(dir.path()),
            Err(FrameworkError::NoFrameworks(_))
        ));
        assert!(matches!(
            load_dir(&dir.path().join("missing")),
            Err(FrameworkError::Io { .. })
        ));
    }
}

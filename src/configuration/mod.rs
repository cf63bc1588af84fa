//! Assessment periods.
//!
//! The current period is the configuration row with the earliest end date
//! that is still in the future. It is re-read from the store on every call.

pub mod error;
pub mod handlers;
pub mod storage;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::error;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use error::ConfigurationError;
pub use storage::{ConfigurationStore, InMemoryConfigurationStore, PgConfigurationStore};
pub use types::{
    Configuration, CreateConfigurationRequest, CurrentConfiguration, NewConfiguration,
};

/// strftime form used by the admin screens, e.g. `31 March 2026 11:59pm`.
pub const LEGACY_DATE_FORMAT: &str = "%d %B %Y %I:%M%p";

static PERIOD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}/\d{2}$").expect("period pattern is a valid regex"));

/// Earliest row whose end is strictly after `now`. Rows with equal ends keep input order.
pub fn select_current(
    mut configs: Vec<Configuration>,
    now: DateTime<Utc>,
) -> Result<Configuration, ConfigurationError> {
    configs.sort_by_key(|c| c.assessment_period_end);
    configs
        .into_iter()
        .find(|c| c.assessment_period_end > now)
        .ok_or(ConfigurationError::NoCurrentPeriod)
}

/// Accepts RFC 3339 or the legacy admin text form. Text dates are UTC.
pub fn parse_period_end(value: &str) -> Result<DateTime<Utc>, ConfigurationError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, LEGACY_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ConfigurationError::InvalidDate(value.to_string()))
}

pub fn format_period_end(end: DateTime<Utc>) -> String {
    end.format(LEGACY_DATE_FORMAT).to_string().replace("AM", "am").replace("PM", "pm")
}

pub fn validate_period(period: &str) -> Result<(), ConfigurationError> {
    if PERIOD_PATTERN.is_match(period) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidPeriod(period.to_string()))
    }
}

/// Resolves the open configuration, logging loudly when there is none.
pub async fn current_configuration(
    store: &dyn ConfigurationStore,
    now: DateTime<Utc>,
) -> Result<Configuration, ConfigurationError> {
    let configs = store.list().await?;
    select_current(configs, now).map_err(|e| {
        error!("No configuration has an assessment period ending after {}", now);
        e
    })
}

pub async fn current_assessment_period(
    store: &dyn ConfigurationStore,
    now: DateTime<Utc>,
) -> Result<String, ConfigurationError> {
    Ok(current_configuration(store, now)
        .await?
        .current_assessment_period)
}

pub fn configure_configuration_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::CURRENT_CONFIGURATION,
            get(handlers::handle_get_current_configuration),
        )
        .route(
            ApiUrls::CONFIGURATIONS,
            post(handlers::handle_create_configuration),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config(id: i64, name: &str, end: DateTime<Utc>) -> Configuration {
        Configuration {
            id,
            name: name.to_string(),
            current_assessment_period: "25/26".to_string(),
            assessment_period_end: end,
            default_framework: "caf32".to_string(),
        }
    }

    #[test]
    fn test_select_current_picks_earliest_future_end() {
        let now = Utc::now();
        let configs = vec![
            config(1, "far", now + Duration::days(60)),
            config(2, "past", now - Duration::days(1)),
            config(3, "near", now + Duration::days(15)),
            config(4, "middle", now + Duration::days(30)),
        ];

        let current = select_current(configs, now).expect("should select");
        assert_eq!(current.name, "near");
    }

    #[test]
    fn test_select_current_without_future_rows() {
        let now = Utc::now();
        let configs = vec![
            config(1, "past_1", now - Duration::days(30)),
            config(2, "past_2", now - Duration::days(60)),
        ];
        assert!(matches!(
            select_current(configs, now),
            Err(ConfigurationError::NoCurrentPeriod)
        ));
        assert!(matches!(
            select_current(vec![], now),
            Err(ConfigurationError::NoCurrentPeriod)
        ));
    }

    #[test]
    fn test_select_current_end_equal_to_now_is_closed() {
        let now = Utc::now();
        let configs = vec![
            config(1, "closing", now),
            config(2, "open", now + Duration::seconds(1)),
        ];
        assert_eq!(select_current(configs, now).expect("should select").name, "open");
    }

    #[test]
    fn test_select_current_ties_keep_input_order() {
        let now = Utc::now();
        let end = now + Duration::days(10);
        let configs = vec![config(1, "config_a", end), config(2, "config_b", end)];
        assert_eq!(select_current(configs, now).expect("should select").name, "config_a");
    }

    #[test]
    fn test_parse_legacy_dates() {
        assert_eq!(
            parse_period_end("31 March 2026 11:59pm").expect("parse"),
            Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 0).unwrap()
        );
        assert_eq!(
            parse_period_end("15 June 2025 09:30am").expect("parse"),
            Utc.with_ymd_and_hms(2025, 6, 15, 9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_period_end("01 January 2026 12:00am").expect("parse"),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_period_end("15 July 2025 12:00pm").expect("parse"),
            Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_rfc3339_and_garbage() {
        assert_eq!(
            parse_period_end("2026-03-31T23:59:00+01:00").expect("parse"),
            Utc.with_ymd_and_hms(2026, 3, 31, 22, 59, 0).unwrap()
        );
        assert!(matches!(
            parse_period_end("next tuesday"),
            Err(ConfigurationError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_select_current_rolls_over_at_period_end() {
        let first = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2027, 3, 31, 23, 59, 0).unwrap();
        let configs = vec![config(2, "2026-27", second), config(1, "2025-26", first)];

        let new_year = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(select_current(configs.clone(), new_year).expect("current").id, 1);

        assert_eq!(select_current(configs.clone(), first).expect("current").id, 2);

        let april = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(select_current(configs.clone(), april).expect("current").id, 2);

        let after_both = Utc.with_ymd_and_hms(2027, 4, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            select_current(configs, after_both),
            Err(ConfigurationError::NoCurrentPeriod)
        ));
    }

    #[test]
    fn test_format_period_end() {
        let end = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 0).unwrap();
        assert_eq!(format_period_end(end), "31 March 2026 11:59pm");
    }

    #[test]
    fn test_validate_period() {
        assert!(validate_period("25/26").is_ok());
        assert!(validate_period("2025/26").is_err());
        assert!(validate_period("25-26").is_err());
        assert!(validate_period("").is_err());
    }

    #[tokio::test]
    async fn test_current_period_reads_store_each_time() {
        let store = InMemoryConfigurationStore::new();
        let now = Utc::now();
        assert!(current_assessment_period(&store, now).await.is_err());

        store
            .create(NewConfiguration {
                name: "2025".into(),
                current_assessment_period: "25/26".into(),
                assessment_period_end: now + Duration::days(1),
                default_framework: "caf32".into(),
            })
            .await
            .expect("create failed");

        assert_eq!(
            current_assessment_period(&store, now).await.expect("period"),
            "25/26"
        );
    }
}

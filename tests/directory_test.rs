mod common;

#[cfg(test)]
mod directory_tests {
    use super::common::{body_json, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use webcaf::core::shared::models::Role;
    use webcaf::directory::DirectoryStore;

    #[tokio::test]
    async fn test_advisor_creates_and_lists_systems() {
        let app = TestApp::new().await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;

        let response = app
            .post(
                "/api/systems",
                &advisor,
                json!({
                    "name": "Housing benefits",
                    "description": "Claims processing",
                    "hosting_type": ["hosted_on_premises"],
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["organisation_id"], app.organisation.id);
        assert_eq!(created["corporate_services"], json!([]));
        assert!(created["reference"].as_str().is_some_and(|r| !r.is_empty()));

        let response = app.get("/api/systems", &advisor).await;
        assert_eq!(response.status(), StatusCode::OK);
        let names: Vec<String> = body_json(response)
            .await
            .as_array()
            .map(|systems| {
                systems
                    .iter()
                    .filter_map(|s| s["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(names, vec!["Payments", "Housing benefits"]);
    }

    #[tokio::test]
    async fn test_system_names_are_unique_in_organisation() {
        let app = TestApp::new().await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;

        let response = app
            .post("/api/systems", &advisor, json!({"name": "Payments"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .is_some_and(|e| e.contains("already exists")));

        let response = app.post("/api/systems", &advisor, json!({"name": "  "})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let other = app.directory.add_organisation("Other Council").await;
        let elsewhere = app
            .sign_in_to("advisor2@example.com", Role::CyberAdvisor, other.id)
            .await;
        let response = app
            .post("/api/systems", &elsewhere, json!({"name": "Payments"}))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_organisation_roles_cannot_manage_systems() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;

        let response = app.get("/api/systems", &lead).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.post("/api/systems", &lead, json!({"name": "Rogue"})).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .post("/api/organisations", &lead, json!({"name": "Rogue Council"}))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_advisor_registers_organisation() {
        let app = TestApp::new().await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;

        let response = app
            .post(
                "/api/organisations",
                &advisor,
                json!({"name": "North District", "organisation_type": "local-government"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert!(created["reference"].as_str().is_some_and(|r| !r.is_empty()));
        let id = created["id"].as_i64().unwrap_or_default();
        let stored = app.directory.get_organisation(id).await.unwrap();
        assert_eq!(stored.map(|o| o.name), Some("North District".to_string()));

        let response = app
            .post("/api/organisations", &advisor, json!({"name": "North District"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_lead_manages_profiles() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;

        let response = app
            .post(
                "/api/profiles",
                &lead,
                json!({
                    "email": "analyst@example.com",
                    "first_name": "Ana",
                    "last_name": "Lyst",
                    "role": "organisation_user",
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["role"], "organisation_user");
        assert_eq!(created["organisation_id"], app.organisation.id);
        let profile_id = created["id"].as_i64().unwrap_or_default();

        let response = app.get("/api/profiles", &lead).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        let emails: Vec<&str> = listed
            .as_array()
            .map(|p| p.iter().filter_map(|p| p["email"].as_str()).collect())
            .unwrap_or_default();
        assert!(emails.contains(&"lead@example.com"));
        assert!(emails.contains(&"analyst@example.com"));

        let response = app
            .post(
                "/api/profiles",
                &lead,
                json!({
                    "email": "analyst@example.com",
                    "first_name": "Ana",
                    "last_name": "Lyst",
                    "role": "organisation_lead",
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(
                Method::DELETE,
                &format!("/api/profiles/{}", profile_id),
                Some(&lead.cookie),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(app.directory.get_profile(profile_id).await.unwrap().is_none());
        let user = app.directory.find_user_by_email("analyst@example.com").await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_profile_rules() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;

        let response = app
            .post(
                "/api/profiles",
                &lead,
                json!({
                    "email": "boss@example.com",
                    "first_name": "B",
                    "last_name": "Oss",
                    "role": "cyber_advisor",
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .post(
                "/api/profiles",
                &lead,
                json!({
                    "email": "not-an-email",
                    "first_name": "N",
                    "last_name": "O",
                    "role": "organisation_user",
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(
                Method::DELETE,
                &format!("/api/profiles/{}", lead.profile.id),
                Some(&lead.cookie),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let other = app.directory.add_organisation("Other Council").await;
        let outsider = app
            .sign_in_to("outsider@example.com", Role::OrganisationUser, other.id)
            .await;
        let response = app
            .send(
                Method::DELETE,
                &format!("/api/profiles/{}", outsider.profile.id),
                Some(&lead.cookie),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let user = app.sign_in("user@example.com", Role::OrganisationUser).await;
        let response = app.get("/api/profiles", &user).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

mod common;

#[cfg(test)]
mod review_tests {
    use super::common::{body_json, location, Session, TestApp};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use webcaf::config::AppConfig;
    use webcaf::core::shared::models::{ReviewStatus, Role, System};
    use webcaf::directory::DirectoryStore;
    use webcaf::review::ReviewStore;

    async fn create_review(app: &TestApp, advisor: &Session, assessment_id: i64, assessor_id: i64) -> Value {
        let response = app
            .post(
                "/api/reviews",
                advisor,
                json!({"assessment_id": assessment_id, "assessor_id": assessor_id}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    async fn confirm_scope(app: &TestApp, reviewer: &Session, review_id: i64, expected_version: i64) -> Value {
        let response = app
            .put(
                &format!("/api/reviews/{}/sections/system_and_scope", review_id),
                reviewer,
                json!({"data": {"completed": "yes"}, "expected_version": expected_version}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_review_creation_snapshots_system() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let assessment_id = app.submitted_assessment(&lead).await;
        let assessor = app.add_assessor("Acme Assurance", vec![]).await;

        let review = create_review(&app, &advisor, assessment_id, assessor.id).await;
        assert_eq!(review["status"], "to_do");
        assert_eq!(review["version"], 0);
        assert_eq!(review["can_edit"], true);
        assert_eq!(review["review_data"]["system_details"]["name"], "Payments");
        assert_eq!(
            review["review_data"]["system_details"]["organisation"],
            "Example Council"
        );
        assert_eq!(
            review["review_data"]["assessor_details"]["profile"],
            "baseline"
        );
        assert!(review["reference"].as_str().is_some());

        let response = app
            .post(
                "/api/reviews",
                &advisor,
                json!({"assessment_id": assessment_id, "assessor_id": assessor.id}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_single_review_mode_rejects_second_assessor() {
        let mut config = AppConfig::default();
        config.review.single_review_per_assessment = true;
        let app = TestApp::with_config(config).await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let assessment_id = app.submitted_assessment(&lead).await;
        let first = app.add_assessor("Acme Assurance", vec![]).await;
        let second = app.add_assessor("Beta Audit", vec![]).await;

        create_review(&app, &advisor, assessment_id, first.id).await;
        let response = app
            .post(
                "/api/reviews",
                &advisor,
                json!({"assessment_id": assessment_id, "assessor_id": second.id}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_draft_assessment_and_inactive_assessor_are_rejected() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let assessor = app.add_assessor("Acme Assurance", vec![]).await;
        let submitted_id = app.submitted_assessment(&lead).await;

        let response = app
            .post(
                "/api/assessments",
                &lead,
                json!({"system_id": app.system.id}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let draft_id = body_json(response).await["id"].as_i64().unwrap();
        let response = app
            .post(
                "/api/reviews",
                &advisor,
                json!({"assessment_id": draft_id, "assessor_id": assessor.id}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        app.directory.set_assessor_active(assessor.id, false).await;
        let response = app
            .post(
                "/api/reviews",
                &advisor,
                json!({"assessment_id": submitted_id, "assessor_id": assessor.id}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_review_access_by_role() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let user = app.sign_in("user@example.com", Role::OrganisationUser).await;
        let assessment_id = app.submitted_assessment(&lead).await;
        let assessor = app.add_assessor("Acme Assurance", vec![]).await;
        let review = create_review(&app, &advisor, assessment_id, assessor.id).await;
        let review_id = review["id"].as_i64().unwrap();

        let response = app.get(&format!("/api/reviews/{}", review_id), &user).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/oidc/authenticate/"));

        let response = app.get(&format!("/api/reviews/{}", review_id), &lead).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["can_edit"], false);

        let response = app
            .put(
                &format!("/api/reviews/{}/sections/system_and_scope", review_id),
                &lead,
                json!({"data": {"completed": "yes"}}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .post(
                &format!("/api/reviews/{}/status", review_id),
                &lead,
                json!({"status": "cancelled"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reviewers_only_see_their_assessors_reviews() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let member = app.sign_in("member@example.com", Role::Reviewer).await;
        let outsider = app.sign_in("outsider@example.com", Role::Reviewer).await;
        let assessment_id = app.submitted_assessment(&lead).await;
        let assessor = app
            .add_assessor("Acme Assurance", vec![member.profile.id])
            .await;
        let review = create_review(&app, &advisor, assessment_id, assessor.id).await;
        let review_id = review["id"].as_i64().unwrap();

        let response = app.get("/api/reviews", &member).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        assert_eq!(listed[0]["id"], review_id);

        let response = app.get("/api/reviews", &outsider).await;
        assert_eq!(body_json(response).await, json!([]));

        let response = app
            .get(&format!("/api/reviews/{}", review_id), &outsider)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.get("/api/reviews", &lead).await;
        assert_eq!(body_json(response).await.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_system_edit_from_review() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let reviewer = app.sign_in("reviewer@example.com", Role::Reviewer).await;
        let assessment_id = app.submitted_assessment(&lead).await;
        let assessor = app
            .add_assessor("Acme Assurance", vec![reviewer.profile.id])
            .await;
        let review = create_review(&app, &advisor, assessment_id, assessor.id).await;
        let review_id = review["id"].as_i64().unwrap();
        confirm_scope(&app, &reviewer, review_id, 0).await;

        let response = app
            .put(
                &format!("/api/reviews/{}/system", review_id),
                &reviewer,
                json!({"field": "name", "value": "Payments Platform", "expected_version": 1}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        let data = &updated["review_data"];
        assert_eq!(data["system_details"]["name"], "Payments Platform");
        assert!(data["assessor_response_data"]["system_and_scope"]
            .get("completed")
            .is_none());
        let records = &data["assessor_response_data"]["assessor_actions"]["records"];
        assert_eq!(records[0]["type"], "modify");
        assert_eq!(records[0]["who"], "reviewer@example.com");

        let system = app.directory.get_system(app.system.id).await.unwrap().unwrap();
        assert_eq!(system.name, "Payments Platform");

        let response = app
            .put(
                &format!("/api/reviews/{}/system", review_id),
                &reviewer,
                json!({"field": "reference", "value": "X"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_review_lifecycle_completes_assessment() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let first_reviewer = app.sign_in("first@example.com", Role::Reviewer).await;
        let second_reviewer = app.sign_in("second@example.com", Role::Assessor).await;
        let assessment_id = app.submitted_assessment(&lead).await;
        let first = app
            .add_assessor("Acme Assurance", vec![first_reviewer.profile.id])
            .await;
        let second = app
            .add_assessor("Beta Audit", vec![second_reviewer.profile.id])
            .await;
        let first_id = create_review(&app, &advisor, assessment_id, first.id).await["id"]
            .as_i64()
            .unwrap();
        let second_id = create_review(&app, &advisor, assessment_id, second.id).await["id"]
            .as_i64()
            .unwrap();

        let confirmed = confirm_scope(&app, &first_reviewer, first_id, 0).await;
        assert_eq!(confirmed["status"], "in_progress");
        assert_eq!(confirmed["version"], 1);

        let response = app
            .put(
                &format!("/api/reviews/{}/sections/system_and_scope", first_id),
                &first_reviewer,
                json!({"data": {"completed": "no"}, "expected_version": 0}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .post(
                &format!("/api/reviews/{}/status", first_id),
                &first_reviewer,
                json!({"status": "completed", "expected_version": 1}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let completed = body_json(response).await;
        assert_eq!(completed["status"], "completed");
        assert_eq!(completed["current_version_number"], 1);
        assert_eq!(completed["all_versions"].as_array().map(Vec::len), Some(1));

        let response = app
            .get(&format!("/api/reviews/{}/versions/1", first_id), &first_reviewer)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["version_number"], 1);
        let response = app
            .get(&format!("/api/reviews/{}/versions/2", first_id), &first_reviewer)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .put(
                &format!("/api/reviews/{}/sections/objective_A", first_id),
                &first_reviewer,
                json!({"data": {"comments": "late change"}}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .get(&format!("/api/assessments/{}", assessment_id), &lead)
            .await;
        assert_eq!(body_json(response).await["status"], "submitted");

        let response = app
            .post(
                &format!("/api/reviews/{}/status", first_id),
                &first_reviewer,
                json!({"reopen": true}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "in_progress");
        let response = app
            .post(
                &format!("/api/reviews/{}/status", first_id),
                &first_reviewer,
                json!({"status": "completed"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let recompleted = body_json(response).await;
        assert_eq!(recompleted["current_version_number"], 1);

        let response = app
            .post(
                &format!("/api/reviews/{}/status", second_id),
                &second_reviewer,
                json!({"status": "completed"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        confirm_scope(&app, &second_reviewer, second_id, 0).await;
        let response = app
            .post(
                &format!("/api/reviews/{}/status", second_id),
                &second_reviewer,
                json!({"status": "completed"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .get(&format!("/api/assessments/{}", assessment_id), &lead)
            .await;
        assert_eq!(body_json(response).await["status"], "completed");

        let response = app.get("/api/reviews", &first_reviewer).await;
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_second_completed_cycle_leaves_review_open() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let reviewer = app.sign_in("reviewer@example.com", Role::Reviewer).await;
        let assessor = app
            .add_assessor("Acme Assurance", vec![reviewer.profile.id])
            .await;

        let first_assessment = app.submitted_assessment(&lead).await;
        let first_id = create_review(&app, &advisor, first_assessment, assessor.id).await["id"]
            .as_i64()
            .unwrap();
        confirm_scope(&app, &reviewer, first_id, 0).await;
        let response = app
            .post(
                &format!("/api/reviews/{}/status", first_id),
                &reviewer,
                json!({"status": "completed"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = app
            .get(&format!("/api/assessments/{}", first_assessment), &lead)
            .await;
        assert_eq!(body_json(response).await["status"], "completed");

        let second_assessment = app.submitted_assessment(&lead).await;
        let second_id = create_review(&app, &advisor, second_assessment, assessor.id).await["id"]
            .as_i64()
            .unwrap();
        let confirmed = confirm_scope(&app, &reviewer, second_id, 0).await;
        let response = app
            .post(
                &format!("/api/reviews/{}/status", second_id),
                &reviewer,
                json!({"status": "completed"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .is_some_and(|e| e.contains("already has a completed assessment")));

        let review = app.state.reviews.get(second_id).await.unwrap().unwrap();
        assert_eq!(review.status, ReviewStatus::InProgress);
        assert_eq!(json!(review.version), confirmed["version"]);
        assert!(app.state.reviews.versions(second_id).await.unwrap().is_empty());
        let response = app
            .get(&format!("/api/assessments/{}", second_assessment), &lead)
            .await;
        assert_eq!(body_json(response).await["status"], "submitted");
    }

    #[tokio::test]
    async fn test_system_rename_clash_leaves_review_untouched() {
        let app = TestApp::new().await;
        let lead = app.sign_in("lead@example.com", Role::OrganisationLead).await;
        let advisor = app.sign_in("advisor@example.com", Role::CyberAdvisor).await;
        let reviewer = app.sign_in("reviewer@example.com", Role::Reviewer).await;
        let payroll = app
            .directory
            .add_system(System {
                id: 0,
                organisation_id: app.organisation.id,
                name: "Payroll".into(),
                description: None,
                reference: None,
                last_assessed: None,
                hosting_type: vec![],
                corporate_services: vec![],
            })
            .await;
        let assessment_id = app.submitted_assessment(&lead).await;
        let assessor = app
            .add_assessor("Acme Assurance", vec![reviewer.profile.id])
            .await;
        let review_id = create_review(&app, &advisor, assessment_id, assessor.id).await["id"]
            .as_i64()
            .unwrap();
        let before = confirm_scope(&app, &reviewer, review_id, 0).await;

        let response = app
            .put(
                &format!("/api/reviews/{}/system", review_id),
                &reviewer,
                json!({"field": "name", "value": "Payroll", "expected_version": 1}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let review = app.state.reviews.get(review_id).await.unwrap().unwrap();
        assert_eq!(json!(review.version), before["version"]);
        assert_eq!(review.review_data["system_details"]["name"], "Payments");
        assert_eq!(
            review.review_data["assessor_response_data"]["system_and_scope"]["completed"],
            "yes"
        );

        let system = app.directory.get_system(app.system.id).await.unwrap().unwrap();
        assert_eq!(system.name, "Payments");
        let other = app.directory.get_system(payroll.id).await.unwrap().unwrap();
        assert_eq!(other.name, "Payroll");
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{UserData, UserDetail};
    use crate::db::{CompletionKind, award_completion, get_user_events};
    use crate::models::{ProgressSummary, SystemStats};
    use crate::test::test_utils::{
        create_standard_test_db, login_standard, login_test_user, setup_test_client,
    };
    use crate::validation::ValidationResponse;
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn test_learners_cannot_use_admin_endpoints() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        let cookies = login_standard(&client, "learner_user").await;
        let admin_id = test_db.user_id("admin_user").expect("admin");

        for endpoint in [
            "/api/admin/users".to_string(),
            format!("/api/admin/users/{}", admin_id),
            "/api/admin/progress".to_string(),
            "/api/admin/stats".to_string(),
        ] {
            let response = client.get(endpoint.clone()).cookies(cookies.clone()).dispatch().await;
            assert_eq!(
                response.status(),
                Status::Forbidden,
                "Learner reached {}",
                endpoint
            );
        }

        let response = client
            .put(format!("/api/admin/users/{}", admin_id))
            .header(ContentType::JSON)
            .cookies(cookies)
            .body(json!({ "is_admin": false }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_admin_lists_and_inspects_users() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        let learner_id = test_db.user_id("learner_user").expect("learner");
        award_completion(&test_db.pool, learner_id, CompletionKind::Tutorial, 0, 5)
            .await
            .expect("award");

        let cookies = login_standard(&client, "admin_user").await;

        let response = client.get("/api/admin/users").cookies(cookies.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let users: Vec<UserData> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(users.len(), 3);

        let response = client
            .get(format!("/api/admin/users/{}", learner_id))
            .cookies(cookies.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let detail: UserDetail =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(detail.user.username, "learner_user");
        assert_eq!(detail.progress.points, 5);
        assert!(detail.certificates.is_empty());

        let response = client
            .get("/api/admin/users/9999")
            .cookies(cookies)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_admin_updates_user() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        let learner_id = test_db.user_id("learner_user").expect("learner");
        let cookies = login_standard(&client, "admin_user").await;

        let response = client
            .put(format!("/api/admin/users/{}", learner_id))
            .header(ContentType::JSON)
            .cookies(cookies.clone())
            .body(
                json!({
                    "profile": { "school": "Hill Primary" },
                    "is_admin": true,
                    "password": "reset_pw"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let user: UserData = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(user.is_admin);
        assert_eq!(user.role, "admin");
        assert_eq!(user.profile.school.as_deref(), Some("Hill Primary"));
        assert_eq!(user.profile.full_name.as_deref(), Some("Ada Learner"));

        let events = get_user_events(&test_db.pool, learner_id, 10)
            .await
            .expect("events");
        assert!(events.iter().any(|e| e.event_type == "admin_update"));

        login_test_user(&client, "learner_user", "reset_pw").await;

        let response = client
            .put(format!("/api/admin/users/{}", learner_id))
            .header(ContentType::JSON)
            .cookies(cookies)
            .body(json!({ "password": "123" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[rocket::async_test]
    async fn test_admin_cannot_revoke_own_access() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        let admin_id = test_db.user_id("admin_user").expect("admin");
        let cookies = login_standard(&client, "admin_user").await;

        let response = client
            .put(format!("/api/admin/users/{}", admin_id))
            .header(ContentType::JSON)
            .cookies(cookies.clone())
            .body(json!({ "is_admin": false }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ValidationResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(body.errors.contains_key("is_admin"));

        let response = client.get("/api/me").cookies(cookies).dispatch().await;
        let me: UserData = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(me.is_admin);
    }

    #[rocket::async_test]
    async fn test_admin_progress_and_stats() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        let learner_id = test_db.user_id("learner_user").expect("learner");
        award_completion(&test_db.pool, learner_id, CompletionKind::Challenge, 1, 10)
            .await
            .expect("award");

        let cookies = login_standard(&client, "admin_user").await;

        let response = client
            .get("/api/admin/progress")
            .cookies(cookies.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let summaries: Vec<ProgressSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(summaries[0].username, "learner_user");
        assert_eq!(summaries[0].points, 10);
        assert_eq!(summaries[0].challenges_completed, 1);

        let response = client.get("/api/admin/stats").cookies(cookies).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let stats: SystemStats =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.total_points, 10);
        assert_eq!(stats.total_certificates, 0);
        // The admin's own login is an event.
        assert!(stats.total_events >= 1);
    }
}

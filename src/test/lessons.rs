#[cfg(test)]
mod tests {
    use crate::api::{
        ChallengeSummary, CompletionResponse, ProgressResponse, RunResponse, SubmissionResponse,
        TutorialSummary, TutorialView,
    };
    use crate::content::Catalog;
    use crate::rewards::{BADGES, CHALLENGE_POINTS, CertificateKind, TUTORIAL_POINTS};
    use crate::test::test_utils::{create_standard_test_db, login_standard, setup_test_client};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn test_tutorials_are_public_with_navigation() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;
        let catalog = Catalog::embedded().expect("catalog");

        let response = client.get("/api/tutorials").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let tutorials: Vec<TutorialSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(tutorials.len(), catalog.tutorials.len());
        assert!(tutorials.iter().all(|t| t.completed.is_none()));

        let response = client.get("/api/tutorials/0").dispatch().await;
        let first: TutorialView =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(first.title, catalog.tutorials[0].title);
        assert_eq!(first.navigation.previous, None);
        assert_eq!(first.navigation.next, Some(1));

        let last_id = catalog.tutorials.len() - 1;
        let response = client.get(format!("/api/tutorials/{}", last_id)).dispatch().await;
        let last: TutorialView =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(last.navigation.next, None);

        let response = client.get("/api/tutorials/999").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_completing_a_tutorial_twice_awards_once() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;
        let cookies = login_standard(&client, "learner_user").await;

        let response = client
            .post("/api/tutorials/1/complete")
            .cookies(cookies.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let first: CompletionResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(first.awarded);
        assert_eq!(first.points_awarded, TUTORIAL_POINTS);
        let badge = first.new_badge.expect("First completion should grant a badge");
        assert!(BADGES.contains(&badge.as_str()));

        let response = client
            .post("/api/tutorials/1/complete")
            .cookies(cookies.clone())
            .dispatch()
            .await;
        let second: CompletionResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(!second.awarded);
        assert_eq!(second.points_awarded, 0);
        assert!(second.new_badge.is_none());
        assert_eq!(second.progress.points, TUTORIAL_POINTS);

        let response = client.get("/api/tutorials").cookies(cookies).dispatch().await;
        let tutorials: Vec<TutorialSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(tutorials[1].completed, Some(true));
        assert_eq!(tutorials[0].completed, Some(false));
    }

    #[rocket::async_test]
    async fn test_run_code_reports_outcomes() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .post("/api/run")
            .header(ContentType::JSON)
            .body(json!({ "code": "echo hi" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let run: RunResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(run.result.succeeded());
        assert_eq!(run.output, "hi\n");
        assert!(run.error.is_none());

        // Failing learner code is an outcome, not an HTTP error.
        let response = client
            .post("/api/run")
            .header(ContentType::JSON)
            .body(
                json!({ "code": "echo 'NameError: name is not defined' >&2; exit 1" }).to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let run: RunResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(!run.result.succeeded());
        assert_eq!(run.error.as_deref(), Some("NameError: name is not defined"));

        let response = client
            .post("/api/run")
            .header(ContentType::JSON)
            .body(json!({ "code": "" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[rocket::async_test]
    async fn test_challenge_submission_checks_output_and_awards_once() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;
        let cookies = login_standard(&client, "learner_user").await;

        let response = client
            .post("/api/challenges/0/submit")
            .header(ContentType::JSON)
            .cookies(cookies.clone())
            .body(json!({ "code": "echo 'Hello, World'" }).to_string())
            .dispatch()
            .await;
        let wrong: SubmissionResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(!wrong.passed);
        assert!(wrong.completion.is_none());
        assert_eq!(wrong.expected_output.as_deref(), Some("Hello, Python!"));

        let right_code = json!({ "code": "echo 'Hello, Python!'" }).to_string();
        let response = client
            .post("/api/challenges/0/submit")
            .header(ContentType::JSON)
            .cookies(cookies.clone())
            .body(right_code.clone())
            .dispatch()
            .await;
        let right: SubmissionResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(right.passed);
        assert!(right.expected_output.is_none());
        let completion = right.completion.expect("Signed-in pass should be recorded");
        assert!(completion.awarded);
        assert_eq!(completion.points_awarded, CHALLENGE_POINTS);

        let response = client
            .post("/api/challenges/0/submit")
            .header(ContentType::JSON)
            .cookies(cookies.clone())
            .body(right_code)
            .dispatch()
            .await;
        let again: SubmissionResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(again.passed);
        assert!(!again.completion.expect("completion").awarded);

        let response = client.get("/api/progress").cookies(cookies.clone()).dispatch().await;
        let progress: ProgressResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(progress.progress.points, CHALLENGE_POINTS);
        assert_eq!(progress.progress.completed_challenges, vec![0]);

        let response = client.get("/api/challenges").cookies(cookies).dispatch().await;
        let challenges: Vec<ChallengeSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(challenges[0].completed, Some(true));
    }

    #[rocket::async_test]
    async fn test_guest_submission_is_checked_but_not_recorded() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .post("/api/challenges/1/submit")
            .header(ContentType::JSON)
            .body(json!({ "code": "echo 12" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let submission: SubmissionResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(submission.passed);
        assert!(submission.completion.is_none());

        let response = client
            .post("/api/challenges/42/submit")
            .header(ContentType::JSON)
            .body(json!({ "code": "echo 12" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_finishing_all_tutorials_makes_explorer_eligible() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;
        let cookies = login_standard(&client, "learner_user").await;
        let total = Catalog::embedded().expect("catalog").tutorials.len();

        let mut last = None;
        for id in 0..total {
            let response = client
                .post(format!("/api/tutorials/{}/complete", id))
                .cookies(cookies.clone())
                .dispatch()
                .await;
            last = Some(
                serde_json::from_str::<CompletionResponse>(
                    &response.into_string().await.unwrap(),
                )
                .unwrap(),
            );
        }

        let last = last.expect("At least one tutorial");
        assert_eq!(last.newly_eligible, vec![CertificateKind::PythonExplorer]);
        assert_eq!(last.progress.points, TUTORIAL_POINTS * total as i64);

        let response = client.get("/api/progress").cookies(cookies).dispatch().await;
        let progress: ProgressResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(
            progress.eligible_certificates,
            vec![CertificateKind::PythonExplorer]
        );
    }
}

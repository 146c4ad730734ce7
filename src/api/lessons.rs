use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use crate::auth::{Permission, User};
use crate::content::{Catalog, Difficulty, Navigation, check_output};
use crate::db::{CompletionKind, add_badge, award_completion, get_progress, log_event_quietly};
use crate::executor::{CodeRunner, ExecutionResult};
use crate::models::Progress;
use crate::rewards::{CHALLENGE_POINTS, CertificateKind, TUTORIAL_POINTS, draw_badge};
use crate::validation::{AppErrorExt, JsonValidateExt, PermissionCheckExt, ValidationResponse};

async fn progress_for(db: &Pool<Sqlite>, user: Option<&User>) -> Result<Option<Progress>, Status> {
    match user {
        Some(user) => Ok(Some(get_progress(db, user.id).await?)),
        None => Ok(None),
    }
}

#[derive(Serialize, Deserialize)]
pub struct TutorialSummary {
    pub id: usize,
    pub title: String,
    pub completed: Option<bool>,
}

#[derive(Serialize, Deserialize)]
pub struct TutorialView {
    pub id: usize,
    pub title: String,
    pub content: String,
    pub example_code: Option<String>,
    pub navigation: Navigation,
    pub completed: Option<bool>,
}

#[get("/tutorials")]
pub async fn api_list_tutorials(
    user: Option<User>,
    catalog: &State<Catalog>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TutorialSummary>>, Status> {
    let progress = progress_for(db, user.as_ref()).await?;

    Ok(Json(
        catalog
            .tutorials
            .iter()
            .enumerate()
            .map(|(id, tutorial)| TutorialSummary {
                id,
                title: tutorial.title.clone(),
                completed: progress.as_ref().map(|p| p.completed_tutorials.contains(&id)),
            })
            .collect(),
    ))
}

#[get("/tutorials/<id>")]
pub async fn api_get_tutorial(
    id: usize,
    user: Option<User>,
    catalog: &State<Catalog>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TutorialView>, Status> {
    let tutorial = catalog.tutorial(id)?;
    let progress = progress_for(db, user.as_ref()).await?;

    Ok(Json(TutorialView {
        id,
        title: tutorial.title.clone(),
        content: tutorial.content.clone(),
        example_code: tutorial.example_code.clone(),
        navigation: Navigation::around(id, catalog.tutorials.len()),
        completed: progress.map(|p| p.completed_tutorials.contains(&id)),
    }))
}

/// What a completion earned. `awarded` is false when the item had already
/// been completed, in which case nothing else changes.
#[derive(Serialize, Deserialize)]
pub struct CompletionResponse {
    pub awarded: bool,
    pub points_awarded: i64,
    pub new_badge: Option<String>,
    pub newly_eligible: Vec<CertificateKind>,
    pub progress: Progress,
}

/// Awards a completion, draws a badge on first completion and logs it.
async fn complete_item(
    db: &Pool<Sqlite>,
    catalog: &Catalog,
    user: &User,
    kind: CompletionKind,
    item_id: usize,
    title: &str,
) -> Result<CompletionResponse, Status> {
    let points = match kind {
        CompletionKind::Tutorial => TUTORIAL_POINTS,
        CompletionKind::Challenge => CHALLENGE_POINTS,
    };

    let before = get_progress(db, user.id).await?;
    let awarded = award_completion(db, user.id, kind, item_id, points).await?;

    let mut new_badge = None;
    if awarded {
        let badge = draw_badge();
        if add_badge(db, user.id, badge).await? {
            new_badge = Some(badge.to_string());
        }
        log_event_quietly(
            db,
            user.id,
            kind.event_type(),
            &format!("Completed '{}' (+{} points)", title, points),
        )
        .await;
        info!(user_id = user.id, item_id, event = kind.event_type(), "Completion recorded");
    }

    let progress = get_progress(db, user.id).await?;
    let newly_eligible = CertificateKind::ALL
        .into_iter()
        .filter(|certificate| {
            !certificate.missing_requirements(&before, catalog).is_empty()
                && certificate.missing_requirements(&progress, catalog).is_empty()
        })
        .collect();

    Ok(CompletionResponse {
        awarded,
        points_awarded: if awarded { points } else { 0 },
        new_badge,
        newly_eligible,
        progress,
    })
}

#[post("/tutorials/<id>/complete")]
pub async fn api_complete_tutorial(
    id: usize,
    user: User,
    catalog: &State<Catalog>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CompletionResponse>, Status> {
    user.require_permission(Permission::TrackOwnProgress)?;
    let tutorial = catalog.tutorial(id)?;

    let response = complete_item(
        db,
        catalog,
        &user,
        CompletionKind::Tutorial,
        id,
        &tutorial.title,
    )
    .await?;

    Ok(Json(response))
}

#[derive(Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub id: usize,
    pub title: String,
    pub difficulty: Difficulty,
    pub completed: Option<bool>,
}

#[derive(Serialize, Deserialize)]
pub struct ChallengeView {
    pub id: usize,
    pub title: String,
    pub description: String,
    pub starter_code: String,
    pub hint: Option<String>,
    pub difficulty: Difficulty,
    pub navigation: Navigation,
    pub completed: Option<bool>,
}

#[get("/challenges")]
pub async fn api_list_challenges(
    user: Option<User>,
    catalog: &State<Catalog>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ChallengeSummary>>, Status> {
    let progress = progress_for(db, user.as_ref()).await?;

    Ok(Json(
        catalog
            .challenges
            .iter()
            .enumerate()
            .map(|(id, challenge)| ChallengeSummary {
                id,
                title: challenge.title.clone(),
                difficulty: challenge.difficulty,
                completed: progress
                    .as_ref()
                    .map(|p| p.completed_challenges.contains(&id)),
            })
            .collect(),
    ))
}

#[get("/challenges/<id>")]
pub async fn api_get_challenge(
    id: usize,
    user: Option<User>,
    catalog: &State<Catalog>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ChallengeView>, Status> {
    let challenge = catalog.challenge(id)?;
    let progress = progress_for(db, user.as_ref()).await?;

    Ok(Json(ChallengeView {
        id,
        title: challenge.title.clone(),
        description: challenge.description.clone(),
        starter_code: challenge.starter_code.clone(),
        hint: challenge.hint.clone(),
        difficulty: challenge.difficulty,
        navigation: Navigation::around(id, catalog.challenges.len()),
        completed: progress.map(|p| p.completed_challenges.contains(&id)),
    }))
}

#[derive(Deserialize, Validate)]
pub struct CodeRequest {
    #[validate(length(min = 1, message = "Write some code first!"))]
    pub code: String,
}

#[derive(Serialize, Deserialize)]
pub struct RunResponse {
    pub result: ExecutionResult,
    pub output: String,
    pub error: Option<String>,
}

impl From<ExecutionResult> for RunResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            output: result.stdout().to_string(),
            error: result.error(),
            result,
        }
    }
}

/// Free-form playground run; nothing is recorded.
#[post("/run", data = "<request>")]
pub async fn api_run_code(
    request: Json<CodeRequest>,
    runner: &State<CodeRunner>,
) -> Result<Json<RunResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;
    let result = runner.run(&validated.code).await.validate_custom()?;
    Ok(Json(RunResponse::from(result)))
}

#[derive(Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub passed: bool,
    pub run: RunResponse,
    pub expected_output: Option<String>,
    pub hint: Option<String>,
    /// Present only for a signed-in learner whose submission passed.
    pub completion: Option<CompletionResponse>,
}

#[post("/challenges/<id>/submit", data = "<request>")]
pub async fn api_submit_challenge(
    id: usize,
    request: Json<CodeRequest>,
    user: Option<User>,
    catalog: &State<Catalog>,
    runner: &State<CodeRunner>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SubmissionResponse>, Custom<Json<ValidationResponse>>> {
    let challenge = catalog.challenge(id).validate_custom()?;
    let validated = request.validate_custom()?;

    let result = runner.run(&validated.code).await.validate_custom()?;
    let passed = result.succeeded() && check_output(&challenge.expected_output, result.stdout());

    let completion = match (&user, passed) {
        (Some(user), true) => Some(
            complete_item(
                db,
                catalog,
                user,
                CompletionKind::Challenge,
                id,
                &challenge.title,
            )
            .await
            .validate_custom()?,
        ),
        _ => None,
    };

    Ok(Json(SubmissionResponse {
        passed,
        run: RunResponse::from(result),
        // Shown to help the learner compare once they have tried.
        expected_output: (!passed).then(|| challenge.expected_output.clone()),
        hint: (!passed).then(|| challenge.hint.clone()).flatten(),
        completion,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct ProgressResponse {
    pub progress: Progress,
    pub tutorials_total: usize,
    pub challenges_total: usize,
    pub eligible_certificates: Vec<CertificateKind>,
}

#[get("/progress")]
pub async fn api_get_progress(
    user: User,
    catalog: &State<Catalog>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProgressResponse>, Status> {
    user.require_permission(Permission::TrackOwnProgress)?;
    let progress = get_progress(db, user.id).await?;

    let eligible_certificates = CertificateKind::ALL
        .into_iter()
        .filter(|kind| kind.missing_requirements(&progress, catalog).is_empty())
        .collect();

    Ok(Json(ProgressResponse {
        progress,
        tutorials_total: catalog.tutorials.len(),
        challenges_total: catalog.challenges.len(),
        eligible_certificates,
    }))
}

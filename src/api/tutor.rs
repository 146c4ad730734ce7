use chrono::Utc;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::tutor::{AnswerSource, ChatContexts, ChatTurn, Tutor};
use crate::validation::{JsonValidateExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 2000, message = "Ask a question of up to 2000 characters"))]
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub source: AnswerSource,
}

/// Guests get an answer too; only signed-in learners keep a history.
#[post("/tutor/ask", data = "<request>")]
pub async fn api_ask_tutor(
    request: Json<AskRequest>,
    user: Option<User>,
    tutor: &State<Tutor>,
    contexts: &State<ChatContexts>,
) -> Result<Json<AskResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;
    let question = validated.message.trim().to_string();

    let reply = tutor.ask(&question).await;

    if let Some(user) = user.filter(|u| u.has_permission(Permission::KeepChatHistory)) {
        contexts.record(
            user.id,
            ChatTurn {
                question,
                answer: reply.answer.clone(),
                source: reply.source,
                asked_at: Utc::now(),
            },
        );
    }

    Ok(Json(AskResponse {
        answer: reply.answer,
        source: reply.source,
    }))
}

#[get("/tutor/history")]
pub async fn api_get_tutor_history(
    user: User,
    contexts: &State<ChatContexts>,
) -> Result<Json<Vec<ChatTurn>>, Status> {
    user.require_permission(Permission::KeepChatHistory)?;
    Ok(Json(contexts.history(user.id)))
}

#[delete("/tutor/history")]
pub async fn api_clear_tutor_history(
    user: User,
    contexts: &State<ChatContexts>,
) -> Result<Status, Status> {
    user.require_permission(Permission::KeepChatHistory)?;
    contexts.clear(user.id);
    Ok(Status::NoContent)
}

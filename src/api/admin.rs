use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::{ProfileUpdateRequest, UserData};
use crate::auth::{Permission, User};
use crate::db::{
    get_all_users, get_progress, get_progress_summaries, get_system_stats, get_user,
    get_user_events, list_certificates, log_event_quietly, set_admin_status,
    update_user_password, update_user_profile,
};
use crate::models::{Certificate, Event, Progress, ProgressSummary, SystemStats};
use crate::validation::{AppErrorExt, JsonValidateExt, PermissionCheckExt, ValidationResponse};

#[get("/admin/users")]
pub async fn api_admin_list_users(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserData>>, Status> {
    user.require_permission(Permission::ViewAllUsers)?;

    let users = get_all_users(db).await?;
    Ok(Json(users.into_iter().map(UserData::from).collect()))
}

#[derive(Serialize, Deserialize)]
pub struct UserDetail {
    pub user: UserData,
    pub progress: Progress,
    pub certificates: Vec<Certificate>,
    pub recent_events: Vec<Event>,
}

#[get("/admin/users/<id>")]
pub async fn api_admin_get_user(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserDetail>, Status> {
    user.require_permission(Permission::ViewAllUsers)?;

    let target = get_user(db, id).await?;
    Ok(Json(UserDetail {
        progress: get_progress(db, id).await?,
        certificates: list_certificates(db, id).await?,
        recent_events: get_user_events(db, id, 10).await?,
        user: UserData::from(target),
    }))
}

#[derive(Deserialize, Validate, Default)]
pub struct AdminUserUpdateRequest {
    #[serde(default)]
    #[validate(nested)]
    pub profile: Option<ProfileUpdateRequest>,
    pub is_admin: Option<bool>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

#[put("/admin/users/<id>", data = "<update>")]
pub async fn api_admin_update_user(
    id: i64,
    update: Json<AdminUserUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::EditUsers)
        .validate_custom()?;
    if update.is_admin.is_some() {
        user.require_permission(Permission::GrantAdmin)
            .validate_custom()?;
    }
    if update.password.is_some() {
        user.require_permission(Permission::ResetPasswords)
            .validate_custom()?;
    }

    let validated = update.validate_custom()?;
    let target = get_user(db, id).await.validate_custom()?;

    if validated.is_admin == Some(false) && target.id == user.id {
        return Err(Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::with_error(
                "is_admin",
                "You cannot remove your own admin access",
            )),
        ));
    }

    let mut changes = Vec::new();

    if let Some(profile) = validated.profile {
        let updated = profile.apply_to(target.profile.clone());
        update_user_profile(db, id, &updated)
            .await
            .validate_custom()?;
        changes.push("profile");
    }

    if let Some(is_admin) = validated.is_admin {
        set_admin_status(db, id, is_admin).await.validate_custom()?;
        changes.push(if is_admin { "granted admin" } else { "revoked admin" });
    }

    if let Some(password) = &validated.password {
        update_user_password(db, id, password)
            .await
            .validate_custom()?;
        changes.push("password reset");
    }

    if !changes.is_empty() {
        log_event_quietly(
            db,
            id,
            "admin_update",
            &format!("{} by {}", changes.join(", "), user.username),
        )
        .await;
    }

    let updated = get_user(db, id).await.validate_custom()?;
    Ok(Json(UserData::from(updated)))
}

#[get("/admin/progress")]
pub async fn api_admin_progress(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ProgressSummary>>, Status> {
    user.require_permission(Permission::ViewStatistics)?;
    Ok(Json(get_progress_summaries(db).await?))
}

#[get("/admin/stats")]
pub async fn api_admin_stats(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SystemStats>, Status> {
    user.require_permission(Permission::ViewStatistics)?;
    Ok(Json(get_system_stats(db).await?))
}

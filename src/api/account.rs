use chrono::Utc;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::UserData;
use crate::auth::{Permission, SESSION_COOKIE, User, UserSession};
use crate::config::AppConfig;
use crate::db::{
    authenticate_user, create_user, create_user_session, find_user_by_username,
    get_session_by_token, get_user, invalidate_session, log_event_quietly, record_login,
    update_user_password, update_user_profile,
};
use crate::models::Profile;
use crate::validation::{
    AppErrorExt, JsonValidateExt, PermissionCheckExt, ValidationResponse, validate_username,
};

#[derive(Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3 to 32 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: ProfileUpdateRequest,
}

#[post("/signup", data = "<signup>")]
pub async fn api_signup(
    signup: Json<SignupRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<(Status, Json<UserData>), Custom<Json<ValidationResponse>>> {
    let validated = signup.validate_custom()?;

    if find_user_by_username(db, &validated.username)
        .await
        .validate_custom()?
        .is_some()
    {
        return Err(Custom(
            Status::Conflict,
            Json(ValidationResponse::with_error(
                "username",
                "That username is already taken",
            )),
        ));
    }

    let user_id = create_user(
        db,
        &validated.username,
        &validated.password,
        &validated.profile.apply_to(Profile::default()),
        false,
    )
    .await
    .validate_custom()?;

    log_event_quietly(db, user_id, "signup", "Account created").await;

    let user = get_user(db, user_id).await.validate_custom()?;
    Ok((Status::Created, Json(UserData::from(user))))
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = login.validate_custom()?;

    let Some(user) = authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    else {
        return Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
        }));
    };

    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(config.session_hours);
    create_user_session(db, user.id, &token, expires_at.naive_utc())
        .await
        .validate_custom()?;

    let max_age = rocket::time::Duration::hours(config.session_hours);
    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(max_age),
    );

    record_login(db, user.id).await.validate_custom()?;
    log_event_quietly(db, user.id, "login", "Logged in").await;

    // Re-read so the response carries the fresh last_login.
    let user = get_user(db, user.id).await.validate_custom()?;

    Ok(Json(LoginResponse {
        success: true,
        user: Some(UserData::from(user)),
        error: None,
    }))
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Ok(session) = get_session_by_token(db, &token).await {
            log_event_quietly(db, session.user_id, "logout", "Logged out").await;
        }
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Invalidating session on logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Status::Ok
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[derive(Deserialize, Validate, Default)]
pub struct ProfileUpdateRequest {
    #[validate(length(max = 100, message = "Name is too long"))]
    pub full_name: Option<String>,
    #[validate(length(max = 100, message = "Name is too long"))]
    pub parent_name: Option<String>,
    #[validate(length(max = 20, message = "Date of birth is too long"))]
    pub dob: Option<String>,
    #[validate(length(max = 20, message = "Class is too long"))]
    pub class: Option<String>,
    #[validate(length(max = 20, message = "Section is too long"))]
    pub section: Option<String>,
    #[validate(length(max = 100, message = "School name is too long"))]
    pub school: Option<String>,
}

impl ProfileUpdateRequest {
    /// Fields left out of the request keep their current value; an empty
    /// string clears the field.
    pub fn apply_to(self, current: Profile) -> Profile {
        fn merge(update: Option<String>, current: Option<String>) -> Option<String> {
            match update {
                Some(value) if value.trim().is_empty() => None,
                Some(value) => Some(value.trim().to_string()),
                None => current,
            }
        }

        Profile {
            full_name: merge(self.full_name, current.full_name),
            parent_name: merge(self.parent_name, current.parent_name),
            dob: merge(self.dob, current.dob),
            class: merge(self.class, current.class),
            section: merge(self.section, current.section),
            school: merge(self.school, current.school),
        }
    }
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;
    let validated = profile.validate_custom()?;

    let updated = validated.apply_to(user.profile.clone());
    update_user_profile(db, user.id, &updated)
        .await
        .validate_custom()?;
    log_event_quietly(db, user.id, "profile_updated", "Profile updated").await;

    let user = get_user(db, user.id).await.validate_custom()?;
    Ok(Json(UserData::from(user)))
}

#[derive(Deserialize, Validate)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[post("/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = password.validate_custom()?;

    let is_valid = authenticate_user(db, &user.username, &validated.current_password)
        .await
        .validate_custom()?;

    match is_valid {
        Some(_) => {
            update_user_password(db, user.id, &validated.new_password)
                .await
                .validate_custom()?;
            log_event_quietly(db, user.id, "password_changed", "Password changed").await;

            Ok(Status::Ok)
        }
        _ => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "current_password",
                "Current password is incorrect",
            )),
        )),
    }
}

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, User};
use crate::error::AppError;
use crate::models::Profile;

const USER_COLUMNS: &str = "id, username, full_name, parent_name, dob, class, section, school, \
                            is_admin, created_at, last_login";

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip(pool))]
pub async fn get_all_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users ORDER BY username",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

/// Creates a user with a bcrypt-hashed password and an empty progress row.
#[instrument(skip(pool, password, profile))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    profile: &Profile,
    is_admin: bool,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_user_by_username(pool, username).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "INSERT INTO users
         (username, password, full_name, parent_name, dob, class, section, school, is_admin)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(hashed_password)
    .bind(&profile.full_name)
    .bind(&profile.parent_name)
    .bind(&profile.dob)
    .bind(&profile.class)
    .bind(&profile.section)
    .bind(&profile.school)
    .bind(is_admin)
    .execute(&mut *tx)
    .await
    .map_err(|e| match e {
        // A concurrent signup may take the name after the check above.
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("Username '{}' already exists", username))
        }
        other => AppError::from(other),
    })?;

    let user_id = res.last_insert_rowid();

    sqlx::query("INSERT INTO user_progress (user_id) VALUES (?)")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(user_id)
}

/// Returns the user when the password matches, `None` otherwise.
#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let stored: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    let Some((id, hash)) = stored else {
        return Ok(None);
    };

    // A malformed stored hash is a failed login, not a server error.
    match bcrypt::verify(password, &hash) {
        Ok(true) => Ok(Some(get_user(pool, id).await?)),
        _ => Ok(None),
    }
}

#[instrument(skip(pool))]
pub async fn record_login(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET last_login = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, profile))]
pub async fn update_user_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    profile: &Profile,
) -> Result<(), AppError> {
    info!("Updating user profile");
    let res = sqlx::query(
        "UPDATE users
         SET full_name = ?, parent_name = ?, dob = ?, class = ?, section = ?, school = ?
         WHERE id = ?",
    )
    .bind(&profile.full_name)
    .bind(&profile.parent_name)
    .bind(&profile.dob)
    .bind(&profile.class)
    .bind(&profile.section)
    .bind(&profile.school)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_admin_status(
    pool: &Pool<Sqlite>,
    user_id: i64,
    is_admin: bool,
) -> Result<(), AppError> {
    info!("Changing admin status");
    sqlx::query("UPDATE users SET is_admin = ? WHERE id = ?")
        .bind(is_admin)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, new_password))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Creates the configured admin account at startup unless that username is
/// already taken.
#[instrument(skip(pool, password))]
pub async fn ensure_bootstrap_admin(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    if find_user_by_username(pool, username).await?.is_some() {
        return Ok(false);
    }

    create_user(pool, username, password, &Profile::default(), true).await?;
    info!("Created bootstrap admin account");
    Ok(true)
}

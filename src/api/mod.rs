pub mod account;
pub mod admin;
pub mod certificates;
pub mod lessons;
pub mod tutor;

pub use account::*;
pub use admin::*;
pub use certificates::*;
pub use lessons::*;
pub use tutor::*;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::models::Profile;

fn as_utc(dt: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub is_admin: bool,
    pub profile: Profile,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name().to_string(),
            role: user.role.to_string(),
            is_admin: user.is_admin(),
            created_at: as_utc(user.created_at),
            last_login: as_utc(user.last_login),
            username: user.username,
            profile: user.profile,
        }
    }
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

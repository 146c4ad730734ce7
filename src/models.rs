use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

fn to_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}

/// Learner-editable profile fields. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub full_name: Option<String>,
    pub parent_name: Option<String>,
    pub dob: Option<String>,
    pub class: Option<String>,
    pub section: Option<String>,
    pub school: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub user_id: i64,
    pub points: i64,
    pub completed_tutorials: Vec<usize>,
    pub completed_challenges: Vec<usize>,
    pub emoji_collection: Vec<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProgress {
    pub user_id: Option<i64>,
    pub points: Option<i64>,
    pub completed_tutorials: Option<String>,
    pub completed_challenges: Option<String>,
    pub emoji_collection: Option<String>,
}

impl TryFrom<DbProgress> for Progress {
    type Error = serde_json::Error;

    fn try_from(db: DbProgress) -> Result<Self, Self::Error> {
        fn parse<T: serde::de::DeserializeOwned>(
            raw: Option<String>,
        ) -> Result<Vec<T>, serde_json::Error> {
            match raw {
                Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw),
                _ => Ok(Vec::new()),
            }
        }

        Ok(Self {
            user_id: db.user_id.unwrap_or_default(),
            points: db.points.unwrap_or_default(),
            completed_tutorials: parse(db.completed_tutorials)?,
            completed_challenges: parse(db.completed_challenges)?,
            emoji_collection: parse(db.emoji_collection)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub certificate_code: String,
    pub user_id: i64,
    pub certificate_type: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCertificate {
    pub id: Option<i64>,
    pub certificate_code: Option<String>,
    pub user_id: Option<i64>,
    pub certificate_type: Option<String>,
    pub issued_at: Option<NaiveDateTime>,
}

impl From<DbCertificate> for Certificate {
    fn from(db: DbCertificate) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            certificate_code: db.certificate_code.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            certificate_type: db.certificate_type.unwrap_or_default(),
            issued_at: to_utc(db.issued_at),
        }
    }
}

/// What the public verification lookup reveals about a certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateVerification {
    pub certificate_code: String,
    pub certificate_type: String,
    pub holder: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCertificateVerification {
    pub certificate_code: Option<String>,
    pub certificate_type: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub issued_at: Option<NaiveDateTime>,
}

impl From<DbCertificateVerification> for CertificateVerification {
    fn from(db: DbCertificateVerification) -> Self {
        let holder = db
            .full_name
            .filter(|name| !name.trim().is_empty())
            .or(db.username)
            .unwrap_or_default();

        Self {
            certificate_code: db.certificate_code.unwrap_or_default(),
            certificate_type: db.certificate_type.unwrap_or_default(),
            holder,
            issued_at: to_utc(db.issued_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub event_type: String,
    pub event_details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbEvent {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub event_type: Option<String>,
    pub event_details: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
}

impl From<DbEvent> for Event {
    fn from(db: DbEvent) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            username: db.username,
            event_type: db.event_type.unwrap_or_default(),
            event_details: db.event_details.unwrap_or_default(),
            timestamp: to_utc(db.timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub user_id: i64,
    pub username: String,
    pub points: i64,
    pub tutorials_completed: usize,
    pub challenges_completed: usize,
    pub emojis_collected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_users: i64,
    pub active_users_7d: i64,
    pub total_certificates: i64,
    pub total_points: i64,
    pub total_events: i64,
    pub recent_events: Vec<Event>,
}

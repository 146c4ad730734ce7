use chrono::{DateTime, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;

use crate::auth::{Permission, User};
use crate::content::Catalog;
use crate::db::{
    get_progress, issue_certificate, list_certificates, log_event_quietly, verify_certificate,
};
use crate::models::{Certificate, CertificateVerification};
use crate::rewards::CertificateKind;
use crate::validation::{AppErrorExt, PermissionCheckExt, ValidationResponse};

#[derive(Serialize, Deserialize)]
pub struct CertificateData {
    pub certificate_code: String,
    pub certificate_type: String,
    pub title: String,
    pub description: String,
    pub holder: String,
    pub issued_at: DateTime<Utc>,
}

impl CertificateData {
    fn new(certificate: Certificate, holder: &str) -> Self {
        let (title, description) = match certificate.certificate_type.parse::<CertificateKind>() {
            Ok(kind) => (kind.title().to_string(), kind.description().to_string()),
            Err(_) => (certificate.certificate_type.clone(), String::new()),
        };

        Self {
            certificate_code: certificate.certificate_code,
            certificate_type: certificate.certificate_type,
            title,
            description,
            holder: holder.to_string(),
            issued_at: certificate.issued_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct CertificateStatus {
    pub certificate_type: CertificateKind,
    pub title: String,
    pub missing: Vec<String>,
    pub issued: Option<CertificateData>,
}

/// Every certificate kind with what is still missing and, if earned, the
/// issued record.
#[get("/certificates")]
pub async fn api_list_certificates(
    user: User,
    catalog: &State<Catalog>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CertificateStatus>>, Status> {
    user.require_permission(Permission::RequestCertificates)?;

    let progress = get_progress(db, user.id).await?;
    let mut issued: HashMap<String, Certificate> = list_certificates(db, user.id)
        .await?
        .into_iter()
        .map(|c| (c.certificate_type.clone(), c))
        .collect();

    Ok(Json(
        CertificateKind::ALL
            .into_iter()
            .map(|kind| CertificateStatus {
                certificate_type: kind,
                title: kind.title().to_string(),
                missing: kind.missing_requirements(&progress, catalog),
                issued: issued
                    .remove(kind.as_str())
                    .map(|c| CertificateData::new(c, user.display_name())),
            })
            .collect(),
    ))
}

#[derive(Serialize, Deserialize)]
pub struct IssueResponse {
    pub newly_issued: bool,
    pub certificate: CertificateData,
}

#[post("/certificates/<certificate_type>")]
pub async fn api_issue_certificate(
    certificate_type: &str,
    user: User,
    catalog: &State<Catalog>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<IssueResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::RequestCertificates)
        .validate_custom()?;

    let kind: CertificateKind = certificate_type.parse().map_err(|message: String| {
        Custom(
            Status::NotFound,
            Json(ValidationResponse::with_error("certificate_type", &message)),
        )
    })?;

    let progress = get_progress(db, user.id).await.validate_custom()?;
    let missing = kind.missing_requirements(&progress, catalog);
    if !missing.is_empty() {
        let mut errors = HashMap::new();
        errors.insert("requirements".to_string(), missing);
        return Err(Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::new(errors)),
        ));
    }

    let (certificate, newly_issued) = issue_certificate(db, user.id, kind.as_str())
        .await
        .validate_custom()?;

    if newly_issued {
        log_event_quietly(
            db,
            user.id,
            "certificate_issued",
            &format!("{} ({})", kind.title(), certificate.certificate_code),
        )
        .await;
    }

    Ok(Json(IssueResponse {
        newly_issued,
        certificate: CertificateData::new(certificate, user.display_name()),
    }))
}

#[get("/certificates/verify/<code>")]
pub async fn api_verify_certificate(
    code: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CertificateVerification>, Status> {
    Ok(Json(verify_certificate(db, code).await?))
}

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Certificate, CertificateVerification, DbCertificate, DbCertificateVerification};

/// Short, human-typeable verification code, e.g. `PYK-3F9A1C2D7E4B`.
pub fn generate_certificate_code() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("PYK-{}", &raw[..12])
}

async fn find_certificate(
    pool: &Pool<Sqlite>,
    user_id: i64,
    certificate_type: &str,
) -> Result<Option<Certificate>, AppError> {
    let row = sqlx::query_as::<_, DbCertificate>(
        "SELECT id, certificate_code, user_id, certificate_type, issued_at
         FROM certificates WHERE user_id = ? AND certificate_type = ?",
    )
    .bind(user_id)
    .bind(certificate_type)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Certificate::from))
}

/// Issues a certificate, or returns the one already issued for this user and
/// type. The boolean is true when this call created the record.
#[instrument(skip(pool))]
pub async fn issue_certificate(
    pool: &Pool<Sqlite>,
    user_id: i64,
    certificate_type: &str,
) -> Result<(Certificate, bool), AppError> {
    if let Some(existing) = find_certificate(pool, user_id, certificate_type).await? {
        return Ok((existing, false));
    }

    let res = sqlx::query(
        "INSERT OR IGNORE INTO certificates (certificate_code, user_id, certificate_type)
         VALUES (?, ?, ?)",
    )
    .bind(generate_certificate_code())
    .bind(user_id)
    .bind(certificate_type)
    .execute(pool)
    .await?;

    let created = res.rows_affected() == 1;
    if created {
        info!("Certificate issued");
    }

    // A concurrent request may have won the insert; either way the stored
    // row is the answer.
    match find_certificate(pool, user_id, certificate_type).await? {
        Some(certificate) => Ok((certificate, created)),
        None => Err(AppError::Internal(
            "Certificate missing right after insert".to_string(),
        )),
    }
}

#[instrument(skip(pool))]
pub async fn list_certificates(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<Certificate>, AppError> {
    let rows = sqlx::query_as::<_, DbCertificate>(
        "SELECT id, certificate_code, user_id, certificate_type, issued_at
         FROM certificates WHERE user_id = ?
         ORDER BY issued_at, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Certificate::from).collect())
}

#[instrument(skip(pool))]
pub async fn verify_certificate(
    pool: &Pool<Sqlite>,
    certificate_code: &str,
) -> Result<CertificateVerification, AppError> {
    let row = sqlx::query_as::<_, DbCertificateVerification>(
        "SELECT c.certificate_code, c.certificate_type, u.username, u.full_name, c.issued_at
         FROM certificates c
         JOIN users u ON c.user_id = u.id
         WHERE c.certificate_code = ?",
    )
    .bind(certificate_code.trim().to_uppercase())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(CertificateVerification::from(row)),
        None => Err(AppError::NotFound(format!(
            "No certificate with code {}",
            certificate_code
        ))),
    }
}

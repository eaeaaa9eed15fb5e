use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::NaiveDate;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{app_error::AppError, app_state::AppState},
    models::CertificateEntity,
    schema::certificates,
};

/// Defines the public verification route with OpenAPI specs.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/verify",
        OpenApiRouter::new().routes(utoipa_axum::routes!(verify_certificate)),
    )
}

/// Public certificate view. Deliberately excludes contact details and
/// symptoms; the verification code is the only lookup key.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateVerificationView {
    pub certificate_type: String,
    pub patient_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_recipient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_recipient_relationship: Option<String>,
    pub unfit_from: NaiveDate,
    pub unfit_to: NaiveDate,
    pub days_unfit: i32,
    pub pharmacist_name: String,
    pub pharmacist_registration: String,
    pub issued_on: NaiveDate,
}

impl From<CertificateEntity> for CertificateVerificationView {
    fn from(cert: CertificateEntity) -> Self {
        let is_carer = cert.leave_type == "carer";
        Self {
            certificate_type: cert.leave_type,
            patient_name: format!("{} {}", cert.patient_first_name, cert.patient_last_name),
            care_recipient_name: if is_carer { cert.care_recipient_name } else { None },
            care_recipient_relationship: if is_carer {
                cert.care_recipient_relationship
            } else {
                None
            },
            unfit_from: cert.unfit_from,
            unfit_to: cert.unfit_to,
            days_unfit: cert.days_unfit,
            pharmacist_name: cert.pharmacist_name,
            pharmacist_registration: cert.pharmacist_registration,
            issued_on: cert.issued_at.date_naive(),
        }
    }
}

/// Look up a certificate by its verification code (case-insensitive).
#[utoipa::path(
    get,
    path = "/{code}",
    tags = ["Verification"],
    params(
        ("code" = String, Path, description = "8-character verification code")
    ),
    responses(
        (status = 200, description = "Certificate is genuine", body = CertificateVerificationView),
        (status = 404, description = "No certificate with this code")
    )
)]
async fn verify_certificate(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let normalized = code.trim().to_uppercase();

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let certificate: CertificateEntity = certificates::table
        .filter(certificates::verification_code.eq(&normalized))
        .first(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(Json(CertificateVerificationView::from(certificate)))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn certificate(leave_type: &str) -> CertificateEntity {
        CertificateEntity {
            id: Uuid::new_v4(),
            consultation_id: Uuid::new_v4(),
            verification_code: "ABCD2345".into(),
            leave_type: leave_type.into(),
            patient_first_name: "Maya".into(),
            patient_last_name: "Osei".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1991, 4, 17).unwrap(),
            care_recipient_name: Some("Kofi Osei".into()),
            care_recipient_relationship: Some("son".into()),
            unfit_from: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            unfit_to: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            days_unfit: 1,
            pharmacist_name: "Sarah Chen".into(),
            pharmacist_registration: "PHA0000000000".into(),
            issued_at: Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap(),
            emailed_at: None,
            emailed_to: Some("maya@example.com".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn public_view_never_contains_contact_details() {
        let view = CertificateVerificationView::from(certificate("personal"));
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("maya@example.com"));
        assert!(!json.contains("emailedTo"));
        assert!(!json.contains("symptom"));
    }

    #[test]
    fn care_recipient_is_shown_only_for_carer_certificates() {
        let view = CertificateVerificationView::from(certificate("personal"));
        assert!(view.care_recipient_name.is_none());

        let view = CertificateVerificationView::from(certificate("carer"));
        assert_eq!(view.care_recipient_name.as_deref(), Some("Kofi Osei"));
        assert_eq!(view.care_recipient_relationship.as_deref(), Some("son"));
    }

    #[test]
    fn issue_date_is_day_truncated() {
        let view = CertificateVerificationView::from(certificate("personal"));
        assert_eq!(view.issued_on, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    }
}

use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use diesel::{
    BoolExpressionMethods, ExpressionMethods, OptionalExtension, PgTextExpressionMethods,
    QueryDsl, SelectableHelper, TextExpressionMethods,
    pg::Pg,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    audit,
    core::{app_error::AppError, app_state::AppState},
    models::{CertificateEntity, ConsultationEntity},
    notifications, pdf,
    schema::{certificates, consultations},
    workflow::{self, ConsultationStatus, IssuanceWindow, PaymentStatus, SideEffect},
};

const SEARCH_LIMIT: i64 = 50;
const CODE_INSERT_ATTEMPTS: usize = 5;
const OPERATOR_ACTOR: &str = "operator";

/// Defines operator-facing routes with OpenAPI specs.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/admin",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_consultations))
            .routes(utoipa_axum::routes!(search_consultations))
            .routes(utoipa_axum::routes!(get_consultation))
            .routes(utoipa_axum::routes!(start_call))
            .routes(utoipa_axum::routes!(issue_certificate))
            .routes(utoipa_axum::routes!(decline_consultation))
            .routes(utoipa_axum::routes!(resend_certificate_email))
            .routes(utoipa_axum::routes!(download_certificate)),
    )
}

#[derive(Deserialize, IntoParams)]
pub struct ListParams {
    /// "all" or one of pending|scheduled|in_progress|completed|declined.
    pub status: Option<String>,
}

/// List consultations for the operator dashboard, next callback first.
#[utoipa::path(
    get,
    path = "/consultations",
    tags = ["Admin"],
    params(ListParams),
    responses(
        (status = 200, description = "Consultations ordered by callback time", body = Vec<ConsultationEntity>)
    )
)]
async fn list_consultations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = consultations::table
        .select(ConsultationEntity::as_select())
        .into_boxed();
    match params.status.as_deref() {
        None | Some("all") => {}
        Some(status) => {
            let status = ConsultationStatus::parse(status).ok_or_else(|| {
                AppError::BadRequest(format!("'{status}' is not a valid status filter"))
            })?;
            query = query.filter(consultations::status.eq(status.as_str()));
        }
    }

    let results: Vec<ConsultationEntity> = query
        .order((
            consultations::preferred_callback_at.asc(),
            consultations::created_at.desc(),
        ))
        .get_results(conn)
        .await
        .context("Failed to list consultations")?;

    Ok(Json(results))
}

#[derive(Deserialize, IntoParams)]
pub struct SearchParams {
    /// Case-insensitive substring over name/email, raw substring over phone.
    pub q: Option<String>,
    /// Exact date-of-birth match (YYYY-MM-DD).
    pub dob: Option<NaiveDate>,
}

/// Search consultations by name/email/phone substring or exact date of birth.
/// Returns nothing when no filter is supplied; capped at 50 rows, newest first.
#[utoipa::path(
    get,
    path = "/search",
    tags = ["Admin"],
    params(SearchParams),
    responses(
        (status = 200, description = "Matching consultations", body = Vec<ConsultationEntity>)
    )
)]
async fn search_consultations(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let q = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    if q.is_none() && params.dob.is_none() {
        return Ok(Json(Vec::<ConsultationEntity>::new()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = consultations::table
        .select(ConsultationEntity::as_select())
        .into_boxed();
    if let Some(q) = q {
        let pattern = format!("%{q}%");
        query = query.filter(
            consultations::first_name
                .ilike(pattern.clone())
                .or(consultations::last_name.ilike(pattern.clone()))
                .or(consultations::email.ilike(pattern.clone()))
                .or(consultations::phone.like(pattern)),
        );
    }
    if let Some(dob) = params.dob {
        query = query.filter(consultations::date_of_birth.eq(dob));
    }

    let results: Vec<ConsultationEntity> = query
        .order(consultations::created_at.desc())
        .limit(SEARCH_LIMIT)
        .get_results(conn)
        .await
        .context("Failed to search consultations")?;

    Ok(Json(results))
}

#[derive(Serialize, ToSchema)]
pub struct ConsultationDetailRes {
    pub consultation: ConsultationEntity,
    pub certificate: Option<CertificateEntity>,
}

/// Fetch one consultation together with its certificate, if issued.
#[utoipa::path(
    get,
    path = "/consultation/{id}",
    tags = ["Admin"],
    params(
        ("id" = Uuid, Path, description = "Consultation ID")
    ),
    responses(
        (status = 200, description = "Consultation detail", body = ConsultationDetailRes)
    )
)]
async fn get_consultation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationEntity = consultations::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    let certificate: Option<CertificateEntity> = certificates::table
        .filter(certificates::consultation_id.eq(id))
        .first(conn)
        .await
        .optional()
        .map_err(AppError::from)?;

    Ok(Json(ConsultationDetailRes {
        consultation,
        certificate,
    }))
}

/// Begin the phone consultation. Requires a scheduled consultation; the
/// scheduled→in_progress flip is conditional so a duplicate click loses.
#[utoipa::path(
    post,
    path = "/consultation/{id}/start-call",
    tags = ["Admin"],
    params(
        ("id" = Uuid, Path, description = "Consultation ID")
    ),
    responses(
        (status = 200, description = "Call started", body = ConsultationEntity)
    )
)]
async fn start_call(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationEntity = consultations::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;
    workflow::ensure_status(&consultation, ConsultationStatus::Scheduled, "start the call")?;

    let updated: ConsultationEntity = diesel::update(
        consultations::table
            .find(id)
            .filter(consultations::status.eq(ConsultationStatus::Scheduled.as_str())),
    )
    .set((
        consultations::status.eq(ConsultationStatus::InProgress.as_str()),
        consultations::call_started_at.eq(Utc::now()),
        consultations::updated_at.eq(diesel::dsl::now),
    ))
    .returning(ConsultationEntity::as_returning())
    .get_result(conn)
    .await
    .map_err(|_| AppError::Conflict("Consultation is no longer scheduled".into()))?;

    audit::record(
        &state.db_pool,
        "call.started",
        "consultation",
        updated.id,
        OPERATOR_ACTOR,
        serde_json::json!({}),
    )
    .await;

    Ok(Json(updated))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueReq {
    #[serde(default)]
    pub notes: Option<String>,
    pub days_to_issue: i32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueRes {
    pub certificate_id: Uuid,
    pub verification_code: String,
    /// Best-effort side effects that failed; the certificate itself stands.
    pub degraded: Vec<SideEffect>,
}

/// Approve the consultation and issue a certificate.
///
/// The clinical record (certificate row + completed status) commits in one
/// transaction. Payment capture, PDF rendering and email delivery follow
/// best-effort; failures are logged and reported in `degraded` but never roll
/// back the issuance.
#[utoipa::path(
    post,
    path = "/consultation/{id}/issue",
    tags = ["Admin"],
    params(
        ("id" = Uuid, Path, description = "Consultation ID")
    ),
    request_body = IssueReq,
    responses(
        (status = 200, description = "Certificate issued", body = IssueRes)
    )
)]
async fn issue_certificate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<IssueReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationEntity = consultations::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;
    workflow::ensure_status(&consultation, ConsultationStatus::InProgress, "issue")?;

    let issued_at = Utc::now();
    let window = workflow::issuance_window(issued_at, body.days_to_issue);
    let pharmacist = state.config.pharmacist.clone();
    let notes = body.notes.clone();
    let snapshot_source = consultation.clone();

    let (certificate, _completed) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let certificate = insert_certificate_with_retry(
                    conn,
                    &snapshot_source,
                    window,
                    issued_at,
                    &pharmacist.name,
                    &pharmacist.registration,
                )
                .await?;

                let completed: ConsultationEntity = diesel::update(
                    consultations::table
                        .find(id)
                        .filter(consultations::status.eq(ConsultationStatus::InProgress.as_str())),
                )
                .set((
                    consultations::status.eq(ConsultationStatus::Completed.as_str()),
                    consultations::certificate_id.eq(certificate.id),
                    consultations::call_ended_at.eq(issued_at),
                    consultations::operator_notes.eq(notes),
                    consultations::updated_at.eq(diesel::dsl::now),
                ))
                .returning(ConsultationEntity::as_returning())
                .get_result(conn)
                .await
                .map_err(|err| match err {
                    DieselError::NotFound => {
                        AppError::Conflict("Consultation is no longer in progress".into())
                    }
                    other => other.into(),
                })?;

                Ok::<(CertificateEntity, ConsultationEntity), AppError>((certificate, completed))
            })
        })
        .await?;

    let mut degraded = Vec::new();

    // Settlement is best-effort: the clinical decision is not re-litigated
    // over a billing failure.
    match consultation.payment_intent_ref.as_deref() {
        Some(intent_ref) => match state.payments.capture(intent_ref).await {
            Ok(()) => {
                if let Err(err) = diesel::update(consultations::table.find(id))
                    .set((
                        consultations::payment_status.eq(PaymentStatus::Captured.as_str()),
                        consultations::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await
                {
                    tracing::warn!("Failed to record captured payment for {id}: {err}");
                }
            }
            Err(err) => {
                tracing::warn!("Payment capture failed for {id}: {err}");
                degraded.push(SideEffect::PaymentCapture);
            }
        },
        None => {
            tracing::warn!("No payment intent on consultation {id}, nothing to capture");
            degraded.push(SideEffect::PaymentCapture);
        }
    }

    let pdf_bytes = match pdf::render(&certificate, &state.config.pharmacist.contact_line) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::error!("PDF render failed for certificate {}: {err}", certificate.id);
            degraded.push(SideEffect::PdfRender);
            None
        }
    };

    match notifications::send_certificate_email(
        &state.mailer,
        &certificate,
        &consultation.email,
        pdf_bytes.as_deref(),
    )
    .await
    {
        Ok(()) => {
            if let Err(err) = diesel::update(certificates::table.find(certificate.id))
                .set((
                    certificates::emailed_at.eq(Utc::now()),
                    certificates::emailed_to.eq(&consultation.email),
                ))
                .execute(conn)
                .await
            {
                tracing::warn!("Failed to record email delivery for {}: {err}", certificate.id);
            }
        }
        Err(err) => {
            tracing::warn!("Certificate email failed for {}: {err}", certificate.id);
            degraded.push(SideEffect::EmailDelivery);
        }
    }

    audit::record(
        &state.db_pool,
        "certificate.issued",
        "certificate",
        certificate.id,
        OPERATOR_ACTOR,
        serde_json::json!({
            "consultation_id": id,
            "verification_code": &certificate.verification_code,
            "days_unfit": certificate.days_unfit,
            "degraded": &degraded,
        }),
    )
    .await;

    Ok(Json(IssueRes {
        certificate_id: certificate.id,
        verification_code: certificate.verification_code,
        degraded,
    }))
}

/// Inserts the certificate snapshot, retrying with a fresh verification code
/// on a code collision. The unique constraint is the source of truth.
async fn insert_certificate_with_retry<C>(
    conn: &mut C,
    consultation: &ConsultationEntity,
    window: IssuanceWindow,
    issued_at: chrono::DateTime<Utc>,
    pharmacist_name: &str,
    pharmacist_registration: &str,
) -> Result<CertificateEntity, AppError>
where
    C: AsyncConnection<Backend = Pg>,
{
    for _ in 0..CODE_INSERT_ATTEMPTS {
        let snapshot = workflow::snapshot_certificate(
            consultation,
            window,
            issued_at,
            pharmacist_name,
            pharmacist_registration,
        );

        match diesel::insert_into(certificates::table)
            .values(&snapshot)
            .returning(CertificateEntity::as_returning())
            .get_result(conn)
            .await
        {
            Ok(certificate) => return Ok(certificate),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                if info.constraint_name() == Some("certificates_verification_code_key") {
                    tracing::warn!(
                        "Verification code collision on consultation {}, retrying",
                        consultation.id
                    );
                    continue;
                }
                return Err(AppError::Conflict(
                    "A certificate has already been issued for this consultation".into(),
                ));
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::Other(anyhow::anyhow!(
        "Exhausted verification code attempts for consultation {}",
        consultation.id
    )))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeclineReq {
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeclineRes {
    pub consultation: ConsultationEntity,
    pub degraded: Vec<SideEffect>,
}

/// Decline the consultation. The payment hold is released (cancel, falling
/// back to refund); both payment failures are best-effort and reported in
/// `degraded`.
#[utoipa::path(
    post,
    path = "/consultation/{id}/decline",
    tags = ["Admin"],
    params(
        ("id" = Uuid, Path, description = "Consultation ID")
    ),
    request_body = DeclineReq,
    responses(
        (status = 200, description = "Consultation declined", body = DeclineRes)
    )
)]
async fn decline_consultation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<DeclineReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.reason.trim().is_empty() {
        return Err(AppError::BadRequest("A decline reason is required".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationEntity = consultations::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;
    workflow::ensure_status(&consultation, ConsultationStatus::InProgress, "decline")?;

    let updated: ConsultationEntity = diesel::update(
        consultations::table
            .find(id)
            .filter(consultations::status.eq(ConsultationStatus::InProgress.as_str())),
    )
    .set((
        consultations::status.eq(ConsultationStatus::Declined.as_str()),
        consultations::payment_status.eq(PaymentStatus::Refunded.as_str()),
        consultations::decline_reason.eq(body.reason.trim()),
        consultations::operator_notes.eq(body.notes.as_deref()),
        consultations::call_ended_at.eq(Utc::now()),
        consultations::updated_at.eq(diesel::dsl::now),
    ))
    .returning(ConsultationEntity::as_returning())
    .get_result(conn)
    .await
    .map_err(|_| AppError::Conflict("Consultation is no longer in progress".into()))?;

    let mut degraded = Vec::new();
    if let Some(intent_ref) = updated.payment_intent_ref.as_deref() {
        if let Err(err) = state.payments.cancel(intent_ref).await {
            tracing::warn!("Payment cancel failed for {id}, attempting refund: {err}");
            degraded.push(SideEffect::PaymentCancel);
            if let Err(err) = state.payments.refund(intent_ref).await {
                tracing::warn!("Payment refund fallback failed for {id}: {err}");
                degraded.push(SideEffect::PaymentRefund);
            }
        }
    }

    audit::record(
        &state.db_pool,
        "consultation.declined",
        "consultation",
        updated.id,
        OPERATOR_ACTOR,
        serde_json::json!({ "reason": &updated.decline_reason, "degraded": &degraded }),
    )
    .await;

    // TODO: send a decline notification email to the customer once the
    // template is signed off.

    Ok(Json(DeclineRes {
        consultation: updated,
        degraded,
    }))
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResendEmailRes {
    pub certificate_id: Uuid,
    pub emailed_to: String,
}

/// Re-render and re-send an already-issued certificate. Unlike issuance,
/// failures here surface to the operator so the compensating action is
/// visibly retried.
#[utoipa::path(
    post,
    path = "/consultation/{id}/resend-email",
    tags = ["Admin"],
    params(
        ("id" = Uuid, Path, description = "Consultation ID")
    ),
    responses(
        (status = 200, description = "Certificate email re-sent", body = ResendEmailRes)
    )
)]
async fn resend_certificate_email(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationEntity = consultations::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;
    let certificate: CertificateEntity = certificates::table
        .filter(certificates::consultation_id.eq(id))
        .first(conn)
        .await
        .map_err(|_| {
            AppError::BadRequest("No certificate has been issued for this consultation".into())
        })?;

    let pdf_bytes = pdf::render(&certificate, &state.config.pharmacist.contact_line)
        .context("Failed to render certificate PDF")?;
    notifications::send_certificate_email(
        &state.mailer,
        &certificate,
        &consultation.email,
        Some(&pdf_bytes),
    )
    .await?;

    diesel::update(certificates::table.find(certificate.id))
        .set((
            certificates::emailed_at.eq(Utc::now()),
            certificates::emailed_to.eq(&consultation.email),
        ))
        .execute(conn)
        .await
        .context("Failed to record email delivery")?;

    audit::record(
        &state.db_pool,
        "certificate.email_resent",
        "certificate",
        certificate.id,
        OPERATOR_ACTOR,
        serde_json::json!({ "emailed_to": consultation.email }),
    )
    .await;

    Ok(Json(ResendEmailRes {
        certificate_id: certificate.id,
        emailed_to: consultation.email,
    }))
}

/// Download the certificate PDF for an issued consultation.
#[utoipa::path(
    get,
    path = "/consultation/{id}/certificate",
    tags = ["Admin"],
    params(
        ("id" = Uuid, Path, description = "Consultation ID")
    ),
    responses(
        (status = 200, description = "Certificate PDF", body = Vec<u8>, content_type = "application/pdf")
    )
)]
async fn download_certificate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let certificate: CertificateEntity = certificates::table
        .filter(certificates::consultation_id.eq(id))
        .first(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    let pdf_bytes = pdf::render(&certificate, &state.config.pharmacist.contact_line)
        .context("Failed to render certificate PDF")?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"certificate-{}.pdf\"",
                certificate.verification_code
            ),
        ),
    ];
    Ok((headers, pdf_bytes))
}

use anyhow::Context;
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    audit,
    core::{app_error::AppError, app_state::AppState},
    models::{ConsultationEntity, CreateConsultationEntity},
    notifications,
    schema::consultations,
    workflow::{self, ConfirmDisposition, ConsultationStatus, LeaveType, PaymentStatus},
};

/// Defines booking routes with OpenAPI specs.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/book",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(book_hosted_checkout))
            .routes(utoipa_axum::routes!(create_payment_intent))
            .routes(utoipa_axum::routes!(confirm_payment))
            .routes(utoipa_axum::routes!(confirm_hosted_checkout)),
    )
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub leave_type: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub care_recipient_first_name: Option<String>,
    #[serde(default)]
    pub care_recipient_last_name: Option<String>,
    #[serde(default)]
    pub care_recipient_relationship: Option<String>,
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub symptom_onset_date: Option<NaiveDate>,
    pub days_requested: i32,
    pub preferred_callback_at: DateTime<Utc>,
    pub terms_accepted: bool,
}

impl BookingRequest {
    /// Validates required intake fields before any side effect happens.
    pub fn validate(&self) -> Result<LeaveType, AppError> {
        let mut missing = Vec::new();
        if self.first_name.trim().is_empty() {
            missing.push("firstName");
        }
        if self.last_name.trim().is_empty() {
            missing.push("lastName");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.phone.trim().is_empty() {
            missing.push("phone");
        }
        if self.symptoms.iter().all(|s| s.trim().is_empty()) {
            missing.push("symptoms");
        }
        if !missing.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let leave_type = LeaveType::parse(&self.leave_type).ok_or_else(|| {
            AppError::BadRequest(format!("'{}' is not a valid leave type", self.leave_type))
        })?;

        if leave_type == LeaveType::Carer {
            let recipient_complete = self
                .care_recipient_first_name
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
                && self
                    .care_recipient_last_name
                    .as_deref()
                    .is_some_and(|s| !s.trim().is_empty())
                && self
                    .care_recipient_relationship
                    .as_deref()
                    .is_some_and(|s| !s.trim().is_empty());
            if !recipient_complete {
                return Err(AppError::BadRequest(
                    "Carer's leave bookings require care recipient name and relationship".into(),
                ));
            }
        }

        if !self.terms_accepted {
            return Err(AppError::BadRequest(
                "Terms and conditions must be accepted".into(),
            ));
        }

        Ok(leave_type)
    }
}

fn fee_cents(state: &AppState, leave_type: LeaveType) -> i64 {
    match leave_type {
        LeaveType::Personal => state.config.payments.personal_fee_cents,
        LeaveType::Carer => state.config.payments.carer_fee_cents,
    }
}

async fn insert_consultation(
    state: &AppState,
    body: &BookingRequest,
) -> Result<ConsultationEntity, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation = diesel::insert_into(consultations::table)
        .values(CreateConsultationEntity {
            leave_type: body.leave_type.clone(),
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            email: body.email.trim().to_string(),
            phone: body.phone.trim().to_string(),
            date_of_birth: body.date_of_birth,
            care_recipient_first_name: body.care_recipient_first_name.clone(),
            care_recipient_last_name: body.care_recipient_last_name.clone(),
            care_recipient_relationship: body.care_recipient_relationship.clone(),
            symptoms: serde_json::json!(body.symptoms),
            symptom_onset_date: body.symptom_onset_date,
            days_requested: body.days_requested,
            preferred_callback_at: body.preferred_callback_at,
            terms_accepted_at: Utc::now(),
            status: ConsultationStatus::Pending.as_str().into(),
            payment_status: PaymentStatus::Pending.as_str().into(),
        })
        .returning(ConsultationEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create consultation")?;

    audit::record(
        &state.db_pool,
        "consultation.created",
        "consultation",
        consultation.id,
        "customer",
        serde_json::json!({ "leave_type": &consultation.leave_type }),
    )
    .await;

    Ok(consultation)
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostedCheckoutRes {
    pub consultation_id: Uuid,
    pub checkout_url: String,
}

/// Create a consultation and a hosted checkout session (off-site payment).
#[utoipa::path(
    post,
    path = "/",
    tags = ["Booking"],
    request_body = BookingRequest,
    responses(
        (status = 200, description = "Consultation created, redirect to checkout", body = HostedCheckoutRes)
    )
)]
async fn book_hosted_checkout(
    State(state): State<AppState>,
    Json(body): Json<BookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let leave_type = body.validate()?;
    let consultation = insert_consultation(&state, &body).await?;

    let success_url = format!(
        "{}/book/confirm?session_id={{CHECKOUT_SESSION_ID}}",
        state.config.public_base_url
    );
    let cancel_url = format!("{}/book", state.config.public_base_url);
    let session = state
        .payments
        .create_checkout_session(
            fee_cents(&state, leave_type),
            &state.config.payments.currency,
            consultation.id,
            &success_url,
            &cancel_url,
        )
        .await?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    diesel::update(consultations::table.find(consultation.id))
        .set((
            consultations::payment_intent_ref.eq(&session.payment_intent),
            consultations::checkout_session_ref.eq(&session.id),
            consultations::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .context("Failed to store checkout session reference")?;

    let checkout_url = session
        .url
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("Checkout session has no hosted URL")))?;

    Ok(Json(HostedCheckoutRes {
        consultation_id: consultation.id,
        checkout_url,
    }))
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRes {
    pub consultation_id: Uuid,
    pub client_secret: String,
}

/// Create a consultation and an embedded payment intent (in-page payment).
#[utoipa::path(
    post,
    path = "/create-payment-intent",
    tags = ["Booking"],
    request_body = BookingRequest,
    responses(
        (status = 200, description = "Consultation created, intent ready for the embedded form", body = PaymentIntentRes)
    )
)]
async fn create_payment_intent(
    State(state): State<AppState>,
    Json(body): Json<BookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let leave_type = body.validate()?;
    let consultation = insert_consultation(&state, &body).await?;

    let intent = state
        .payments
        .create_intent(
            fee_cents(&state, leave_type),
            &state.config.payments.currency,
            consultation.id,
        )
        .await?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    diesel::update(consultations::table.find(consultation.id))
        .set((
            consultations::payment_intent_ref.eq(&intent.id),
            consultations::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .context("Failed to store payment intent reference")?;

    Ok(Json(PaymentIntentRes {
        consultation_id: consultation.id,
        client_secret: intent.client_secret,
    }))
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub consultation_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub preferred_callback_at: DateTime<Utc>,
}

impl From<&ConsultationEntity> for BookingSummary {
    fn from(c: &ConsultationEntity) -> Self {
        Self {
            consultation_id: c.id,
            status: c.status.clone(),
            payment_status: c.payment_status.clone(),
            preferred_callback_at: c.preferred_callback_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentReq {
    pub consultation_id: Uuid,
}

/// Finalize an embedded-flow authorization after the browser-side SDK
/// reports success. Idempotent against duplicate confirmation calls.
#[utoipa::path(
    post,
    path = "/confirm-payment",
    tags = ["Booking"],
    request_body = ConfirmPaymentReq,
    responses(
        (status = 200, description = "Booking scheduled", body = BookingSummary)
    )
)]
async fn confirm_payment(
    State(state): State<AppState>,
    Json(body): Json<ConfirmPaymentReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationEntity = consultations::table
        .find(body.consultation_id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    let summary = confirm_authorization(&state, consultation).await?;
    Ok(Json(summary))
}

#[derive(Deserialize, IntoParams)]
pub struct ConfirmCheckoutParams {
    pub session_id: String,
}

/// Finalize a hosted-checkout booking when the customer returns on-site.
/// The session status is re-queried from the payment provider rather than
/// trusted from the redirect.
#[utoipa::path(
    get,
    path = "/confirm",
    tags = ["Booking"],
    params(ConfirmCheckoutParams),
    responses(
        (status = 200, description = "Booking scheduled", body = BookingSummary)
    )
)]
async fn confirm_hosted_checkout(
    State(state): State<AppState>,
    Query(params): Query<ConfirmCheckoutParams>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let consultation: ConsultationEntity = consultations::table
        .filter(consultations::checkout_session_ref.eq(&params.session_id))
        .first(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    let session = state
        .payments
        .retrieve_checkout_session(&params.session_id)
        .await?;
    if !matches!(session.payment_status.as_str(), "authorized" | "paid" | "complete") {
        return Err(AppError::BadRequest(format!(
            "Checkout session is not authorized (status '{}')",
            session.payment_status
        )));
    }

    let summary = confirm_authorization(&state, consultation).await?;
    Ok(Json(summary))
}

/// Shared authorize-confirm transition: both intake flows converge here.
///
/// The pending→scheduled flip is a conditional update, so a duplicate
/// confirmation observes zero affected rows and returns the current view
/// without re-sending emails or re-appending audit entries.
async fn confirm_authorization(
    state: &AppState,
    consultation: ConsultationEntity,
) -> Result<BookingSummary, AppError> {
    match workflow::confirm_disposition(&consultation)? {
        ConfirmDisposition::Proceed => {}
        // Already confirmed: return the cached view, no side effects.
        ConfirmDisposition::AlreadyConfirmed => return Ok(BookingSummary::from(&consultation)),
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated: Result<ConsultationEntity, _> = diesel::update(
        consultations::table
            .find(consultation.id)
            .filter(consultations::status.eq(ConsultationStatus::Pending.as_str())),
    )
    .set((
        consultations::status.eq(ConsultationStatus::Scheduled.as_str()),
        consultations::payment_status.eq(PaymentStatus::Authorized.as_str()),
        consultations::updated_at.eq(diesel::dsl::now),
    ))
    .returning(ConsultationEntity::as_returning())
    .get_result(conn)
    .await;

    let updated = match updated {
        Ok(updated) => updated,
        // Lost a race against a duplicate confirmation; the winner already
        // sent the emails. Return the current row as-is.
        Err(diesel::result::Error::NotFound) => {
            let current: ConsultationEntity = consultations::table
                .find(consultation.id)
                .get_result(conn)
                .await
                .map_err(AppError::from)?;
            return Ok(BookingSummary::from(&current));
        }
        Err(err) => return Err(err.into()),
    };

    audit::record(
        &state.db_pool,
        "payment.authorized",
        "consultation",
        updated.id,
        "payment-provider",
        serde_json::json!({ "payment_intent": &updated.payment_intent_ref }),
    )
    .await;

    // Notification failures are logged, never surfaced to the customer.
    if let Err(err) = notifications::send_booking_confirmation(&state.mailer, &updated).await {
        tracing::warn!("Booking confirmation email failed for {}: {err}", updated.id);
    }
    if let Err(err) =
        notifications::send_admin_notification(&state.mailer, &state.config, &updated).await
    {
        tracing::warn!("Admin notification email failed for {}: {err}", updated.id);
    }

    Ok(BookingSummary::from(&updated))
}

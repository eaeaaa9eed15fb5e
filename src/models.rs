use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

// Consultations

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::consultations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConsultationEntity {
    pub id: Uuid,
    pub leave_type: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub care_recipient_first_name: Option<String>,
    pub care_recipient_last_name: Option<String>,
    pub care_recipient_relationship: Option<String>,
    pub symptoms: Value,
    pub symptom_onset_date: Option<NaiveDate>,
    pub days_requested: i32,
    pub preferred_callback_at: DateTime<Utc>,
    pub terms_accepted_at: DateTime<Utc>,
    pub status: String,
    pub payment_status: String,
    pub payment_intent_ref: Option<String>,
    pub checkout_session_ref: Option<String>,
    pub call_started_at: Option<DateTime<Utc>>,
    pub call_ended_at: Option<DateTime<Utc>>,
    pub operator_notes: Option<String>,
    pub decline_reason: Option<String>,
    pub certificate_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::consultations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateConsultationEntity {
    pub leave_type: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub care_recipient_first_name: Option<String>,
    pub care_recipient_last_name: Option<String>,
    pub care_recipient_relationship: Option<String>,
    pub symptoms: Value,
    pub symptom_onset_date: Option<NaiveDate>,
    pub days_requested: i32,
    pub preferred_callback_at: DateTime<Utc>,
    pub terms_accepted_at: DateTime<Utc>,
    pub status: String,
    pub payment_status: String,
}

// Certificates

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::certificates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CertificateEntity {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub verification_code: String,
    pub leave_type: String,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub date_of_birth: NaiveDate,
    pub care_recipient_name: Option<String>,
    pub care_recipient_relationship: Option<String>,
    pub unfit_from: NaiveDate,
    pub unfit_to: NaiveDate,
    pub days_unfit: i32,
    pub pharmacist_name: String,
    pub pharmacist_registration: String,
    pub issued_at: DateTime<Utc>,
    pub emailed_at: Option<DateTime<Utc>>,
    pub emailed_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::certificates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateCertificateEntity {
    pub consultation_id: Uuid,
    pub verification_code: String,
    pub leave_type: String,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub date_of_birth: NaiveDate,
    pub care_recipient_name: Option<String>,
    pub care_recipient_relationship: Option<String>,
    pub unfit_from: NaiveDate,
    pub unfit_to: NaiveDate,
    pub days_unfit: i32,
    pub pharmacist_name: String,
    pub pharmacist_registration: String,
    pub issued_at: DateTime<Utc>,
}

// Audit log

#[derive(Queryable, Selectable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::audit_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditLogEntity {
    pub id: i32,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: String,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::audit_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateAuditLogEntity {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: String,
    pub detail: Value,
}

//! Issuance workflow: consultation status machine, issuance window math and
//! certificate snapshotting.
//!
//! The workflow itself holds no state between requests. Handlers read the
//! current row, validate the transition here, and apply it with a conditional
//! update so that the first of two racing operator actions wins and the loser
//! observes a conflict.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::app_error::AppError,
    models::{ConsultationEntity, CreateCertificateEntity},
    verification,
};

/// Certificates never cover more than two days.
pub const MAX_DAYS_UNFIT: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsultationStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Declined,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::InProgress => "in_progress",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ConsultationStatus::Pending),
            "scheduled" => Some(ConsultationStatus::Scheduled),
            "in_progress" => Some(ConsultationStatus::InProgress),
            "completed" => Some(ConsultationStatus::Completed),
            "declined" => Some(ConsultationStatus::Declined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Captured,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveType {
    Personal,
    Carer,
}

impl LeaveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveType::Personal => "personal",
            LeaveType::Carer => "carer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "personal" => Some(LeaveType::Personal),
            "carer" => Some(LeaveType::Carer),
            _ => None,
        }
    }
}

/// Best-effort side effects of the issue/decline transitions. The clinical
/// state change commits regardless; each failed effect is reported back to
/// the operator instead of only being logged.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    PaymentCapture,
    PaymentCancel,
    PaymentRefund,
    PdfRender,
    EmailDelivery,
}

/// Validated issuance window: never backdated, clamped to [`MAX_DAYS_UNFIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceWindow {
    pub unfit_from: NaiveDate,
    pub unfit_to: NaiveDate,
    pub days_unfit: i32,
}

/// Computes the certificate's validity window from the issuance instant and
/// the operator's requested day count.
pub fn issuance_window(issued_at: DateTime<Utc>, days_to_issue: i32) -> IssuanceWindow {
    let days_unfit = days_to_issue.clamp(1, MAX_DAYS_UNFIT);
    let unfit_from = issued_at.date_naive();
    let unfit_to = unfit_from + Duration::days(i64::from(days_unfit) - 1);
    IssuanceWindow {
        unfit_from,
        unfit_to,
        days_unfit,
    }
}

/// Outcome of checking an authorize-confirm request against the current
/// consultation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDisposition {
    /// First confirmation: apply the pending→scheduled flip and side effects.
    Proceed,
    /// Duplicate confirmation: return the current view, no side effects.
    AlreadyConfirmed,
}

/// Decides how a payment confirmation applies to the consultation. Only a
/// pending consultation proceeds; a scheduled one is a duplicate and must not
/// re-send emails or re-append audit entries; anything later is a conflict.
pub fn confirm_disposition(
    consultation: &ConsultationEntity,
) -> Result<ConfirmDisposition, AppError> {
    match consultation.status.as_str() {
        "pending" => Ok(ConfirmDisposition::Proceed),
        "scheduled" => Ok(ConfirmDisposition::AlreadyConfirmed),
        other => Err(AppError::Conflict(format!(
            "Cannot confirm payment for a consultation in status '{other}'"
        ))),
    }
}

/// Rejects a transition unless the consultation is in the expected status.
pub fn ensure_status(
    consultation: &ConsultationEntity,
    expected: ConsultationStatus,
    action: &str,
) -> Result<(), AppError> {
    if consultation.status == expected.as_str() {
        return Ok(());
    }
    Err(AppError::Conflict(format!(
        "Cannot {} a consultation in status '{}' (expected '{}')",
        action,
        consultation.status,
        expected.as_str()
    )))
}

/// Builds the immutable certificate row from the consultation at the moment
/// of issuance. Fields are copied, not linked, so later edits to the
/// consultation do not alter the issued document.
pub fn snapshot_certificate(
    consultation: &ConsultationEntity,
    window: IssuanceWindow,
    issued_at: DateTime<Utc>,
    pharmacist_name: &str,
    pharmacist_registration: &str,
) -> CreateCertificateEntity {
    let care_recipient_name = match (
        consultation.care_recipient_first_name.as_deref(),
        consultation.care_recipient_last_name.as_deref(),
    ) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first.to_string()),
        (None, Some(last)) => Some(last.to_string()),
        (None, None) => None,
    };

    CreateCertificateEntity {
        consultation_id: consultation.id,
        verification_code: verification::generate(),
        leave_type: consultation.leave_type.clone(),
        patient_first_name: consultation.first_name.clone(),
        patient_last_name: consultation.last_name.clone(),
        date_of_birth: consultation.date_of_birth,
        care_recipient_name,
        care_recipient_relationship: consultation.care_recipient_relationship.clone(),
        unfit_from: window.unfit_from,
        unfit_to: window.unfit_to,
        days_unfit: window.days_unfit,
        pharmacist_name: pharmacist_name.to_string(),
        pharmacist_registration: pharmacist_registration.to_string(),
        issued_at,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn consultation(status: ConsultationStatus) -> ConsultationEntity {
        ConsultationEntity {
            id: uuid::Uuid::new_v4(),
            leave_type: "carer".into(),
            first_name: "Maya".into(),
            last_name: "Osei".into(),
            email: "maya@example.com".into(),
            phone: "0400000000".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1991, 4, 17).unwrap(),
            care_recipient_first_name: Some("Kofi".into()),
            care_recipient_last_name: Some("Osei".into()),
            care_recipient_relationship: Some("son".into()),
            symptoms: serde_json::json!(["fever"]),
            symptom_onset_date: None,
            days_requested: 1,
            preferred_callback_at: Utc::now(),
            terms_accepted_at: Utc::now(),
            status: status.as_str().into(),
            payment_status: "authorized".into(),
            payment_intent_ref: Some("pi_123".into()),
            checkout_session_ref: None,
            call_started_at: None,
            call_ended_at: None,
            operator_notes: None,
            decline_reason: None,
            certificate_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn window_clamps_day_count_to_two() {
        let issued_at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 30, 0).unwrap();
        for requested in [2, 3, 7, 100] {
            let window = issuance_window(issued_at, requested);
            assert_eq!(window.days_unfit, 2);
            assert_eq!(window.unfit_from, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
            assert_eq!(window.unfit_to, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        }
    }

    #[test]
    fn single_day_window_starts_and_ends_on_issue_day() {
        let issued_at = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 59).unwrap();
        let window = issuance_window(issued_at, 1);
        assert_eq!(window.days_unfit, 1);
        assert_eq!(window.unfit_from, window.unfit_to);
        assert_eq!(window.unfit_from, issued_at.date_naive());
    }

    #[test]
    fn non_positive_day_counts_are_raised_to_one() {
        let issued_at = Utc.with_ymd_and_hms(2026, 3, 9, 8, 0, 0).unwrap();
        for requested in [0, -3] {
            let window = issuance_window(issued_at, requested);
            assert_eq!(window.days_unfit, 1);
        }
    }

    #[test]
    fn payment_confirmation_proceeds_only_from_pending() {
        let c = consultation(ConsultationStatus::Pending);
        assert_eq!(confirm_disposition(&c).unwrap(), ConfirmDisposition::Proceed);
    }

    #[test]
    fn duplicate_payment_confirmation_triggers_no_side_effects() {
        let c = consultation(ConsultationStatus::Scheduled);
        assert_eq!(
            confirm_disposition(&c).unwrap(),
            ConfirmDisposition::AlreadyConfirmed
        );
    }

    #[test]
    fn payment_confirmation_conflicts_once_the_call_has_started() {
        for status in [
            ConsultationStatus::InProgress,
            ConsultationStatus::Completed,
            ConsultationStatus::Declined,
        ] {
            let c = consultation(status);
            assert!(matches!(
                confirm_disposition(&c),
                Err(AppError::Conflict(_))
            ));
        }
    }

    #[test]
    fn ensure_status_rejects_every_non_matching_status() {
        for status in [
            ConsultationStatus::Pending,
            ConsultationStatus::Scheduled,
            ConsultationStatus::Completed,
            ConsultationStatus::Declined,
        ] {
            let c = consultation(status);
            let err = ensure_status(&c, ConsultationStatus::InProgress, "issue").unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
        }

        let c = consultation(ConsultationStatus::InProgress);
        assert!(ensure_status(&c, ConsultationStatus::InProgress, "issue").is_ok());
    }

    #[test]
    fn snapshot_copies_consultation_fields_at_issuance() {
        let c = consultation(ConsultationStatus::InProgress);
        let issued_at = Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap();
        let window = issuance_window(issued_at, 2);
        let cert = snapshot_certificate(&c, window, issued_at, "Sarah Chen", "PHA0000000000");

        assert_eq!(cert.consultation_id, c.id);
        assert_eq!(cert.leave_type, "carer");
        assert_eq!(cert.patient_first_name, "Maya");
        assert_eq!(cert.patient_last_name, "Osei");
        assert_eq!(cert.date_of_birth, c.date_of_birth);
        assert_eq!(cert.care_recipient_name.as_deref(), Some("Kofi Osei"));
        assert_eq!(cert.care_recipient_relationship.as_deref(), Some("son"));
        assert_eq!(cert.days_unfit, 2);
        assert_eq!(cert.issued_at, issued_at);
        assert_eq!(cert.verification_code.len(), 8);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ConsultationStatus::Pending,
            ConsultationStatus::Scheduled,
            ConsultationStatus::InProgress,
            ConsultationStatus::Completed,
            ConsultationStatus::Declined,
        ] {
            assert_eq!(ConsultationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConsultationStatus::parse("archived"), None);
    }
}

//! Transactional email composition and delivery.
//!
//! Every send here is a best-effort side effect: callers log failures and
//! carry on with the primary state transition (see the workflow rationale).

use crate::{
    api::email::{Attachment, MailerClient},
    core::{app_error::AppError, config::Config},
    models::{CertificateEntity, ConsultationEntity},
};

pub async fn send_booking_confirmation(
    mailer: &MailerClient,
    consultation: &ConsultationEntity,
) -> Result<(), AppError> {
    let subject = "Your pharmacist consultation is booked";
    let html = booking_confirmation_html(consultation);
    mailer.send(&consultation.email, subject, &html, Vec::new()).await
}

pub async fn send_admin_notification(
    mailer: &MailerClient,
    config: &Config,
    consultation: &ConsultationEntity,
) -> Result<(), AppError> {
    let subject = format!(
        "New consultation booked: {} {}",
        consultation.first_name, consultation.last_name
    );
    let html = admin_notification_html(consultation);
    mailer
        .send(&config.mail.admin_address, &subject, &html, Vec::new())
        .await
}

/// Delivers the issued certificate. The PDF attachment is optional so a
/// failed render still produces a notification the customer can act on.
pub async fn send_certificate_email(
    mailer: &MailerClient,
    certificate: &CertificateEntity,
    to: &str,
    pdf: Option<&[u8]>,
) -> Result<(), AppError> {
    let subject = "Your medical certificate";
    let html = certificate_delivery_html(certificate);
    let attachments = match pdf {
        Some(bytes) => vec![Attachment::from_bytes(
            format!("certificate-{}.pdf", certificate.verification_code),
            bytes,
        )],
        None => Vec::new(),
    };
    mailer.send(to, subject, &html, attachments).await
}

pub fn booking_confirmation_html(consultation: &ConsultationEntity) -> String {
    format!(
        "<p>Hi {first},</p>\
         <p>Your phone consultation with our pharmacist is confirmed. We will call \
         {phone} at your preferred time: <strong>{callback}</strong>.</p>\
         <p>Please have a quiet moment available and keep your phone nearby.</p>\
         <p>Booking reference: {id}</p>",
        first = consultation.first_name,
        phone = consultation.phone,
        callback = consultation
            .preferred_callback_at
            .format("%A, %-d %B %Y at %H:%M UTC"),
        id = consultation.id,
    )
}

pub fn admin_notification_html(consultation: &ConsultationEntity) -> String {
    format!(
        "<p>A new consultation has been paid and scheduled.</p>\
         <ul>\
         <li>Patient: {first} {last}</li>\
         <li>Leave type: {leave_type}</li>\
         <li>Preferred callback: {callback}</li>\
         <li>Days requested: {days}</li>\
         <li>Consultation id: {id}</li>\
         </ul>",
        first = consultation.first_name,
        last = consultation.last_name,
        leave_type = consultation.leave_type,
        callback = consultation
            .preferred_callback_at
            .format("%A, %-d %B %Y at %H:%M UTC"),
        days = consultation.days_requested,
        id = consultation.id,
    )
}

pub fn certificate_delivery_html(certificate: &CertificateEntity) -> String {
    format!(
        "<p>Hi {first},</p>\
         <p>Your certificate has been issued and is attached to this email.</p>\
         <p>It covers <strong>{from}</strong> to <strong>{to}</strong>.</p>\
         <p>Your employer can verify it at any time with the code \
         <strong>{code}</strong>.</p>",
        first = certificate.patient_first_name,
        from = certificate.unfit_from.format("%-d %B %Y"),
        to = certificate.unfit_to.format("%-d %B %Y"),
        code = certificate.verification_code,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn consultation() -> ConsultationEntity {
        ConsultationEntity {
            id: Uuid::new_v4(),
            leave_type: "personal".into(),
            first_name: "Maya".into(),
            last_name: "Osei".into(),
            email: "maya@example.com".into(),
            phone: "0400000000".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1991, 4, 17).unwrap(),
            care_recipient_first_name: None,
            care_recipient_last_name: None,
            care_recipient_relationship: None,
            symptoms: serde_json::json!(["headache"]),
            symptom_onset_date: None,
            days_requested: 1,
            preferred_callback_at: Utc.with_ymd_and_hms(2026, 3, 9, 9, 30, 0).unwrap(),
            terms_accepted_at: Utc::now(),
            status: "scheduled".into(),
            payment_status: "authorized".into(),
            payment_intent_ref: None,
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
    fn booking_confirmation_mentions_callback_time_and_reference() {
        let c = consultation();
        let html = booking_confirmation_html(&c);
        assert!(html.contains("Maya"));
        assert!(html.contains("Monday, 9 March 2026 at 09:30 UTC"));
        assert!(html.contains(&c.id.to_string()));
    }

    #[test]
    fn certificate_email_carries_code_and_date_range() {
        let cert = CertificateEntity {
            id: Uuid::new_v4(),
            consultation_id: Uuid::new_v4(),
            verification_code: "ABCD2345".into(),
            leave_type: "personal".into(),
            patient_first_name: "Maya".into(),
            patient_last_name: "Osei".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1991, 4, 17).unwrap(),
            care_recipient_name: None,
            care_recipient_relationship: None,
            unfit_from: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            unfit_to: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            days_unfit: 2,
            pharmacist_name: "Sarah Chen".into(),
            pharmacist_registration: "PHA0000000000".into(),
            issued_at: Utc::now(),
            emailed_at: None,
            emailed_to: None,
            created_at: Utc::now(),
        };
        let html = certificate_delivery_html(&cert);
        assert!(html.contains("ABCD2345"));
        assert!(html.contains("9 March 2026"));
        assert!(html.contains("10 March 2026"));
    }
}

use certservice::models::ConsultationEntity;
use certservice::verification;
use certservice::workflow::{
    ConfirmDisposition, ConsultationStatus, SideEffect, confirm_disposition, ensure_status,
    issuance_window, snapshot_certificate,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

fn in_progress_consultation() -> ConsultationEntity {
    ConsultationEntity {
        id: Uuid::new_v4(),
        leave_type: "personal".into(),
        first_name: "Leah".into(),
        last_name: "Tran".into(),
        email: "leah@example.com".into(),
        phone: "0411222333".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1988, 11, 2).expect("valid date of birth"),
        care_recipient_first_name: None,
        care_recipient_last_name: None,
        care_recipient_relationship: None,
        symptoms: serde_json::json!(["migraine", "nausea"]),
        symptom_onset_date: NaiveDate::from_ymd_opt(2026, 3, 8),
        days_requested: 2,
        preferred_callback_at: Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap(),
        terms_accepted_at: Utc.with_ymd_and_hms(2026, 3, 8, 20, 0, 0).unwrap(),
        status: ConsultationStatus::InProgress.as_str().into(),
        payment_status: "authorized".into(),
        payment_intent_ref: Some("pi_test_1".into()),
        checkout_session_ref: None,
        call_started_at: Some(Utc.with_ymd_and_hms(2026, 3, 9, 9, 5, 0).unwrap()),
        call_ended_at: None,
        operator_notes: None,
        decline_reason: None,
        certificate_id: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 8, 20, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2026, 3, 9, 9, 5, 0).unwrap(),
    }
}

#[test]
fn days_unfit_is_clamped_and_window_is_contiguous() {
    let issued_at = Utc.with_ymd_and_hms(2026, 3, 9, 16, 45, 12).unwrap();
    for days_to_issue in 1..=6 {
        let window = issuance_window(issued_at, days_to_issue);
        assert_eq!(window.days_unfit, days_to_issue.min(2));
        assert_eq!(window.unfit_from, issued_at.date_naive());
        assert_eq!(
            window.unfit_to,
            window.unfit_from + Duration::days(i64::from(window.days_unfit) - 1)
        );
    }
}

#[test]
fn certificates_are_never_backdated() {
    let issued_at = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 1).unwrap();
    let window = issuance_window(issued_at, 2);
    assert!(window.unfit_from >= issued_at.date_naive());
}

#[test]
fn one_thousand_codes_match_the_restricted_alphabet() {
    for _ in 0..1000 {
        let code = verification::generate();
        assert_eq!(code.len(), 8);
        for c in code.chars() {
            assert!(
                verification::ALPHABET.contains(&(c as u8)),
                "unexpected character {c} in code {code}"
            );
            assert!(!"IO01".contains(c), "ambiguous character {c} in code {code}");
        }
    }
}

#[test]
fn issue_is_rejected_unless_the_call_is_in_progress() {
    for status in [
        ConsultationStatus::Pending,
        ConsultationStatus::Scheduled,
        ConsultationStatus::Completed,
        ConsultationStatus::Declined,
    ] {
        let mut consultation = in_progress_consultation();
        consultation.status = status.as_str().into();
        assert!(
            ensure_status(&consultation, ConsultationStatus::InProgress, "issue").is_err(),
            "issue should be rejected in status {}",
            status.as_str()
        );
    }

    let consultation = in_progress_consultation();
    assert!(ensure_status(&consultation, ConsultationStatus::InProgress, "issue").is_ok());
}

#[test]
fn repeated_payment_confirmations_schedule_exactly_once() {
    // First confirmation finds the booking pending and proceeds; every later
    // one finds it scheduled and is told to skip the flip, the emails and the
    // audit append.
    let mut consultation = in_progress_consultation();
    consultation.status = ConsultationStatus::Pending.as_str().into();
    assert_eq!(
        confirm_disposition(&consultation).unwrap(),
        ConfirmDisposition::Proceed
    );

    consultation.status = ConsultationStatus::Scheduled.as_str().into();
    for _ in 0..3 {
        assert_eq!(
            confirm_disposition(&consultation).unwrap(),
            ConfirmDisposition::AlreadyConfirmed
        );
    }

    consultation.status = ConsultationStatus::Declined.as_str().into();
    assert!(confirm_disposition(&consultation).is_err());
}

#[test]
fn snapshot_then_render_produces_a_pdf_for_the_full_issue_path() {
    let consultation = in_progress_consultation();
    let issued_at = Utc.with_ymd_and_hms(2026, 3, 9, 16, 45, 12).unwrap();
    let window = issuance_window(issued_at, 2);
    let snapshot = snapshot_certificate(&consultation, window, issued_at, "Sarah Chen", "PHA123");

    assert_eq!(snapshot.unfit_from, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    assert_eq!(snapshot.unfit_to, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
    assert_eq!(snapshot.days_unfit, 2);

    // Promote the snapshot to a stored row shape and render it.
    let certificate = certservice::models::CertificateEntity {
        id: Uuid::new_v4(),
        consultation_id: snapshot.consultation_id,
        verification_code: snapshot.verification_code.clone(),
        leave_type: snapshot.leave_type.clone(),
        patient_first_name: snapshot.patient_first_name.clone(),
        patient_last_name: snapshot.patient_last_name.clone(),
        date_of_birth: snapshot.date_of_birth,
        care_recipient_name: snapshot.care_recipient_name.clone(),
        care_recipient_relationship: snapshot.care_recipient_relationship.clone(),
        unfit_from: snapshot.unfit_from,
        unfit_to: snapshot.unfit_to,
        days_unfit: snapshot.days_unfit,
        pharmacist_name: snapshot.pharmacist_name.clone(),
        pharmacist_registration: snapshot.pharmacist_registration.clone(),
        issued_at: snapshot.issued_at,
        emailed_at: None,
        emailed_to: None,
        created_at: issued_at,
    };
    let bytes = certservice::pdf::render(&certificate, "Enquiries: certificates@example.com")
        .expect("render succeeds for a complete certificate");
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn degraded_side_effects_serialize_as_snake_case_labels() {
    let degraded = vec![SideEffect::PaymentCapture, SideEffect::EmailDelivery];
    let json = serde_json::to_string(&degraded).unwrap();
    assert_eq!(json, r#"["payment_capture","email_delivery"]"#);
}

//! Certificate PDF renderer.
//!
//! Pure transform from an issued certificate row to a single-page A4 PDF.
//! No clock reads and no I/O; the only timestamp rendered is the stored
//! `issued_at`, so the page content is reproducible for a given row.

use std::io::BufWriter;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use printpdf::*;

use crate::models::CertificateEntity;

// A4 with 20mm margins; wrap math works on the printable width.
const PRINTABLE_WIDTH_MM: f32 = 170.0;

const PT_TO_MM: f32 = 0.352_778;

/// Statutory basis quoted on every certificate.
const DISCLAIMER: &str = "This certificate is issued as evidence for the purposes of \
section 107(3) of the Fair Work Act 2009 (Cth). It records the professional opinion of \
the issuing pharmacist formed during a telehealth consultation and does not constitute \
a medical diagnosis. Its authenticity can be confirmed using the verification code shown \
above.";

/// Renders the certificate to PDF bytes. Fails fast on blank required fields
/// rather than producing a partial document.
pub fn render(cert: &CertificateEntity, contact_line: &str) -> Result<Vec<u8>> {
    if cert.patient_first_name.trim().is_empty() || cert.patient_last_name.trim().is_empty() {
        bail!("Certificate patient name is blank");
    }
    if cert.verification_code.trim().is_empty() {
        bail!("Certificate verification code is blank");
    }
    if cert.pharmacist_name.trim().is_empty() {
        bail!("Certificate pharmacist name is blank");
    }

    let title = match cert.leave_type.as_str() {
        "carer" => "CERTIFICATE FOR CARER'S LEAVE",
        _ => "CERTIFICATE FOR PERSONAL LEAVE",
    };

    let (doc, page1, layer1) = PdfDocument::new(
        title,
        Mm(210.0),
        Mm(297.0),
        "Layer 1",
    );
    let layer = doc.get_page(page1).get_layer(layer1);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow::anyhow!("PDF font error: {e}"))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow::anyhow!("PDF font error: {e}"))?;

    let mut y = Mm(270.0);

    layer.use_text(title, 16.0, Mm(20.0), y, &bold);
    y -= Mm(8.0);
    layer.use_text(
        format!("Verification code: {}", cert.verification_code),
        10.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(12.0);

    let patient = format!("{} {}", cert.patient_first_name, cert.patient_last_name);
    layer.use_text("PATIENT", 11.0, Mm(20.0), y, &bold);
    y -= Mm(6.0);
    layer.use_text(&patient, 10.0, Mm(25.0), y, &font);
    y -= Mm(5.0);
    layer.use_text(
        format!("Date of birth: {}", long_date(cert.date_of_birth)),
        10.0,
        Mm(25.0),
        y,
        &font,
    );
    y -= Mm(10.0);

    if let Some(recipient) = &cert.care_recipient_name {
        layer.use_text("CARE RECIPIENT", 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);
        let relationship = cert
            .care_recipient_relationship
            .as_deref()
            .unwrap_or("family member");
        layer.use_text(
            format!("{recipient} ({relationship})"),
            10.0,
            Mm(25.0),
            y,
            &font,
        );
        y -= Mm(10.0);
    }

    layer.use_text("CERTIFICATION", 11.0, Mm(20.0), y, &bold);
    y -= Mm(6.0);
    for line in wrap_text(&certification_statement(cert, &patient), 10.0, PRINTABLE_WIDTH_MM) {
        layer.use_text(&line, 10.0, Mm(20.0), y, &font);
        y -= Mm(5.0);
    }
    y -= Mm(5.0);

    layer.use_text(
        format!("Unfit from: {}", long_date(cert.unfit_from)),
        10.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(5.0);
    layer.use_text(
        format!("Unfit to: {}", long_date(cert.unfit_to)),
        10.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(5.0);
    let duration = if cert.days_unfit == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", cert.days_unfit)
    };
    layer.use_text(format!("Duration: {duration}"), 10.0, Mm(20.0), y, &font);
    y -= Mm(12.0);

    layer.use_text("ISSUED BY", 11.0, Mm(20.0), y, &bold);
    y -= Mm(6.0);
    layer.use_text(&cert.pharmacist_name, 10.0, Mm(25.0), y, &font);
    y -= Mm(5.0);
    layer.use_text(
        format!("Registration: {}", cert.pharmacist_registration),
        10.0,
        Mm(25.0),
        y,
        &font,
    );
    y -= Mm(5.0);
    layer.use_text(
        format!(
            "Issued on {}",
            cert.issued_at.format("%A, %-d %B %Y").to_string()
        ),
        10.0,
        Mm(25.0),
        y,
        &font,
    );
    y -= Mm(5.0);
    if !contact_line.trim().is_empty() {
        layer.use_text(contact_line, 10.0, Mm(25.0), y, &font);
        y -= Mm(5.0);
    }
    y -= Mm(8.0);

    for line in wrap_text(DISCLAIMER, 8.0, PRINTABLE_WIDTH_MM) {
        layer.use_text(&line, 8.0, Mm(20.0), y, &font);
        y -= Mm(4.0);
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| anyhow::anyhow!("PDF save error: {e}"))?;
    buf.into_inner()
        .map_err(|e| anyhow::anyhow!("PDF buffer error: {e}"))
}

fn certification_statement(cert: &CertificateEntity, patient: &str) -> String {
    match cert.leave_type.as_str() {
        "carer" => {
            let recipient = cert.care_recipient_name.as_deref().unwrap_or("a family member");
            format!(
                "Following a telehealth consultation, in my professional opinion {patient} \
                 requires leave to provide care or support to {recipient} who is affected \
                 by illness or injury."
            )
        }
        _ => format!(
            "Following a telehealth consultation, in my professional opinion {patient} is \
             unfit for work due to illness or injury for the period stated below."
        ),
    }
}

fn long_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}

/// Approximate advance width of a Helvetica glyph in ems.
fn char_width_em(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '.' | ',' | '\'' | '!' | ':' | ';' => 0.28,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '-' | ' ' => 0.36,
        'm' | 'w' | 'M' | 'W' | '@' => 0.89,
        c if c.is_ascii_uppercase() => 0.72,
        c if c.is_ascii_digit() => 0.56,
        _ => 0.5,
    }
}

fn text_width_mm(text: &str, font_size_pt: f32) -> f32 {
    let ems: f32 = text.chars().map(char_width_em).sum();
    ems * font_size_pt * PT_TO_MM
}

/// Greedy line fill: words accumulate while the estimated rendered width fits
/// the printable width; on overflow the line is flushed and the overflowing
/// word starts the next one.
pub fn wrap_text(text: &str, font_size_pt: f32, max_width_mm: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if current.is_empty() || text_width_mm(&candidate, font_size_pt) <= max_width_mm {
            current = candidate;
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn certificate() -> CertificateEntity {
        CertificateEntity {
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
            issued_at: Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap(),
            emailed_at: None,
            emailed_to: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn renders_a_pdf_document() {
        let bytes = render(&certificate(), "Enquiries: certificates@example.com").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn renders_carer_certificate_with_recipient() {
        let mut cert = certificate();
        cert.leave_type = "carer".into();
        cert.care_recipient_name = Some("Kofi Osei".into());
        cert.care_recipient_relationship = Some("son".into());
        let bytes = render(&cert, "").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn fails_fast_on_blank_patient_name() {
        let mut cert = certificate();
        cert.patient_first_name = "  ".into();
        assert!(render(&cert, "").is_err());
    }

    #[test]
    fn fails_fast_on_blank_verification_code() {
        let mut cert = certificate();
        cert.verification_code = String::new();
        assert!(render(&cert, "").is_err());
    }

    #[test]
    fn wrap_fills_lines_greedily_within_width() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let lines = wrap_text(text, 10.0, 40.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width_mm(line, 10.0) <= 40.0);
        }
        let rejoined = lines.join(" ");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn wrap_keeps_overlong_word_on_its_own_line() {
        let lines = wrap_text("supercalifragilisticexpialidocious", 12.0, 10.0);
        assert_eq!(lines, vec!["supercalifragilisticexpialidocious".to_string()]);
    }

    #[test]
    fn wrap_of_empty_text_is_empty() {
        assert!(wrap_text("", 10.0, 100.0).is_empty());
    }
}

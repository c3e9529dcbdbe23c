//! Pre-filled email drafts for sending an invoice from the user's mail client.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// `mailto:` link with recipient, subject and body percent-encoded.
    pub mailto: String,
}

pub fn compose_email(
    invoice_number: &str,
    company_name: &str,
    client_name: &str,
    client_email: &str,
    signature: &str,
) -> EmailDraft {
    let subject = format!("Invoice {} from {}", invoice_number, company_name);
    let mut body = format!(
        "Dear {},\n\nPlease find attached invoice {}.\n\nBest regards,\n{}",
        client_name, invoice_number, company_name
    );
    if !signature.trim().is_empty() {
        body.push_str("\n\n");
        body.push_str(signature.trim_end());
    }

    // `@` is legal in a mailto address; everything else reserved is encoded.
    let recipient = urlencoding::encode(client_email).replace("%40", "@");
    let mailto = format!(
        "mailto:{}?subject={}&body={}",
        recipient,
        urlencoding::encode(&subject),
        urlencoding::encode(&body)
    );

    EmailDraft {
        to: client_email.to_string(),
        subject,
        body,
        mailto,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_uses_standard_wording() {
        let draft = compose_email("INV-2024-001", "Helios", "Jane", "jane@example.com", "");

        assert_eq!(draft.subject, "Invoice INV-2024-001 from Helios");
        assert_eq!(
            draft.body,
            "Dear Jane,\n\nPlease find attached invoice INV-2024-001.\n\nBest regards,\nHelios"
        );
        assert_eq!(draft.to, "jane@example.com");
    }

    #[test]
    fn signature_is_appended() {
        let draft = compose_email("INV-1", "Helios", "Jane", "jane@example.com", "Accounts Team\n");
        assert!(draft.body.ends_with("Best regards,\nHelios\n\nAccounts Team"));
    }

    #[test]
    fn mailto_is_percent_encoded() {
        let draft = compose_email("INV-2024-001", "Helios & Co", "Jane", "jane@example.com", "");

        assert!(draft
            .mailto
            .starts_with("mailto:jane@example.com?subject=Invoice%20INV-2024-001%20from%20Helios%20%26%20Co&body="));
        assert!(draft.mailto.contains("Dear%20Jane%2C%0A%0A"));
        assert!(!draft.mailto.contains('\n'));
    }

    #[test]
    fn recipient_cannot_inject_link_parameters() {
        let draft = compose_email(
            "INV-1",
            "Helios",
            "Jane",
            "jane@example.com?bcc=eve@example.com&x=",
            "",
        );

        assert!(draft
            .mailto
            .starts_with("mailto:jane@example.com%3Fbcc%3Deve@example.com%26x%3D?subject="));
        assert_eq!(draft.mailto.matches('?').count(), 1);
        assert_eq!(draft.to, "jane@example.com?bcc=eve@example.com&x=");
    }
}

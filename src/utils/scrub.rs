/*!
 * PHI Scrubbing
 *
 * Shared regex-based redaction used by the audit writer and the anonymizer.
 * Identifiers, email addresses, and phone-like digit runs are replaced with
 * placeholder tokens before text leaves the clinical data boundary.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// v4-style 128-bit identifiers
pub static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Email addresses
pub static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

/// Phone numbers: an optional +, then at least six digits allowing common
/// separators. Anchored on digit density rather than exact formats.
pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\s\-().]{5,}\d").unwrap());

/// Scrub PHI patterns from free text for the audit trail
///
/// Identifiers, emails, and phone numbers each become `[REDACTED]`. Entity
/// references belong in the audit row's `entity_id` column, never in the
/// action text.
pub fn scrub_phi(text: &str) -> String {
    let scrubbed = UUID_RE.replace_all(text, "[REDACTED]");
    let scrubbed = EMAIL_RE.replace_all(&scrubbed, "[REDACTED]");
    let scrubbed = PHONE_RE.replace_all(&scrubbed, "[REDACTED]");
    scrubbed.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrubs_uuid() {
        let text = "viewed patient 550e8400-e29b-41d4-a716-446655440000 today";
        assert_eq!(scrub_phi(text), "viewed patient [REDACTED] today");
    }

    #[test]
    fn test_scrubs_email() {
        let text = "invited jane.doe@example.com to the portal";
        assert_eq!(scrub_phi(text), "invited [REDACTED] to the portal");
    }

    #[test]
    fn test_scrubs_phone() {
        let text = "called +1 (555) 123-4567 about results";
        assert_eq!(scrub_phi(text), "called [REDACTED] about results");
    }

    #[test]
    fn test_scrubs_multiple_patterns() {
        let text = "user a@b.co id 550e8400-e29b-41d4-a716-446655440000 tel 1234567";
        let scrubbed = scrub_phi(text);
        assert!(!scrubbed.contains("a@b.co"));
        assert!(!scrubbed.contains("550e8400"));
        assert!(!scrubbed.contains("1234567"));
        assert_eq!(scrubbed.matches("[REDACTED]").count(), 3);
    }

    #[test]
    fn test_plain_text_unchanged() {
        let text = "created consultation record";
        assert_eq!(scrub_phi(text), text);
    }

    #[test]
    fn test_scrub_is_idempotent() {
        let text = "login for doctor@clinic.example";
        let once = scrub_phi(text);
        assert_eq!(scrub_phi(&once), once);
    }
}

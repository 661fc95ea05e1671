// Validation helpers shared by request DTOs: phone format and best-effort
// numeric parsing of clinical display values.

use once_cell::sync::Lazy;
use regex::Regex;

/// Phone number validator
///
/// Accepts an optional leading +, digits, spaces, dashes, dots, and
/// parentheses; 6 to 30 characters overall.
pub struct PhoneValidator;

impl PhoneValidator {
    pub fn validate(phone: &str) -> bool {
        static PHONE_FORMAT: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^\+?[\d\s\-().]+$").unwrap());

        (6..=30).contains(&phone.len()) && PHONE_FORMAT.is_match(phone)
    }
}

/// Extract a best-effort numeric value from a clinical display string.
///
/// The first numeric run wins, so a blood pressure reading like "120/80"
/// yields the systolic 120.0 and "98.6 F" yields 98.6. Non-numeric values
/// ("positive", "trace") yield None, as does anything non-finite.
pub fn parse_numeric_value(value: &str) -> Option<f64> {
    static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(\.\d+)?").unwrap());

    let parsed: f64 = NUMBER_RE.find(value)?.as_str().parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_phone_numbers() {
        assert!(PhoneValidator::validate("+1234567890"));
        assert!(PhoneValidator::validate("+39 123 456 7890"));
        assert!(PhoneValidator::validate("(555) 123-4567"));
        assert!(PhoneValidator::validate("123456"));
    }

    #[test]
    fn test_invalid_phone_numbers() {
        assert!(!PhoneValidator::validate("12345")); // too short
        assert!(!PhoneValidator::validate(&"1".repeat(31))); // too long
        assert!(!PhoneValidator::validate("call me maybe"));
        assert!(!PhoneValidator::validate("555-HELP"));
    }

    #[test]
    fn test_parse_numeric_plain() {
        assert_eq!(parse_numeric_value("150"), Some(150.0));
        assert_eq!(parse_numeric_value("98.6"), Some(98.6));
        assert_eq!(parse_numeric_value("-2.5"), Some(-2.5));
    }

    #[test]
    fn test_parse_numeric_with_units() {
        assert_eq!(parse_numeric_value("72 bpm"), Some(72.0));
        assert_eq!(parse_numeric_value("80.5 kg"), Some(80.5));
    }

    #[test]
    fn test_parse_numeric_blood_pressure_takes_systolic() {
        assert_eq!(parse_numeric_value("120/80"), Some(120.0));
    }

    #[test]
    fn test_parse_numeric_non_numeric() {
        assert_eq!(parse_numeric_value("positive"), None);
        assert_eq!(parse_numeric_value("trace"), None);
        assert_eq!(parse_numeric_value(""), None);
    }
}

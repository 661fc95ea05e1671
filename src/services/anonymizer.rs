/*!
 * Anonymizer
 *
 * Transforms the structured clinical input before any external model call.
 * The output carries no direct identifiers: the patient id is replaced with
 * a throwaway session id, the exact age becomes a five-year band, and every
 * free-text symptom is normalized and stripped of names, emails, and phone
 * numbers. Numeric series and lab rows pass through unchanged.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::structured_input::{LabValue, StructuredInput};
use crate::utils::scrub::{EMAIL_RE, PHONE_RE};

/// Two consecutive Capitalized words, the usual shape of a written name
static NAME_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap());

/// Salutations and labels that often precede a name
static SALUTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(mr|mrs|ms|dr|patient|name)\b\.?:?").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// De-identified model input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizedInput {
    /// Fresh v4 id with no linkage to the patient
    pub session_id: Uuid,
    /// Five-year age band, or "unknown"
    pub age_band: String,
    pub bp_trend: Vec<f64>,
    pub glucose_trend: Vec<f64>,
    pub heart_rate_trend: Vec<f64>,
    pub weight_trend: Vec<f64>,
    pub recent_symptoms: Vec<String>,
    pub recent_lab_values: Vec<LabValue>,
}

/// Bucket an exact age into a five-year band
///
/// 37 becomes "35-39"; missing or negative ages become "unknown".
pub fn age_band(age: Option<i32>) -> String {
    match age {
        Some(age) if age >= 0 => {
            let low = (age / 5) * 5;
            format!("{}-{}", low, low + 4)
        }
        _ => "unknown".to_string(),
    }
}

/// Normalize one free-text symptom
///
/// Salutation labels go first so a leading "Mrs" is not mistaken for half a
/// name; name-shaped word pairs are redacted before lowercasing because the
/// pattern depends on capitalization. Phones and emails become placeholders
/// and whitespace is collapsed last.
pub fn normalize_symptom(symptom: &str) -> String {
    let text = SALUTATION_RE.replace_all(symptom.trim(), " ");
    let text = NAME_PAIR_RE.replace_all(&text, "[REDACTED]");
    let text = PHONE_RE.replace_all(&text, "[PHONE]");
    let text = EMAIL_RE.replace_all(&text, "[EMAIL]");

    let lowered = text.to_lowercase();
    let restored = lowered
        .replace("[redacted]", "[REDACTED]")
        .replace("[phone]", "[PHONE]")
        .replace("[email]", "[EMAIL]");

    WHITESPACE_RE.replace_all(&restored, " ").trim().to_string()
}

/// Anonymize a structured clinical input for an external model call
pub fn anonymize(input: &StructuredInput) -> AnonymizedInput {
    AnonymizedInput {
        session_id: Uuid::new_v4(),
        age_band: age_band(input.age),
        bp_trend: input.bp_trend.clone(),
        glucose_trend: input.glucose_trend.clone(),
        heart_rate_trend: input.heart_rate_trend.clone(),
        weight_trend: input.weight_trend.clone(),
        recent_symptoms: input
            .recent_symptoms
            .iter()
            .map(|s| normalize_symptom(s))
            .collect(),
        recent_lab_values: input.recent_lab_values.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_band_buckets() {
        assert_eq!(age_band(Some(0)), "0-4");
        assert_eq!(age_band(Some(4)), "0-4");
        assert_eq!(age_band(Some(5)), "5-9");
        assert_eq!(age_band(Some(37)), "35-39");
        assert_eq!(age_band(Some(80)), "80-84");
    }

    #[test]
    fn test_age_band_unknown() {
        assert_eq!(age_band(None), "unknown");
        assert_eq!(age_band(Some(-1)), "unknown");
    }

    #[test]
    fn test_age_band_lower_bound_divisible_by_five() {
        for age in 0..=120 {
            let band = age_band(Some(age));
            let low: i32 = band.split('-').next().unwrap().parse().unwrap();
            assert_eq!(low % 5, 0);
            assert!(low <= age && age <= low + 4);
        }
    }

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(normalize_symptom("  Severe HEADACHE  "), "severe headache");
    }

    #[test]
    fn test_normalize_redacts_name_pairs() {
        let out = normalize_symptom("John Smith reports chest pain");
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("john"));
        assert!(!out.contains("smith"));
        assert!(out.contains("chest pain"));
    }

    #[test]
    fn test_normalize_strips_salutations() {
        let out = normalize_symptom("Dr. says patient reports fatigue");
        assert!(!out.contains("dr"));
        assert!(!out.contains("patient"));
        assert!(out.contains("fatigue"));
    }

    #[test]
    fn test_normalize_replaces_phone_and_email() {
        let out = normalize_symptom("call 555-123-4567 or mail a@b.com about dizziness");
        assert!(out.contains("[PHONE]"));
        assert!(out.contains("[EMAIL]"));
        assert!(!out.contains("555"));
        assert!(!out.contains("a@b.com"));
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_symptom("short   of \t breath"), "short of breath");
    }

    #[test]
    fn test_anonymize_full_input() {
        let input = StructuredInput {
            age: Some(62),
            bp_trend: vec![165.0, 123.0, 121.0],
            glucose_trend: vec![],
            heart_rate_trend: vec![72.0],
            weight_trend: vec![],
            recent_symptoms: vec!["Mrs Jane Doe has chest pain, call 5551234567".to_string()],
            recent_lab_values: vec![],
        };

        let out = anonymize(&input);
        assert_eq!(out.age_band, "60-64");
        assert_eq!(out.bp_trend, input.bp_trend);

        let symptom = &out.recent_symptoms[0];
        assert!(!symptom.contains("jane"));
        assert!(!symptom.contains("doe"));
        assert!(!symptom.contains("5551234567"));
        assert!(symptom.contains("chest pain"));
    }

    #[test]
    fn test_fresh_session_id_each_call() {
        let input = StructuredInput {
            age: None,
            bp_trend: vec![],
            glucose_trend: vec![],
            heart_rate_trend: vec![],
            weight_trend: vec![],
            recent_symptoms: vec![],
            recent_lab_values: vec![],
        };
        assert_ne!(anonymize(&input).session_id, anonymize(&input).session_id);
    }
}

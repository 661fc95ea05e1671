/*!
 * Clinical Analytics Engine
 *
 * Pure, deterministic functions over vital-sign time series and lab
 * results: z-score anomaly detection, per-metric trends, reference-range
 * parsing, lab flagging, and the weighted composite risk score. No I/O
 * happens here; handlers fetch the rows and feed them in.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{LabResult, RiskFlags, VitalRecord, VitalType};

/// Default z-score threshold for anomaly detection
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

/// Symptom keywords that contribute to the risk score
pub static CONCERNING_SYMPTOM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(chest pain|dyspnea|fatigue|syncope|dizziness|palpitation|edema|blurred vision)",
    )
    .unwrap()
});

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A single anomalous point in a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub index: usize,
    pub value: f64,
    pub z: f64,
}

/// Detect anomalies in a numeric series by z-score
///
/// Returns every point whose |z| meets the threshold, with z rounded to two
/// decimals. Series shorter than three points, or with zero variance, yield
/// nothing: there is no meaningful baseline to deviate from.
pub fn detect_anomalies(series: &[f64], threshold: f64) -> Vec<Anomaly> {
    if series.len() < 3 {
        return Vec::new();
    }

    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return Vec::new();
    }

    series
        .iter()
        .enumerate()
        .filter_map(|(index, &value)| {
            let z = (value - mean) / std_dev;
            (z.abs() >= threshold).then(|| Anomaly {
                index,
                value,
                z: round2(z),
            })
        })
        .collect()
}

/// Z-score of the last point against the baseline of everything before it
///
/// Used for risk flags: the question is whether the latest measurement
/// deviates from the patient's own prior history. None when the baseline is
/// too short or flat.
pub fn latest_z_against_baseline(series: &[f64]) -> Option<f64> {
    let (latest, baseline) = series.split_last()?;
    if baseline.len() < 2 {
        return None;
    }

    let n = baseline.len() as f64;
    let mean = baseline.iter().sum::<f64>() / n;
    let variance = baseline.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return None;
    }

    Some(round2((latest - mean) / std_dev))
}

/// Trend for a single vital metric
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrend {
    pub metric: VitalType,
    pub points: Vec<f64>,
    pub latest: Option<f64>,
    pub delta: f64,
    pub anomalies: Vec<Anomaly>,
}

/// Per-metric trends over a patient's vitals
///
/// Vitals are filtered by type and sorted ascending by recording time;
/// points without a finite parsed value are skipped. `delta` is last minus
/// first (0 for a single point), rounded to two decimals.
pub fn compute_trends(vitals: &[VitalRecord], threshold: f64) -> Vec<MetricTrend> {
    VitalType::ALL
        .iter()
        .map(|&metric| {
            let mut records: Vec<&VitalRecord> = vitals
                .iter()
                .filter(|v| v.vital_type == metric)
                .collect();
            records.sort_by_key(|v| v.recorded_at);

            let points: Vec<f64> = records
                .iter()
                .filter_map(|v| v.numeric_value)
                .filter(|v| v.is_finite())
                .collect();

            let latest = points.last().copied();
            let delta = match (points.first(), points.last()) {
                (Some(first), Some(last)) => round2(last - first),
                _ => 0.0,
            };

            MetricTrend {
                metric,
                anomalies: detect_anomalies(&points, threshold),
                points,
                latest,
                delta,
            }
        })
        .collect()
}

/// Parsed reference range; None marks an unbounded side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl ReferenceRange {
    pub const UNBOUNDED: ReferenceRange = ReferenceRange {
        low: None,
        high: None,
    };
}

static RANGE_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*[-–]\s*(-?\d+(?:\.\d+)?)\s*$").unwrap()
});
static RANGE_UPPER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[<≤]\s*(-?\d+(?:\.\d+)?)\s*$").unwrap());
static RANGE_LOWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[>≥]\s*(-?\d+(?:\.\d+)?)\s*$").unwrap());

/// Parse a lab reference range
///
/// Accepts "A-B" (hyphen or en-dash, any surrounding whitespace),
/// "< A" / "≤ A", and "> A" / "≥ A". Anything else is unbounded on both
/// sides. Parsing is idempotent over its own output formats.
pub fn parse_reference_range(range: &str) -> ReferenceRange {
    if let Some(caps) = RANGE_PAIR_RE.captures(range) {
        let low: f64 = caps[1].parse().unwrap_or(f64::NAN);
        let high: f64 = caps[2].parse().unwrap_or(f64::NAN);
        if low.is_finite() && high.is_finite() {
            return ReferenceRange {
                low: Some(low),
                high: Some(high),
            };
        }
    }

    if let Some(caps) = RANGE_UPPER_RE.captures(range) {
        if let Ok(high) = caps[1].parse::<f64>() {
            return ReferenceRange {
                low: None,
                high: Some(high),
            };
        }
    }

    if let Some(caps) = RANGE_LOWER_RE.captures(range) {
        if let Ok(low) = caps[1].parse::<f64>() {
            return ReferenceRange {
                low: Some(low),
                high: None,
            };
        }
    }

    ReferenceRange::UNBOUNDED
}

/// Lab flag status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabStatus {
    High,
    Low,
    Normal,
    Unknown,
}

/// Flag a lab value against its parsed reference range
///
/// `unknown` when the value is non-numeric or the range is unparsable on
/// both sides.
pub fn flag_lab(numeric_value: Option<f64>, range: &ReferenceRange) -> LabStatus {
    let value = match numeric_value {
        Some(v) if v.is_finite() => v,
        _ => return LabStatus::Unknown,
    };

    if range.low.is_none() && range.high.is_none() {
        return LabStatus::Unknown;
    }

    if let Some(high) = range.high {
        if value > high {
            return LabStatus::High;
        }
    }
    if let Some(low) = range.low {
        if value < low {
            return LabStatus::Low;
        }
    }

    LabStatus::Normal
}

/// A lab result with its flag, for analytics responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedLab {
    pub id: uuid::Uuid,
    pub test_name: String,
    pub value: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub status: LabStatus,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Flag each lab result against its own reference range
pub fn flag_labs(labs: &[LabResult]) -> Vec<FlaggedLab> {
    labs.iter()
        .map(|lab| {
            let range = lab
                .reference_range
                .as_deref()
                .map(parse_reference_range)
                .unwrap_or(ReferenceRange::UNBOUNDED);

            FlaggedLab {
                id: lab.id,
                test_name: lab.test_name.clone(),
                value: lab.value.clone(),
                unit: lab.unit.clone(),
                reference_range: lab.reference_range.clone(),
                status: flag_lab(lab.numeric_value, &range),
                recorded_at: lab.recorded_at,
            }
        })
        .collect()
}

/// Risk tier derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=24 => RiskTier::Low,
            25..=49 => RiskTier::Moderate,
            50..=74 => RiskTier::High,
            _ => RiskTier::Critical,
        }
    }
}

/// One contributor to the composite risk score
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskContributor {
    pub source: &'static str,
    pub weight: f64,
    pub subscore: f64,
    pub detail: String,
}

/// Composite risk score with its contributors
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRisk {
    pub score: u32,
    pub tier: RiskTier,
    pub contributors: Vec<RiskContributor>,
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Compute the weighted composite risk score
///
/// Four sub-scores, each clamped to 0-100:
/// - vital anomalies (w=0.30): 20 points per anomalous reading
/// - AI risk flags (w=0.30): 25 points per active trend flag
/// - labs out of range (w=0.25): percentage of evaluated labs out of range
/// - concerning symptoms (w=0.15): 25 points per matched recent symptom
pub fn composite_risk(
    anomaly_count: usize,
    risk_flags: &RiskFlags,
    flagged_labs: &[FlaggedLab],
    recent_symptoms: &[String],
) -> CompositeRisk {
    let vital_subscore = clamp_score(anomaly_count as f64 * 20.0);

    let active_flags = risk_flags.active_count();
    let flag_subscore = clamp_score(active_flags as f64 * 25.0);

    let evaluated = flagged_labs
        .iter()
        .filter(|l| l.status != LabStatus::Unknown)
        .count();
    let out_of_range = flagged_labs
        .iter()
        .filter(|l| matches!(l.status, LabStatus::High | LabStatus::Low))
        .count();
    let lab_subscore = if evaluated == 0 {
        0.0
    } else {
        clamp_score((100.0 * out_of_range as f64 / evaluated as f64).round())
    };

    let symptom_matches = recent_symptoms
        .iter()
        .filter(|s| CONCERNING_SYMPTOM_RE.is_match(s))
        .count();
    let symptom_subscore = clamp_score(symptom_matches as f64 * 25.0);

    let contributors = vec![
        RiskContributor {
            source: "vital_anomalies",
            weight: 0.30,
            subscore: vital_subscore,
            detail: format!("{} anomalous vital reading(s)", anomaly_count),
        },
        RiskContributor {
            source: "ai_risk_flags",
            weight: 0.30,
            subscore: flag_subscore,
            detail: format!("{} active trend flag(s)", active_flags),
        },
        RiskContributor {
            source: "lab_out_of_range",
            weight: 0.25,
            subscore: lab_subscore,
            detail: format!("{} of {} evaluated lab(s) out of range", out_of_range, evaluated),
        },
        RiskContributor {
            source: "concerning_symptoms",
            weight: 0.15,
            subscore: symptom_subscore,
            detail: format!("{} concerning symptom(s) reported", symptom_matches),
        },
    ];

    let score = contributors
        .iter()
        .map(|c| c.weight * c.subscore)
        .sum::<f64>()
        .round() as u32;

    CompositeRisk {
        score,
        tier: RiskTier::from_score(score),
        contributors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn vital(vital_type: VitalType, numeric: f64, minutes_ago: i64) -> VitalRecord {
        VitalRecord {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            vital_type,
            value: numeric.to_string(),
            numeric_value: Some(numeric),
            unit: None,
            recorded_at: Utc::now() - Duration::minutes(minutes_ago),
            deleted_at: None,
        }
    }

    fn lab(numeric: Option<f64>, range: Option<&str>) -> LabResult {
        LabResult {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            test_name: "Test".to_string(),
            value: numeric.map(|n| n.to_string()).unwrap_or_else(|| "positive".to_string()),
            numeric_value: numeric,
            unit: None,
            reference_range: range.map(String::from),
            recorded_at: Utc::now(),
            deleted_at: None,
        }
    }

    // --- anomaly detection ---

    #[test]
    fn test_short_series_yields_nothing() {
        assert!(detect_anomalies(&[], 2.0).is_empty());
        assert!(detect_anomalies(&[1.0], 2.0).is_empty());
        assert!(detect_anomalies(&[1.0, 100.0], 2.0).is_empty());
    }

    #[test]
    fn test_flat_series_yields_nothing() {
        assert!(detect_anomalies(&[120.0, 120.0, 120.0, 120.0], 2.0).is_empty());
    }

    #[test]
    fn test_spike_detected() {
        let series = [120.0, 122.0, 121.0, 123.0, 165.0];
        let anomalies = detect_anomalies(&series, 2.0);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].index, 4);
        assert_eq!(anomalies[0].value, 165.0);
        assert!(anomalies[0].z >= 2.0);
    }

    #[test]
    fn test_all_returned_entries_meet_threshold() {
        let series = [10.0, 12.0, 11.0, 90.0, 9.0, 13.0, 85.0, 11.0];
        for anomaly in detect_anomalies(&series, 1.5) {
            assert!(anomaly.z.abs() >= 1.5);
        }
    }

    #[test]
    fn test_z_rounded_to_two_decimals() {
        let series = [1.0, 2.0, 3.0, 4.0, 100.0];
        for anomaly in detect_anomalies(&series, 1.0) {
            let scaled = anomaly.z * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_negative_spike_detected() {
        let series = [120.0, 118.0, 121.0, 119.0, 40.0];
        let anomalies = detect_anomalies(&series, 1.5);
        assert!(anomalies.iter().any(|a| a.z < 0.0));
    }

    // --- baseline z-score ---

    #[test]
    fn test_baseline_z_requires_history() {
        assert_eq!(latest_z_against_baseline(&[]), None);
        assert_eq!(latest_z_against_baseline(&[1.0, 2.0]), None);
        assert_eq!(latest_z_against_baseline(&[5.0, 5.0, 5.0, 9.0]), None);
    }

    #[test]
    fn test_baseline_z_detects_shift() {
        let z = latest_z_against_baseline(&[120.0, 122.0, 121.0, 123.0, 165.0]).unwrap();
        assert!(z > 2.0, "expected large positive z, got {}", z);
    }

    #[test]
    fn test_baseline_z_stable_latest() {
        let z = latest_z_against_baseline(&[120.0, 122.0, 118.0, 121.0]).unwrap();
        assert!(z.abs() < 2.0);
    }

    // --- trends ---

    #[test]
    fn test_trends_cover_all_metrics() {
        let trends = compute_trends(&[], DEFAULT_Z_THRESHOLD);
        assert_eq!(trends.len(), 4);
        for trend in &trends {
            assert!(trend.points.is_empty());
            assert_eq!(trend.delta, 0.0);
            assert_eq!(trend.latest, None);
        }
    }

    #[test]
    fn test_trend_sorted_ascending_and_delta() {
        // Inserted newest-first; the trend must sort ascending by time
        let vitals = vec![
            vital(VitalType::Bp, 165.0, 0),
            vital(VitalType::Bp, 123.0, 10),
            vital(VitalType::Bp, 121.0, 20),
            vital(VitalType::Bp, 122.0, 30),
            vital(VitalType::Bp, 120.0, 40),
        ];
        let trends = compute_trends(&vitals, DEFAULT_Z_THRESHOLD);
        let bp = trends.iter().find(|t| t.metric == VitalType::Bp).unwrap();

        assert_eq!(bp.points, vec![120.0, 122.0, 121.0, 123.0, 165.0]);
        assert_eq!(bp.latest, Some(165.0));
        assert_eq!(bp.delta, 45.0);
        assert!(!bp.anomalies.is_empty());
    }

    #[test]
    fn test_trend_single_point_delta_zero() {
        let vitals = vec![vital(VitalType::Weight, 80.0, 0)];
        let trends = compute_trends(&vitals, DEFAULT_Z_THRESHOLD);
        let weight = trends.iter().find(|t| t.metric == VitalType::Weight).unwrap();
        assert_eq!(weight.delta, 0.0);
        assert_eq!(weight.latest, Some(80.0));
    }

    #[test]
    fn test_trend_skips_unparsed_values() {
        let mut unparsed = vital(VitalType::Glucose, 0.0, 5);
        unparsed.numeric_value = None;
        let vitals = vec![unparsed, vital(VitalType::Glucose, 110.0, 0)];
        let trends = compute_trends(&vitals, DEFAULT_Z_THRESHOLD);
        let glucose = trends.iter().find(|t| t.metric == VitalType::Glucose).unwrap();
        assert_eq!(glucose.points, vec![110.0]);
    }

    // --- reference ranges ---

    #[test]
    fn test_parse_pair_range() {
        assert_eq!(
            parse_reference_range("70-100"),
            ReferenceRange { low: Some(70.0), high: Some(100.0) }
        );
        assert_eq!(
            parse_reference_range(" 3.5 – 5.1 "),
            ReferenceRange { low: Some(3.5), high: Some(5.1) }
        );
    }

    #[test]
    fn test_parse_bounded_above() {
        assert_eq!(
            parse_reference_range("< 200"),
            ReferenceRange { low: None, high: Some(200.0) }
        );
        assert_eq!(
            parse_reference_range("≤ 5.7"),
            ReferenceRange { low: None, high: Some(5.7) }
        );
    }

    #[test]
    fn test_parse_bounded_below() {
        assert_eq!(
            parse_reference_range("> 60"),
            ReferenceRange { low: Some(60.0), high: None }
        );
        assert_eq!(
            parse_reference_range("≥ 0.5"),
            ReferenceRange { low: Some(0.5), high: None }
        );
    }

    #[test]
    fn test_parse_garbage_is_unbounded() {
        assert_eq!(parse_reference_range("see notes"), ReferenceRange::UNBOUNDED);
        assert_eq!(parse_reference_range(""), ReferenceRange::UNBOUNDED);
        assert_eq!(parse_reference_range("negative"), ReferenceRange::UNBOUNDED);
    }

    // --- lab flagging ---

    #[test]
    fn test_flag_high_low_normal() {
        let range = parse_reference_range("70-100");
        assert_eq!(flag_lab(Some(150.0), &range), LabStatus::High);
        assert_eq!(flag_lab(Some(60.0), &range), LabStatus::Low);
        assert_eq!(flag_lab(Some(85.0), &range), LabStatus::Normal);
        assert_eq!(flag_lab(Some(100.0), &range), LabStatus::Normal);
        assert_eq!(flag_lab(Some(70.0), &range), LabStatus::Normal);
    }

    #[test]
    fn test_flag_unknown_cases() {
        let range = parse_reference_range("70-100");
        assert_eq!(flag_lab(None, &range), LabStatus::Unknown);
        assert_eq!(
            flag_lab(Some(85.0), &ReferenceRange::UNBOUNDED),
            LabStatus::Unknown
        );
    }

    #[test]
    fn test_flag_one_sided_ranges() {
        let upper = parse_reference_range("< 200");
        assert_eq!(flag_lab(Some(250.0), &upper), LabStatus::High);
        assert_eq!(flag_lab(Some(150.0), &upper), LabStatus::Normal);

        let lower = parse_reference_range("> 60");
        assert_eq!(flag_lab(Some(50.0), &lower), LabStatus::Low);
        assert_eq!(flag_lab(Some(70.0), &lower), LabStatus::Normal);
    }

    #[test]
    fn test_flag_labs_scenario() {
        let labs = vec![
            lab(Some(150.0), Some("70-100")),
            lab(Some(60.0), Some("70-100")),
            lab(None, Some("70-100")),
        ];
        let flagged = flag_labs(&labs);
        assert_eq!(flagged[0].status, LabStatus::High);
        assert_eq!(flagged[1].status, LabStatus::Low);
        assert_eq!(flagged[2].status, LabStatus::Unknown);
    }

    // --- composite risk ---

    #[test]
    fn test_risk_score_bounds() {
        // Everything maxed: all subscores clamp to 100, score stays at 100
        let flags = RiskFlags {
            high_blood_pressure_trend: true,
            rising_glucose_trend: true,
            tachycardia_trend: true,
            rapid_weight_change: true,
            ..RiskFlags::default()
        };
        let labs: Vec<FlaggedLab> = flag_labs(&[lab(Some(500.0), Some("70-100"))]);
        let symptoms: Vec<String> = (0..10).map(|_| "chest pain and dyspnea".to_string()).collect();

        let risk = composite_risk(20, &flags, &labs, &symptoms);
        assert_eq!(risk.score, 100);
        assert_eq!(risk.tier, RiskTier::Critical);
        for c in &risk.contributors {
            assert!(c.subscore <= 100.0);
        }
    }

    #[test]
    fn test_risk_score_zero() {
        let risk = composite_risk(0, &RiskFlags::default(), &[], &[]);
        assert_eq!(risk.score, 0);
        assert_eq!(risk.tier, RiskTier::Low);
    }

    #[test]
    fn test_risk_no_evaluated_labs_scores_zero_for_labs() {
        let labs = flag_labs(&[lab(None, Some("70-100"))]);
        let risk = composite_risk(0, &RiskFlags::default(), &labs, &[]);
        let lab_contrib = risk
            .contributors
            .iter()
            .find(|c| c.source == "lab_out_of_range")
            .unwrap();
        assert_eq!(lab_contrib.subscore, 0.0);
    }

    #[test]
    fn test_risk_weighted_sum() {
        // 1 anomaly (20 * 0.30 = 6) + 1 flag (25 * 0.30 = 7.5)
        // + 1/1 labs out (100 * 0.25 = 25) + 1 symptom (25 * 0.15 = 3.75)
        // = 42.25 -> 42
        let flags = RiskFlags {
            tachycardia_trend: true,
            ..RiskFlags::default()
        };
        let labs = flag_labs(&[lab(Some(150.0), Some("70-100"))]);
        let symptoms = vec!["occasional dizziness".to_string()];

        let risk = composite_risk(1, &flags, &labs, &symptoms);
        assert_eq!(risk.score, 42);
        assert_eq!(risk.tier, RiskTier::Moderate);
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(RiskTier::from_score(0), RiskTier::Low);
        assert_eq!(RiskTier::from_score(24), RiskTier::Low);
        assert_eq!(RiskTier::from_score(25), RiskTier::Moderate);
        assert_eq!(RiskTier::from_score(49), RiskTier::Moderate);
        assert_eq!(RiskTier::from_score(50), RiskTier::High);
        assert_eq!(RiskTier::from_score(74), RiskTier::High);
        assert_eq!(RiskTier::from_score(75), RiskTier::Critical);
        assert_eq!(RiskTier::from_score(100), RiskTier::Critical);
    }

    #[test]
    fn test_symptom_regex_case_insensitive() {
        assert!(CONCERNING_SYMPTOM_RE.is_match("Chest Pain at night"));
        assert!(CONCERNING_SYMPTOM_RE.is_match("BLURRED VISION"));
        assert!(!CONCERNING_SYMPTOM_RE.is_match("mild headache"));
    }

    #[test]
    fn test_contributors_reported_verbatim() {
        let risk = composite_risk(2, &RiskFlags::default(), &[], &[]);
        assert_eq!(risk.contributors.len(), 4);
        let vitals = &risk.contributors[0];
        assert_eq!(vitals.source, "vital_anomalies");
        assert_eq!(vitals.weight, 0.30);
        assert_eq!(vitals.subscore, 40.0);
        assert!(vitals.detail.contains("2"));
    }
}

//! Severity scoring: intake data to a numeric score and priority category.
//!
//! Scoring is a pure, total function. Missing or unparseable readings
//! contribute zero, unknown symptom ids are skipped, and no input can make
//! it fail, so it needs no synchronisation and may run fully in parallel
//! across patients.

use crate::catalog::SymptomCatalog;
use crate::intake::{IntakeRecord, VitalReading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_types::PatientId;

/// Score at or above which a patient is Critical.
pub const CRITICAL_THRESHOLD: u32 = 60;
/// Score at or above which a patient is Urgent (below [`CRITICAL_THRESHOLD`]).
pub const URGENT_THRESHOLD: u32 = 30;

/// Priority category derived from the severity score.
///
/// A closed enumeration: the bands partition the non-negative integers
/// with no gap or overlap, so every score maps to exactly one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityCategory {
    Critical,
    Urgent,
    NonUrgent,
}

impl PriorityCategory {
    /// Maps a severity score onto its category band.
    pub fn from_score(score: u32) -> Self {
        if score >= CRITICAL_THRESHOLD {
            Self::Critical
        } else if score >= URGENT_THRESHOLD {
            Self::Urgent
        } else {
            Self::NonUrgent
        }
    }

    /// Queue precedence; lower sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::Urgent => 1,
            Self::NonUrgent => 2,
        }
    }

    /// The wait-time label shown to staff for this band.
    pub fn estimated_wait(self) -> &'static str {
        match self {
            Self::Critical => "Immediate",
            Self::Urgent => "< 30 min",
            Self::NonUrgent => "< 2 hours",
        }
    }
}

impl std::fmt::Display for PriorityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Critical => "Critical",
            Self::Urgent => "Urgent",
            Self::NonUrgent => "Non-Urgent",
        };
        write!(f, "{label}")
    }
}

/// The scorer's output for one intake record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageResult {
    pub patient_id: PatientId,
    pub score: u32,
    pub category: PriorityCategory,
    /// True iff any selected symptom is flagged critical in the catalogue.
    /// An alerting signal, independent of the score.
    pub has_critical_symptom: bool,
    pub computed_at: DateTime<Utc>,
}

/// Scores an intake record against the catalogue.
///
/// Deterministic and side-effect free apart from a warning log for symptom
/// ids the catalogue does not know.
pub fn score(intake: &IntakeRecord, catalog: &SymptomCatalog) -> TriageResult {
    let mut symptom_score = 0u32;
    let mut has_critical_symptom = false;

    for id in &intake.selected_symptom_ids {
        match catalog.rule(id) {
            Some(rule) => {
                symptom_score += rule.points;
                has_critical_symptom |= rule.critical;
            }
            None => {
                tracing::warn!(symptom_id = %id, "ignoring symptom id not in catalogue");
            }
        }
    }

    let total = symptom_score + vital_score(&intake.vitals);

    TriageResult {
        patient_id: intake.patient_id.clone(),
        score: total,
        category: PriorityCategory::from_score(total),
        has_critical_symptom,
        computed_at: Utc::now(),
    }
}

/// Sums the per-channel vital breakpoints.
///
/// Channels are evaluated independently; a reading can only ever add
/// points, never subtract them.
pub fn vital_score(vitals: &VitalReading) -> u32 {
    let mut points = 0u32;

    if let Some(hr) = vitals.heart_rate {
        if hr > 120 || hr < 50 {
            points += 10;
        } else if hr > 100 || hr < 60 {
            points += 5;
        }
    }

    if let Some(temp) = vitals.temperature_f {
        if temp > 103.0 || temp < 95.0 {
            points += 8;
        } else if temp > 101.0 || temp < 97.0 {
            points += 4;
        }
    }

    if let Some(o2) = vitals.oxygen_saturation_pct {
        if o2 < 90 {
            points += 15;
        } else if o2 < 95 {
            points += 8;
        }
    }

    if let Some(pain) = vitals.pain_level {
        if pain >= 8 {
            points += 12;
        } else if pain >= 6 {
            points += 6;
        } else if pain >= 4 {
            points += 3;
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::PatientDetails;

    fn intake(symptoms: &[&str], vitals: VitalReading) -> IntakeRecord {
        IntakeRecord {
            patient_id: PatientId::new("patient_1").expect("valid id"),
            arrival: Utc::now(),
            details: PatientDetails::default(),
            chief_complaint: "test".into(),
            selected_symptom_ids: symptoms.iter().map(|s| s.to_string()).collect(),
            vitals,
            needs_isolation: false,
        }
    }

    #[test]
    fn empty_intake_scores_zero_non_urgent() {
        let catalog = SymptomCatalog::default_catalog();
        let result = score(&intake(&[], VitalReading::default()), &catalog);
        assert_eq!(result.score, 0);
        assert_eq!(result.category, PriorityCategory::NonUrgent);
        assert!(!result.has_critical_symptom);
    }

    #[test]
    fn chest_pain_with_tachycardia_is_urgent() {
        // chest_pain(25, critical) + dizziness(10) = 35; heart rate 130 adds
        // 10; the remaining vitals are in range.
        let catalog = SymptomCatalog::default_catalog();
        let vitals = VitalReading {
            heart_rate: Some(130),
            temperature_f: Some(98.6),
            oxygen_saturation_pct: Some(98),
            pain_level: Some(2),
            ..VitalReading::default()
        };
        let result = score(&intake(&["chest_pain", "dizziness"], vitals), &catalog);
        assert_eq!(result.score, 45);
        assert_eq!(result.category, PriorityCategory::Urgent);
        assert!(result.has_critical_symptom);
    }

    #[test]
    fn hypoxia_and_severe_pain_stay_below_urgent_band() {
        let catalog = SymptomCatalog::default_catalog();
        let vitals = VitalReading {
            oxygen_saturation_pct: Some(88),
            pain_level: Some(9),
            ..VitalReading::default()
        };
        let result = score(&intake(&[], vitals), &catalog);
        assert_eq!(result.score, 27);
        assert_eq!(result.category, PriorityCategory::NonUrgent);
    }

    #[test]
    fn category_bands_are_inclusive_on_lower_bounds() {
        assert_eq!(PriorityCategory::from_score(0), PriorityCategory::NonUrgent);
        assert_eq!(
            PriorityCategory::from_score(29),
            PriorityCategory::NonUrgent
        );
        assert_eq!(PriorityCategory::from_score(30), PriorityCategory::Urgent);
        assert_eq!(PriorityCategory::from_score(59), PriorityCategory::Urgent);
        assert_eq!(PriorityCategory::from_score(60), PriorityCategory::Critical);
        assert_eq!(
            PriorityCategory::from_score(250),
            PriorityCategory::Critical
        );
    }

    #[test]
    fn unknown_symptom_ids_are_ignored() {
        let catalog = SymptomCatalog::default_catalog();
        let result = score(&intake(&["not_a_symptom"], VitalReading::default()), &catalog);
        assert_eq!(result.score, 0);
        assert!(!result.has_critical_symptom);
    }

    #[test]
    fn adding_a_symptom_never_lowers_the_score() {
        let catalog = SymptomCatalog::default_catalog();
        let base = score(&intake(&["headache"], VitalReading::default()), &catalog);
        let more = score(
            &intake(&["headache", "nausea"], VitalReading::default()),
            &catalog,
        );
        assert!(more.score >= base.score);
    }

    #[test]
    fn critical_flag_is_independent_of_score() {
        // chest_pain alone: 25 points, below the urgent band, still flagged.
        let catalog = SymptomCatalog::default_catalog();
        let result = score(&intake(&["chest_pain"], VitalReading::default()), &catalog);
        assert_eq!(result.category, PriorityCategory::NonUrgent);
        assert!(result.has_critical_symptom);
    }

    #[test]
    fn out_of_range_readings_score_as_provided() {
        let catalog = SymptomCatalog::default_catalog();
        let vitals = VitalReading {
            heart_rate: Some(-5),
            pain_level: Some(42),
            ..VitalReading::default()
        };
        // -5 bpm hits the bradycardia breakpoint, pain 42 the >= 8 band.
        let result = score(&intake(&[], vitals), &catalog);
        assert_eq!(result.score, 22);
    }
}

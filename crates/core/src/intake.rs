//! Intake records: the immutable snapshot of a patient's presentation.
//!
//! An [`IntakeRecord`] is created once per arrival and never edited in
//! place. A re-triage produces a fresh record for the same patient id, so
//! the audit history of what was reported at each point in time survives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use triage_types::PatientId;

/// A set of vital-sign measurements taken at triage.
///
/// Every channel is optional: a missing reading simply contributes zero to
/// the severity score. Values are stored as reported, including readings
/// that are physiologically implausible; bounds checking belongs to the
/// intake form, not the scorer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    /// Heart rate in beats per minute.
    pub heart_rate: Option<i32>,
    /// Body temperature in degrees Fahrenheit.
    pub temperature_f: Option<f32>,
    /// Respiratory rate in breaths per minute.
    pub respiratory_rate: Option<i32>,
    /// Peripheral oxygen saturation as a percentage.
    pub oxygen_saturation_pct: Option<i32>,
    /// Self-reported pain on the 0-10 scale.
    pub pain_level: Option<i32>,
}

impl VitalReading {
    /// True when no channel has a reading.
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none()
            && self.temperature_f.is_none()
            && self.respiratory_rate.is_none()
            && self.oxygen_saturation_pct.is_none()
            && self.pain_level.is_none()
    }
}

/// Demographic and contact details captured on the intake form.
///
/// These are carried for display and the bed binding only; none of them
/// feed the severity score.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
}

impl PatientDetails {
    /// Full display name, or the patient id placeholder when both name
    /// fields are blank.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        name.trim().to_string()
    }
}

/// Immutable snapshot of a patient's reported symptoms and vitals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub patient_id: PatientId,
    /// When the patient arrived; also the FIFO tie-break in the queue.
    pub arrival: DateTime<Utc>,
    pub details: PatientDetails,
    pub chief_complaint: String,
    /// Ids into the symptom catalogue. Unknown ids are ignored at scoring.
    #[serde(default)]
    pub selected_symptom_ids: BTreeSet<String>,
    #[serde(default)]
    pub vitals: VitalReading,
    /// Capability tag: when set, only isolation beds are compatible.
    #[serde(default)]
    pub needs_isolation: bool,
}

impl IntakeRecord {
    /// Returns the name used for bed bindings, falling back to the patient
    /// id when the form carried no name.
    pub fn patient_name(&self) -> String {
        let name = self.details.display_name();
        if name.is_empty() {
            self.patient_id.to_string()
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vitals_report_as_empty() {
        assert!(VitalReading::default().is_empty());
        let reading = VitalReading {
            pain_level: Some(4),
            ..VitalReading::default()
        };
        assert!(!reading.is_empty());
    }

    #[test]
    fn patient_name_falls_back_to_id() {
        let record = IntakeRecord {
            patient_id: PatientId::new("patient_7").expect("valid id"),
            arrival: Utc::now(),
            details: PatientDetails::default(),
            chief_complaint: "dizzy".into(),
            selected_symptom_ids: BTreeSet::new(),
            vitals: VitalReading::default(),
            needs_isolation: false,
        };
        assert_eq!(record.patient_name(), "patient_7");
    }
}

//! Symptom scoring catalogue.
//!
//! The catalogue maps clinical findings to point values and criticality
//! flags. It is loaded once at process start (either the built-in default
//! set or a YAML file named in [`CoreConfig`](crate::CoreConfig)) and is
//! never mutated afterwards, so it can be shared freely across request
//! handlers without synchronisation.

use crate::{CoreResult, TriageError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A single weighted scoring rule for a clinical finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomRule {
    /// Stable identifier referenced by intake records (e.g. `chest_pain`).
    pub id: String,
    /// Human-readable name shown on the intake form.
    pub display_name: String,
    /// Points this finding contributes to the severity score.
    pub points: u32,
    /// Whether this finding alone warrants a critical-symptom alert.
    #[serde(default)]
    pub critical: bool,
}

/// Immutable id-keyed lookup over [`SymptomRule`]s.
#[derive(Clone, Debug)]
pub struct SymptomCatalog {
    rules: HashMap<String, SymptomRule>,
}

/// The scoring rules the system ships with.
///
/// Point values and criticality flags follow the standing triage protocol;
/// sites that need different weights provide a YAML catalogue instead.
const DEFAULT_RULES: &[(&str, &str, u32, bool)] = &[
    ("chest_pain", "Chest Pain", 25, true),
    ("shortness_breath", "Shortness of Breath", 20, true),
    ("unconscious", "Loss of Consciousness", 30, true),
    ("severe_bleeding", "Severe Bleeding", 25, true),
    ("head_trauma", "Head Trauma", 22, true),
    ("abdominal_pain", "Severe Abdominal Pain", 15, false),
    ("difficulty_breathing", "Difficulty Breathing", 18, false),
    ("high_fever", "High Fever (>103\u{b0}F)", 12, false),
    ("vomiting", "Persistent Vomiting", 8, false),
    ("dizziness", "Severe Dizziness", 10, false),
    ("allergic_reaction", "Allergic Reaction", 16, false),
    ("broken_bone", "Suspected Fracture", 12, false),
    ("minor_cut", "Minor Cut/Laceration", 3, false),
    ("mild_fever", "Mild Fever", 5, false),
    ("headache", "Headache", 4, false),
    ("nausea", "Nausea", 3, false),
];

impl SymptomCatalog {
    /// Builds a catalogue from a list of rules.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::CatalogLoad`] if two rules share an id or a
    /// rule has a blank id.
    pub fn from_rules(rules: Vec<SymptomRule>) -> CoreResult<Self> {
        let mut map = HashMap::with_capacity(rules.len());
        for rule in rules {
            if rule.id.trim().is_empty() {
                return Err(TriageError::CatalogLoad(
                    "symptom rule with empty id".into(),
                ));
            }
            if let Some(previous) = map.insert(rule.id.clone(), rule) {
                return Err(TriageError::CatalogLoad(format!(
                    "duplicate symptom id: {}",
                    previous.id
                )));
            }
        }
        Ok(Self { rules: map })
    }

    /// Parses a catalogue from YAML text (a sequence of rules).
    pub fn from_yaml(text: &str) -> CoreResult<Self> {
        let rules: Vec<SymptomRule> =
            serde_yaml::from_str(text).map_err(TriageError::CatalogParse)?;
        Self::from_rules(rules)
    }

    /// Loads a catalogue from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::FileRead`] if the file cannot be read, or the
    /// errors of [`SymptomCatalog::from_yaml`].
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(TriageError::FileRead)?;
        Self::from_yaml(&text)
    }

    /// Returns the built-in default catalogue.
    pub fn default_catalog() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|&(id, name, points, critical)| {
                (
                    id.to_string(),
                    SymptomRule {
                        id: id.to_string(),
                        display_name: name.to_string(),
                        points,
                        critical,
                    },
                )
            })
            .collect();
        Self { rules }
    }

    /// Looks up a rule by id.
    pub fn rule(&self, id: &str) -> Option<&SymptomRule> {
        self.rules.get(id)
    }

    /// Iterates over all rules in unspecified order.
    pub fn rules(&self) -> impl Iterator<Item = &SymptomRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_all_rules() {
        let catalog = SymptomCatalog::default_catalog();
        assert_eq!(catalog.len(), 16);
        let chest_pain = catalog.rule("chest_pain").expect("chest_pain present");
        assert_eq!(chest_pain.points, 25);
        assert!(chest_pain.critical);
        let nausea = catalog.rule("nausea").expect("nausea present");
        assert_eq!(nausea.points, 3);
        assert!(!nausea.critical);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let rules = vec![
            SymptomRule {
                id: "fever".into(),
                display_name: "Fever".into(),
                points: 5,
                critical: false,
            },
            SymptomRule {
                id: "fever".into(),
                display_name: "Fever (again)".into(),
                points: 8,
                critical: false,
            },
        ];
        let err = SymptomCatalog::from_rules(rules).expect_err("expected duplicate failure");
        assert!(matches!(err, TriageError::CatalogLoad(_)));
    }

    #[test]
    fn yaml_catalogue_parses() {
        let yaml = "
- id: chest_pain
  display_name: Chest Pain
  points: 25
  critical: true
- id: headache
  display_name: Headache
  points: 4
";
        let catalog = SymptomCatalog::from_yaml(yaml).expect("valid yaml");
        assert_eq!(catalog.len(), 2);
        assert!(catalog.rule("chest_pain").expect("present").critical);
        assert!(!catalog.rule("headache").expect("present").critical);
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = SymptomCatalog::from_yaml("{not: [valid").expect_err("expected parse failure");
        assert!(matches!(err, TriageError::CatalogParse(_)));
    }
}

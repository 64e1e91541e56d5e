//! Bed fleet state machine.
//!
//! Each bed moves between `available`, `occupied`, `maintenance` and
//! `cleaning` under the transition rules below. The binding invariant is
//! checked before any mutation: a bed is `occupied` if and only if it
//! holds a patient binding, and no transition can leave the bed in a
//! half-updated state.
//!
//! Transition rules:
//! - `available -> occupied` requires a patient binding.
//! - `occupied -> available | cleaning` clears the binding.
//! - `* -> maintenance` is always permitted; if the bed was occupied the
//!   displaced binding is returned to the caller for explicit
//!   reconciliation (an implicit discharge is flagged, never dropped).
//! - `cleaning -> available` and `maintenance -> available | cleaning`
//!   return the bed to service.
//! - `occupied -> occupied` is rejected: free the bed first.

use crate::error::{CoreResult, TriageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use triage_types::{BedNumber, PatientId};

/// The kind of care a bed supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BedType {
    Icu,
    Emergency,
    General,
    Isolation,
}

impl std::fmt::Display for BedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Icu => "icu",
            Self::Emergency => "emergency",
            Self::General => "general",
            Self::Isolation => "isolation",
        };
        write!(f, "{label}")
    }
}

/// Lifecycle state of a bed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BedStatus {
    Available,
    Occupied,
    Maintenance,
    Cleaning,
}

/// The patient currently bound to an occupied bed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedAssignment {
    pub patient_id: PatientId,
    pub patient_name: String,
}

/// A patient binding cleared by a forced `-> maintenance` transition.
///
/// The caller must reconcile this as a discharge or transfer; the engine
/// only reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplacedPatient {
    pub bed: BedNumber,
    pub patient_id: PatientId,
    pub patient_name: String,
}

/// A single bed and its current state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    pub number: BedNumber,
    pub bed_type: BedType,
    pub status: BedStatus,
    /// Ward location shown to staff (e.g. "Emergency Ward - Room 2").
    pub location: String,
    #[serde(default)]
    pub current_patient: Option<BedAssignment>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_discharge: Option<DateTime<Utc>>,
}

impl Bed {
    /// Provisions a bed in service.
    pub fn new(number: BedNumber, bed_type: BedType, location: impl Into<String>) -> Self {
        Self {
            number,
            bed_type,
            status: BedStatus::Available,
            location: location.into(),
            current_patient: None,
            assigned_at: None,
            estimated_discharge: None,
        }
    }

    /// Provisions a bed out of service.
    pub fn out_of_service(
        number: BedNumber,
        bed_type: BedType,
        location: impl Into<String>,
    ) -> Self {
        Self {
            status: BedStatus::Maintenance,
            ..Self::new(number, bed_type, location)
        }
    }

    /// `status == occupied` iff a patient is bound.
    pub fn invariant_holds(&self) -> bool {
        (self.status == BedStatus::Occupied) == self.current_patient.is_some()
    }

    /// Applies one state transition.
    ///
    /// All validation happens before any field changes, so a rejected
    /// transition leaves the bed untouched. Returns the displaced patient
    /// binding when a forced move to maintenance cleared an occupant.
    ///
    /// # Errors
    ///
    /// - [`TriageError::BedAlreadyOccupied`] for `occupied -> occupied`.
    /// - [`TriageError::MissingAssignmentData`] when moving to `occupied`
    ///   without a binding.
    /// - [`TriageError::Validation`] for moves to `occupied` from
    ///   `cleaning` or `maintenance`.
    pub fn transition(
        &mut self,
        to: BedStatus,
        assignment: Option<BedAssignment>,
        estimated_discharge: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<DisplacedPatient>> {
        match (self.status, to) {
            (BedStatus::Occupied, BedStatus::Occupied) => {
                return Err(TriageError::BedAlreadyOccupied);
            }
            (BedStatus::Available, BedStatus::Occupied) => {
                let assignment = assignment.ok_or(TriageError::MissingAssignmentData)?;
                self.status = BedStatus::Occupied;
                self.current_patient = Some(assignment);
                self.assigned_at = Some(now);
                self.estimated_discharge = estimated_discharge;
            }
            (_, BedStatus::Occupied) => {
                return Err(TriageError::Validation(format!(
                    "bed {} must be available before a patient can be assigned",
                    self.number
                )));
            }
            (_, BedStatus::Maintenance) => {
                let displaced = self.clear_binding();
                self.status = BedStatus::Maintenance;
                if let Some(displaced) = &displaced {
                    tracing::warn!(
                        bed = %displaced.bed,
                        patient_id = %displaced.patient_id,
                        "bed taken into maintenance while occupied; caller must reconcile discharge"
                    );
                }
                return Ok(displaced);
            }
            (_, BedStatus::Available) => {
                self.clear_binding();
                self.status = BedStatus::Available;
            }
            (_, BedStatus::Cleaning) => {
                self.clear_binding();
                self.status = BedStatus::Cleaning;
            }
        }

        debug_assert!(self.invariant_holds());
        Ok(None)
    }

    fn clear_binding(&mut self) -> Option<DisplacedPatient> {
        let displaced = self.current_patient.take().map(|a| DisplacedPatient {
            bed: self.number.clone(),
            patient_id: a.patient_id,
            patient_name: a.patient_name,
        });
        self.assigned_at = None;
        self.estimated_discharge = None;
        displaced
    }
}

/// Per-status bed counts for the fleet dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BedStats {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
    pub maintenance: usize,
    pub cleaning: usize,
}

/// The bed fleet, keyed by bed number.
///
/// Exclusively owns every status transition; callers go through
/// [`BedBoard::transition`] so the invariant check cannot be bypassed.
#[derive(Debug, Default)]
pub struct BedBoard {
    beds: BTreeMap<BedNumber, Bed>,
}

impl BedBoard {
    /// Builds a board from a provisioned fleet.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::Validation`] on duplicate bed numbers or a
    /// bed whose binding already violates the invariant.
    pub fn new(beds: Vec<Bed>) -> CoreResult<Self> {
        let mut map = BTreeMap::new();
        for bed in beds {
            if !bed.invariant_holds() {
                return Err(TriageError::Validation(format!(
                    "bed {} is occupied without a patient binding (or bound while not occupied)",
                    bed.number
                )));
            }
            if let Some(previous) = map.insert(bed.number.clone(), bed) {
                return Err(TriageError::Validation(format!(
                    "duplicate bed number: {}",
                    previous.number
                )));
            }
        }
        Ok(Self { beds: map })
    }

    pub fn get(&self, number: &BedNumber) -> Option<&Bed> {
        self.beds.get(number)
    }

    /// Applies a transition to one bed and returns its new state.
    pub fn transition(
        &mut self,
        number: &BedNumber,
        to: BedStatus,
        assignment: Option<BedAssignment>,
        estimated_discharge: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<(Bed, Option<DisplacedPatient>)> {
        let bed = self.beds.get_mut(number).ok_or(TriageError::BedNotFound)?;
        let displaced = bed.transition(to, assignment, estimated_discharge, now)?;
        Ok((bed.clone(), displaced))
    }

    /// The bed a patient currently occupies, if any.
    pub fn patient_bed(&self, patient_id: &PatientId) -> Option<&Bed> {
        self.beds.values().find(|b| {
            b.current_patient
                .as_ref()
                .is_some_and(|a| &a.patient_id == patient_id)
        })
    }

    /// Numbers of available beds of the given type, in fleet order.
    pub fn available_of_type(&self, bed_type: BedType) -> Vec<BedNumber> {
        self.beds
            .values()
            .filter(|b| b.bed_type == bed_type && b.status == BedStatus::Available)
            .map(|b| b.number.clone())
            .collect()
    }

    /// All beds in fleet order.
    pub fn to_list(&self) -> Vec<Bed> {
        self.beds.values().cloned().collect()
    }

    pub fn stats(&self) -> BedStats {
        let mut stats = BedStats {
            total: self.beds.len(),
            ..BedStats::default()
        };
        for bed in self.beds.values() {
            match bed.status {
                BedStatus::Available => stats.available += 1,
                BedStatus::Occupied => stats.occupied += 1,
                BedStatus::Maintenance => stats.maintenance += 1,
                BedStatus::Cleaning => stats.cleaning += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.beds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beds.is_empty()
    }
}

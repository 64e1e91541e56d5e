//! Dispatcher: pairs the queue head with an available bed.
//!
//! The dispatcher is a stateless coordinating function. It scans the
//! queue in priority order for the first patient compatible with the
//! requested bed type, occupies a bed, and removes the patient from the
//! queue. If no pairing exists it returns [`DispatchOutcome::NoMatch`]
//! without touching the queue or the bed set.

use crate::beds::{Bed, BedAssignment, BedBoard, BedStatus, BedType};
use crate::error::CoreResult;
use crate::queue::{PriorityQueue, QueueEntry};
use crate::scoring::{PriorityCategory, TriageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use triage_types::PatientId;

/// A queued patient bound to a bed.
#[derive(Clone, Debug, Serialize)]
pub struct Assignment {
    pub patient_id: PatientId,
    pub patient_name: String,
    pub result: TriageResult,
    /// Snapshot of the bed after the transition.
    pub bed: Bed,
}

/// Outcome of a dispatch attempt. `NoMatch` is a normal result, not an
/// error.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum DispatchOutcome {
    Assigned(Assignment),
    NoMatch,
}

/// Whether a patient's clinical needs fit a bed type.
///
/// Critical and Urgent patients take ICU or Emergency beds; Non-Urgent
/// patients take General beds. Isolation is a capability tag checked by
/// equality: isolation-tagged patients match only isolation beds, and
/// isolation beds accept only tagged patients.
pub fn compatible(category: PriorityCategory, needs_isolation: bool, bed_type: BedType) -> bool {
    if needs_isolation {
        return bed_type == BedType::Isolation;
    }
    match bed_type {
        BedType::Icu | BedType::Emergency => {
            matches!(
                category,
                PriorityCategory::Critical | PriorityCategory::Urgent
            )
        }
        BedType::General => category == PriorityCategory::NonUrgent,
        BedType::Isolation => false,
    }
}

/// Dispatches the highest-priority compatible patient to a bed of
/// `bed_type`.
///
/// All-or-nothing: the queue and the board are mutated only on the
/// success path, so a `NoMatch` return leaves both exactly as found.
pub fn dispatch_next(
    queue: &mut PriorityQueue,
    board: &mut BedBoard,
    bed_type: BedType,
    now: DateTime<Utc>,
) -> CoreResult<DispatchOutcome> {
    let candidate_beds = board.available_of_type(bed_type);
    if candidate_beds.is_empty() {
        return Ok(DispatchOutcome::NoMatch);
    }

    let Some(patient_id) = next_compatible(queue, bed_type) else {
        return Ok(DispatchOutcome::NoMatch);
    };

    let entry = match queue.iter().find(|e| e.patient_id == patient_id) {
        Some(entry) => entry,
        None => return Ok(DispatchOutcome::NoMatch),
    };
    let assignment = BedAssignment {
        patient_id: entry.patient_id.clone(),
        patient_name: entry.patient_name.clone(),
    };

    for number in candidate_beds {
        match board.transition(&number, BedStatus::Occupied, Some(assignment.clone()), None, now) {
            Ok((bed, _)) => {
                let entry: QueueEntry = queue.remove(&patient_id)?;
                tracing::info!(
                    patient_id = %entry.patient_id,
                    bed = %bed.number,
                    score = entry.result.score,
                    "dispatched patient to bed"
                );
                return Ok(DispatchOutcome::Assigned(Assignment {
                    patient_id: entry.patient_id,
                    patient_name: entry.patient_name,
                    result: entry.result,
                    bed,
                }));
            }
            // A bed can stop being available between the scan and the
            // attempt (another station won the race); try the next one.
            Err(_) => continue,
        }
    }

    Ok(DispatchOutcome::NoMatch)
}

fn next_compatible(queue: &PriorityQueue, bed_type: BedType) -> Option<PatientId> {
    queue
        .iter()
        .find(|e| compatible(e.result.category, e.needs_isolation, bed_type))
        .map(|e| e.patient_id.clone())
}

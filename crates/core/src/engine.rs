//! Engine facade tying scoring, the queue and the bed board together.
//!
//! [`TriageService`] is the boundary the API layer talks to. It owns the
//! queue and the bed fleet behind one mutex, so queue mutations are
//! serialised with dispatch reads and two stations can never both win the
//! same bed. Scoring runs before the lock is taken, and repository and
//! observer calls run after it is released, so a slow store or subscriber
//! never stalls the critical section.

use crate::beds::{Bed, BedAssignment, BedBoard, BedStats, BedStatus, BedType, DisplacedPatient};
use crate::catalog::SymptomCatalog;
use crate::dispatch::{self, DispatchOutcome};
use crate::error::{CoreResult, TriageError};
use crate::intake::IntakeRecord;
use crate::queue::{PriorityQueue, QueueEntry};
use crate::repository::TriageRepository;
use crate::scoring::{self, TriageResult};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use triage_types::{BedNumber, PatientId};

/// Authorization boundary for clinical operations.
///
/// Dispatch and bed transitions mutate shared clinical state; the caller's
/// role must be allowed by this policy first. The check is a pure
/// precondition: the engine never embeds role logic in scoring or
/// ordering.
pub trait AccessPolicy: Send + Sync {
    fn allows_clinical_ops(&self, role: &str) -> bool;
}

/// Default policy: the clinical staff roles from the staff directory.
#[derive(Default, Clone)]
pub struct StaffRolePolicy;

impl AccessPolicy for StaffRolePolicy {
    fn allows_clinical_ops(&self, role: &str) -> bool {
        matches!(
            role.trim().to_ascii_lowercase().as_str(),
            "admin" | "doctor" | "nurse"
        )
    }
}

/// Subscriber notified after every queue mutation.
pub trait QueueObserver: Send + Sync {
    fn queue_changed(&self, ordered: &[QueueEntry]);
}

/// Subscriber notified after every bed transition.
pub trait BedObserver: Send + Sync {
    fn bed_changed(&self, bed: &Bed);
}

/// Result of submitting or re-triaging an intake.
///
/// Scoring is total: malformed fields degrade to warnings here rather
/// than failing the submission, so the caller can display them alongside
/// the computed result.
#[derive(Clone, Debug)]
pub struct SubmitOutcome {
    pub result: TriageResult,
    pub warnings: Vec<String>,
}

/// Result of a manual bed transition.
#[derive(Clone, Debug)]
pub struct BedChange {
    pub bed: Bed,
    /// Set when a forced move to maintenance cleared an occupant; the
    /// caller must reconcile this as a discharge or transfer.
    pub displaced: Option<DisplacedPatient>,
}

struct EngineState {
    queue: PriorityQueue,
    board: BedBoard,
}

/// The triage engine.
pub struct TriageService {
    catalog: SymptomCatalog,
    state: Mutex<EngineState>,
    repository: Arc<dyn TriageRepository>,
    policy: Arc<dyn AccessPolicy>,
    queue_observers: Vec<Arc<dyn QueueObserver>>,
    bed_observers: Vec<Arc<dyn BedObserver>>,
}

impl TriageService {
    /// Builds the engine from the repository's persisted state.
    ///
    /// Pending intakes are re-scored against the current catalogue on
    /// load, so a catalogue change takes effect across a restart.
    ///
    /// # Errors
    ///
    /// Returns repository errors, or [`TriageError::Validation`] if the
    /// persisted fleet is malformed.
    pub fn new(
        catalog: SymptomCatalog,
        repository: Arc<dyn TriageRepository>,
        policy: Arc<dyn AccessPolicy>,
    ) -> CoreResult<Self> {
        let board = BedBoard::new(repository.load_beds()?)?;

        let mut queue = PriorityQueue::new();
        let mut pending = repository.load_pending_intakes()?;
        pending.sort_by_key(|i| i.arrival);
        for intake in &pending {
            let result = scoring::score(intake, &catalog);
            if let Err(e) = queue.enqueue(
                intake.patient_name(),
                result,
                intake.arrival,
                intake.needs_isolation,
            ) {
                tracing::warn!(
                    patient_id = %intake.patient_id,
                    error = %e,
                    "skipping pending intake that could not be re-queued"
                );
            }
        }

        tracing::info!(
            beds = board.len(),
            pending = queue.len(),
            "triage engine initialised"
        );

        Ok(Self {
            catalog,
            state: Mutex::new(EngineState { queue, board }),
            repository,
            policy,
            queue_observers: Vec::new(),
            bed_observers: Vec::new(),
        })
    }

    /// Registers a queue subscriber. Builder-style, used at startup.
    pub fn with_queue_observer(mut self, observer: Arc<dyn QueueObserver>) -> Self {
        self.queue_observers.push(observer);
        self
    }

    /// Registers a bed subscriber. Builder-style, used at startup.
    pub fn with_bed_observer(mut self, observer: Arc<dyn BedObserver>) -> Self {
        self.bed_observers.push(observer);
        self
    }

    pub fn catalog(&self) -> &SymptomCatalog {
        &self.catalog
    }

    /// Scores an intake and places the patient in the queue.
    ///
    /// Submitting a fresh record for a patient already queued is a
    /// re-triage: the entry is re-ranked in place (keeping its arrival
    /// position within its new band).
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::AlreadyAssigned`] when the patient already
    /// occupies a bed. A failing store does not fail the submission: the
    /// patient is queued and the persistence failure is reported as a
    /// warning.
    pub fn submit_intake(&self, intake: IntakeRecord) -> CoreResult<SubmitOutcome> {
        let mut warnings = validate_intake(&intake);
        let result = scoring::score(&intake, &self.catalog);

        let ordered = {
            let mut state = self.state();
            if state.queue.contains(&intake.patient_id) {
                state.queue.reorder(&intake.patient_id, result.clone())?;
            } else if state.board.patient_bed(&intake.patient_id).is_some() {
                return Err(TriageError::AlreadyAssigned);
            } else {
                state.queue.enqueue(
                    intake.patient_name(),
                    result.clone(),
                    intake.arrival,
                    intake.needs_isolation,
                )?;
            }
            state.queue.to_ordered_list()
        };

        warnings.extend(self.persist(self.repository.save_intake(&intake), "intake record"));
        warnings.extend(self.persist(
            self.repository.save_queue_snapshot(&ordered),
            "queue snapshot",
        ));
        self.notify_queue(&ordered);

        Ok(SubmitOutcome { result, warnings })
    }

    /// Re-scores a queued patient from a fresh intake record.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::AlreadyAssigned`] when the patient has left
    /// the queue (already dispatched); the queue is unchanged in that
    /// case.
    pub fn re_triage(&self, intake: IntakeRecord) -> CoreResult<SubmitOutcome> {
        let mut warnings = validate_intake(&intake);
        let result = scoring::score(&intake, &self.catalog);

        let ordered = {
            let mut state = self.state();
            state.queue.reorder(&intake.patient_id, result.clone())?;
            state.queue.to_ordered_list()
        };

        warnings.extend(self.persist(self.repository.save_intake(&intake), "intake record"));
        warnings.extend(self.persist(
            self.repository.save_queue_snapshot(&ordered),
            "queue snapshot",
        ));
        self.notify_queue(&ordered);

        Ok(SubmitOutcome { result, warnings })
    }

    /// Dispatches the highest-priority compatible patient to a bed of the
    /// requested type.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::Unauthorized`] when the role may not perform
    /// clinical operations. `NoMatch` is a normal outcome, not an error.
    pub fn request_dispatch(&self, role: &str, bed_type: BedType) -> CoreResult<DispatchOutcome> {
        self.authorize(role)?;

        let now = Utc::now();
        let (outcome, ordered) = {
            let mut guard = self.state();
            // Split the guard into plain field borrows so the queue and the
            // board can be handed to the dispatcher together.
            let state = &mut *guard;
            let outcome =
                dispatch::dispatch_next(&mut state.queue, &mut state.board, bed_type, now)?;
            (outcome, state.queue.to_ordered_list())
        };

        if let DispatchOutcome::Assigned(assignment) = &outcome {
            self.persist(self.repository.save_bed_state(&assignment.bed), "bed state");
            self.persist(
                self.repository.remove_pending_intake(&assignment.patient_id),
                "pending intake removal",
            );
            self.persist(
                self.repository.save_queue_snapshot(&ordered),
                "queue snapshot",
            );
            self.notify_queue(&ordered);
            self.notify_bed(&assignment.bed);
        }

        Ok(outcome)
    }

    /// Applies a manual bed transition (ward tooling, not dispatch).
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::Unauthorized`] for disallowed roles, and the
    /// bed state machine's errors otherwise.
    pub fn change_bed_status(
        &self,
        role: &str,
        number: &BedNumber,
        to: BedStatus,
        assignment: Option<BedAssignment>,
        estimated_discharge: Option<chrono::DateTime<Utc>>,
    ) -> CoreResult<BedChange> {
        self.authorize(role)?;

        let (bed, displaced) = {
            let mut state = self.state();
            state
                .board
                .transition(number, to, assignment, estimated_discharge, Utc::now())?
        };

        self.persist(self.repository.save_bed_state(&bed), "bed state");
        self.notify_bed(&bed);

        Ok(BedChange { bed, displaced })
    }

    /// Removes a patient from the queue without dispatching them (left
    /// without being seen, transferred elsewhere).
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::AlreadyAssigned`] if the patient is not
    /// queued; a second removal is a reported no-op.
    pub fn remove_patient(&self, role: &str, patient_id: &PatientId) -> CoreResult<QueueEntry> {
        self.authorize(role)?;

        let (entry, ordered) = {
            let mut state = self.state();
            let entry = state.queue.remove(patient_id)?;
            (entry, state.queue.to_ordered_list())
        };

        self.persist(
            self.repository.remove_pending_intake(patient_id),
            "pending intake removal",
        );
        self.persist(
            self.repository.save_queue_snapshot(&ordered),
            "queue snapshot",
        );
        self.notify_queue(&ordered);

        Ok(entry)
    }

    /// The queue in priority order.
    pub fn queue_snapshot(&self) -> Vec<QueueEntry> {
        self.state().queue.to_ordered_list()
    }

    /// The highest-priority pending patient, if any.
    pub fn peek(&self) -> Option<QueueEntry> {
        self.state().queue.peek().cloned()
    }

    /// The whole fleet in fleet order.
    pub fn beds(&self) -> Vec<Bed> {
        self.state().board.to_list()
    }

    pub fn bed_stats(&self) -> BedStats {
        self.state().board.stats()
    }

    fn authorize(&self, role: &str) -> CoreResult<()> {
        if self.policy.allows_clinical_ops(role) {
            Ok(())
        } else {
            tracing::warn!(role, "rejected clinical operation for unauthorised role");
            Err(TriageError::Unauthorized)
        }
    }

    /// Records the result of a store call made after the in-memory change
    /// was committed. The change is already visible and will be announced
    /// to observers, so a failing store degrades to a warning instead of
    /// reporting an applied mutation as failed.
    fn persist(&self, result: CoreResult<()>, what: &'static str) -> Option<String> {
        match result {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(error = %e, what, "failed to persist applied change");
                Some(format!("{what} could not be persisted: {e}"))
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_queue(&self, ordered: &[QueueEntry]) {
        for observer in &self.queue_observers {
            observer.queue_changed(ordered);
        }
    }

    fn notify_bed(&self, bed: &Bed) {
        for observer in &self.bed_observers {
            observer.bed_changed(bed);
        }
    }
}

/// Checks the fields the engine itself reads and reports anything the
/// scorer will treat as degraded input. Scoring still proceeds; these are
/// for display.
fn validate_intake(intake: &IntakeRecord) -> Vec<String> {
    let mut warnings = Vec::new();

    if intake.chief_complaint.trim().is_empty() {
        warnings.push("chief complaint is empty".to_string());
    }
    if let Some(age) = intake.details.age {
        if !(0..=130).contains(&age) {
            warnings.push(format!("age {age} is out of range"));
        }
    }
    if let Some(pain) = intake.vitals.pain_level {
        if !(0..=10).contains(&pain) {
            warnings.push(format!("pain level {pain} is outside the 0-10 scale"));
        }
    }
    if let Some(o2) = intake.vitals.oxygen_saturation_pct {
        if !(0..=100).contains(&o2) {
            warnings.push(format!("oxygen saturation {o2}% is outside 0-100"));
        }
    }

    warnings
}

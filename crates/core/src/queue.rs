//! Priority queue of pending patients.
//!
//! Entries are kept in a total order: category rank first, then higher
//! score, then earlier arrival, with a monotonic sequence number breaking
//! any remaining tie. The sequence number guarantees that no two distinct
//! entries ever compare equal, even for patients registered within the
//! same timestamp tick.

use crate::error::{CoreResult, TriageError};
use crate::scoring::TriageResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use triage_types::PatientId;

/// Ordering key for a queue entry.
///
/// Derived `Ord` over (rank, score descending, arrival, seq) gives exactly
/// the precedence rule: Critical before Urgent before Non-Urgent, higher
/// scores first within a band, FIFO within a band and score.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    rank: u8,
    score_desc: std::cmp::Reverse<u32>,
    arrival: DateTime<Utc>,
    seq: u64,
}

/// A patient waiting for a bed.
#[derive(Clone, Debug, Serialize)]
pub struct QueueEntry {
    pub patient_id: PatientId,
    /// Name used for the bed binding at dispatch time.
    pub patient_name: String,
    pub result: TriageResult,
    pub arrival: DateTime<Utc>,
    /// When set, the patient is only compatible with isolation beds.
    pub needs_isolation: bool,
    seq: u64,
}

impl QueueEntry {
    fn key(&self) -> QueueKey {
        QueueKey {
            rank: self.result.category.rank(),
            score_desc: std::cmp::Reverse(self.result.score),
            arrival: self.arrival,
            seq: self.seq,
        }
    }
}

/// Ordered collection of pending patients.
///
/// Owns the [`QueueEntry`] lifetime exclusively: a patient appears here
/// from triage until dispatch, at most once at a time.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    entries: BTreeMap<QueueKey, QueueEntry>,
    by_patient: HashMap<PatientId, QueueKey>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a patient to the queue.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::Validation`] if the patient is already
    /// queued; use [`PriorityQueue::reorder`] to apply a re-triage.
    pub fn enqueue(
        &mut self,
        patient_name: String,
        result: TriageResult,
        arrival: DateTime<Utc>,
        needs_isolation: bool,
    ) -> CoreResult<()> {
        if self.by_patient.contains_key(&result.patient_id) {
            return Err(TriageError::Validation(format!(
                "patient {} is already queued",
                result.patient_id
            )));
        }

        let entry = QueueEntry {
            patient_id: result.patient_id.clone(),
            patient_name,
            result,
            arrival,
            needs_isolation,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let key = entry.key();
        self.by_patient.insert(entry.patient_id.clone(), key.clone());
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Removes a patient, returning the entry they held.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::AlreadyAssigned`] if the patient is not in
    /// the queue (typically because they were already dispatched). A
    /// second removal is therefore a reported no-op, never a panic.
    pub fn remove(&mut self, patient_id: &PatientId) -> CoreResult<QueueEntry> {
        let key = self
            .by_patient
            .remove(patient_id)
            .ok_or(TriageError::AlreadyAssigned)?;
        // The two maps are updated together on every mutation.
        let entry = self
            .entries
            .remove(&key)
            .ok_or(TriageError::AlreadyAssigned)?;
        Ok(entry)
    }

    /// The highest-priority pending patient, if any.
    pub fn peek(&self) -> Option<&QueueEntry> {
        self.entries.values().next()
    }

    /// Re-ranks a queued patient with a fresh triage result.
    ///
    /// The entry keeps its original arrival time and sequence number, so a
    /// re-triage that does not change the score leaves the order intact
    /// (idempotent). The move happens under one `&mut self`, so readers
    /// never observe the entry half-moved.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::AlreadyAssigned`] if the patient has left
    /// the queue.
    pub fn reorder(&mut self, patient_id: &PatientId, new_result: TriageResult) -> CoreResult<()> {
        let mut entry = self.remove(patient_id)?;
        entry.result = new_result;

        let key = entry.key();
        self.by_patient.insert(entry.patient_id.clone(), key.clone());
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Whether the patient is currently queued.
    pub fn contains(&self, patient_id: &PatientId) -> bool {
        self.by_patient.contains_key(patient_id)
    }

    /// All entries in priority order.
    pub fn to_ordered_list(&self) -> Vec<QueueEntry> {
        self.entries.values().cloned().collect()
    }

    /// Iterates entries in priority order without cloning.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::PriorityCategory;
    use chrono::TimeZone;

    fn result(id: &str, score: u32) -> TriageResult {
        TriageResult {
            patient_id: PatientId::new(id).expect("valid id"),
            score,
            category: PriorityCategory::from_score(score),
            has_critical_symptom: false,
            computed_at: Utc::now(),
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 20, 14, minute, 0).unwrap()
    }

    fn queue_of(entries: &[(&str, u32, u32)]) -> PriorityQueue {
        let mut queue = PriorityQueue::new();
        for &(id, score, minute) in entries {
            queue
                .enqueue(id.to_string(), result(id, score), at(minute), false)
                .expect("enqueue");
        }
        queue
    }

    #[test]
    fn critical_patients_sort_before_urgent_regardless_of_arrival() {
        // P1 Urgent 50, P2 Critical 70, P3 Urgent 50 later: order P2, P1, P3.
        let queue = queue_of(&[("P1", 50, 0), ("P2", 70, 1), ("P3", 50, 2)]);
        let order: Vec<_> = queue.iter().map(|e| e.patient_id.as_str()).collect();
        assert_eq!(order, ["P2", "P1", "P3"]);
    }

    #[test]
    fn identical_score_and_arrival_breaks_ties_by_registration_order() {
        let queue = queue_of(&[("A", 40, 5), ("B", 40, 5)]);
        let order: Vec<_> = queue.iter().map(|e| e.patient_id.as_str()).collect();
        assert_eq!(order, ["A", "B"]);
    }

    #[test]
    fn higher_score_sorts_first_within_a_band() {
        let queue = queue_of(&[("low", 31, 0), ("high", 55, 9)]);
        assert_eq!(queue.peek().expect("non-empty").patient_id.as_str(), "high");
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let mut queue = queue_of(&[("P1", 40, 0)]);
        let err = queue
            .enqueue("P1".into(), result("P1", 45), at(1), false)
            .expect_err("expected duplicate rejection");
        assert!(matches!(err, TriageError::Validation(_)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn second_remove_reports_already_assigned() {
        let mut queue = queue_of(&[("P1", 40, 0)]);
        queue
            .remove(&PatientId::new("P1").unwrap())
            .expect("first removal succeeds");
        let err = queue
            .remove(&PatientId::new("P1").unwrap())
            .expect_err("second removal fails");
        assert!(matches!(err, TriageError::AlreadyAssigned));
        assert!(queue.is_empty());
    }

    #[test]
    fn reorder_moves_the_entry_and_keeps_arrival() {
        let mut queue = queue_of(&[("P1", 20, 0), ("P2", 40, 1)]);
        queue
            .reorder(&PatientId::new("P1").unwrap(), result("P1", 80))
            .expect("reorder");
        let order: Vec<_> = queue.iter().map(|e| e.patient_id.as_str()).collect();
        assert_eq!(order, ["P1", "P2"]);
        assert_eq!(queue.peek().expect("non-empty").arrival, at(0));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn reorder_with_same_result_leaves_order_unchanged() {
        let mut queue = queue_of(&[("P1", 40, 0), ("P2", 40, 1)]);
        queue
            .reorder(&PatientId::new("P1").unwrap(), result("P1", 40))
            .expect("reorder");
        let order: Vec<_> = queue.iter().map(|e| e.patient_id.as_str()).collect();
        assert_eq!(order, ["P1", "P2"]);
    }

    #[test]
    fn reorder_of_dispatched_patient_reports_already_assigned() {
        let mut queue = queue_of(&[("P1", 40, 0)]);
        queue.remove(&PatientId::new("P1").unwrap()).expect("remove");
        let err = queue
            .reorder(&PatientId::new("P1").unwrap(), result("P1", 80))
            .expect_err("expected failure");
        assert!(matches!(err, TriageError::AlreadyAssigned));
    }

    #[test]
    fn ordering_is_a_strict_total_order() {
        let queue = queue_of(&[("A", 40, 5), ("B", 40, 5), ("C", 70, 6), ("D", 10, 1)]);
        let entries = queue.to_ordered_list();
        for (i, a) in entries.iter().enumerate() {
            for b in entries.iter().skip(i + 1) {
                assert!(a.key() < b.key(), "entries must be strictly ordered");
            }
        }
    }
}

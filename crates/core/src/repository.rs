//! Persistence boundary for the triage engine.
//!
//! The engine never talks to a store directly; it goes through
//! [`TriageRepository`], so any durable backend can be substituted without
//! touching scoring or ordering logic. Two implementations ship here: a
//! JSON-file store for the server and an in-memory store for tests and
//! default boot.

use crate::beds::Bed;
use crate::error::{CoreResult, TriageError};
use crate::intake::IntakeRecord;
use crate::queue::QueueEntry;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use triage_types::PatientId;

/// Durable-store contract consumed by the engine.
///
/// Implementations must be safe to call from multiple request handlers;
/// the engine never holds its own lock across these calls, so a slow
/// store cannot stall queue or bed operations.
pub trait TriageRepository: Send + Sync {
    /// Loads the provisioned bed fleet.
    fn load_beds(&self) -> CoreResult<Vec<Bed>>;
    /// Persists one bed's state after a transition.
    fn save_bed_state(&self, bed: &Bed) -> CoreResult<()>;
    /// Loads intakes for patients still waiting for a bed.
    fn load_pending_intakes(&self) -> CoreResult<Vec<IntakeRecord>>;
    /// Persists an intake record (one per triage, keyed by patient).
    fn save_intake(&self, intake: &IntakeRecord) -> CoreResult<()>;
    /// Drops a pending intake once the patient has been dispatched or
    /// removed. Removing an unknown patient is a no-op.
    fn remove_pending_intake(&self, patient_id: &PatientId) -> CoreResult<()>;
    /// Persists the current queue ordering for display and audit.
    fn save_queue_snapshot(&self, entries: &[QueueEntry]) -> CoreResult<()>;
}

/// In-memory repository for tests and stores that boot empty.
#[derive(Default)]
pub struct InMemoryRepository {
    beds: Mutex<Vec<Bed>>,
    intakes: Mutex<BTreeMap<String, IntakeRecord>>,
    snapshot: Mutex<Vec<QueueEntry>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the store with a provisioned fleet.
    pub fn with_beds(beds: Vec<Bed>) -> Self {
        Self {
            beds: Mutex::new(beds),
            ..Self::default()
        }
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TriageRepository for InMemoryRepository {
    fn load_beds(&self) -> CoreResult<Vec<Bed>> {
        Ok(Self::lock(&self.beds).clone())
    }

    fn save_bed_state(&self, bed: &Bed) -> CoreResult<()> {
        let mut beds = Self::lock(&self.beds);
        match beds.iter_mut().find(|b| b.number == bed.number) {
            Some(existing) => *existing = bed.clone(),
            None => beds.push(bed.clone()),
        }
        Ok(())
    }

    fn load_pending_intakes(&self) -> CoreResult<Vec<IntakeRecord>> {
        Ok(Self::lock(&self.intakes).values().cloned().collect())
    }

    fn save_intake(&self, intake: &IntakeRecord) -> CoreResult<()> {
        Self::lock(&self.intakes).insert(intake.patient_id.to_string(), intake.clone());
        Ok(())
    }

    fn remove_pending_intake(&self, patient_id: &PatientId) -> CoreResult<()> {
        Self::lock(&self.intakes).remove(patient_id.as_str());
        Ok(())
    }

    fn save_queue_snapshot(&self, entries: &[QueueEntry]) -> CoreResult<()> {
        *Self::lock(&self.snapshot) = entries.to_vec();
        Ok(())
    }
}

/// JSON-file repository.
///
/// Layout under the data directory:
/// - `beds.json` — the whole fleet as one array.
/// - `intakes/<patient>.json` — one pending intake per file.
/// - `queue_snapshot.json` — the last persisted queue ordering.
///
/// Individual unparseable intake files are logged and skipped rather than
/// failing the whole load, matching how the engine treats degraded input
/// elsewhere.
pub struct JsonFileRepository {
    data_dir: PathBuf,
}

impl JsonFileRepository {
    /// Opens (and if needed creates) the data directory.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::FileWrite`] if the directories cannot be
    /// created.
    pub fn new(data_dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(data_dir.join("intakes")).map_err(TriageError::FileWrite)?;
        Ok(Self { data_dir })
    }

    /// Writes the full fleet. Used at provisioning time when `beds.json`
    /// does not exist yet.
    pub fn provision_beds(&self, beds: &[Bed]) -> CoreResult<()> {
        self.write_json(&self.beds_path(), beds)
    }

    /// Whether a fleet has been provisioned.
    pub fn has_beds(&self) -> bool {
        self.beds_path().is_file()
    }

    fn beds_path(&self) -> PathBuf {
        self.data_dir.join("beds.json")
    }

    fn intakes_dir(&self) -> PathBuf {
        self.data_dir.join("intakes")
    }

    fn intake_path(&self, patient_id: &PatientId) -> PathBuf {
        // Patient ids come from forms; keep the file name filesystem-safe.
        let safe: String = patient_id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.intakes_dir().join(format!("{safe}.json"))
    }

    fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("queue_snapshot.json")
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, path: &Path, value: &T) -> CoreResult<()> {
        let json = serde_json::to_string_pretty(value).map_err(TriageError::Serialization)?;
        fs::write(path, json).map_err(TriageError::FileWrite)
    }
}

impl TriageRepository for JsonFileRepository {
    fn load_beds(&self) -> CoreResult<Vec<Bed>> {
        let path = self.beds_path();
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path).map_err(TriageError::FileRead)?;
        serde_json::from_str(&text).map_err(TriageError::Deserialization)
    }

    fn save_bed_state(&self, bed: &Bed) -> CoreResult<()> {
        let mut beds = self.load_beds()?;
        match beds.iter_mut().find(|b| b.number == bed.number) {
            Some(existing) => *existing = bed.clone(),
            None => beds.push(bed.clone()),
        }
        self.write_json(&self.beds_path(), &beds)
    }

    fn load_pending_intakes(&self) -> CoreResult<Vec<IntakeRecord>> {
        let mut intakes = Vec::new();

        let entries = match fs::read_dir(self.intakes_dir()) {
            Ok(it) => it,
            Err(_) => return Ok(intakes),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read intake file");
                    continue;
                }
            };
            match serde_json::from_str::<IntakeRecord>(&text) {
                Ok(intake) => intakes.push(intake),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse intake file, skipping");
                }
            }
        }

        intakes.sort_by_key(|i| i.arrival);
        Ok(intakes)
    }

    fn save_intake(&self, intake: &IntakeRecord) -> CoreResult<()> {
        self.write_json(&self.intake_path(&intake.patient_id), intake)
    }

    fn remove_pending_intake(&self, patient_id: &PatientId) -> CoreResult<()> {
        match fs::remove_file(self.intake_path(patient_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TriageError::FileWrite(e)),
        }
    }

    fn save_queue_snapshot(&self, entries: &[QueueEntry]) -> CoreResult<()> {
        self.write_json(&self.snapshot_path(), &entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beds::{BedStatus, BedType};
    use crate::intake::{PatientDetails, VitalReading};
    use chrono::Utc;
    use triage_types::BedNumber;

    fn bed(number: &str) -> Bed {
        Bed::new(
            BedNumber::new(number).expect("valid number"),
            BedType::Emergency,
            "Emergency Ward",
        )
    }

    fn intake(id: &str) -> IntakeRecord {
        IntakeRecord {
            patient_id: PatientId::new(id).expect("valid id"),
            arrival: Utc::now(),
            details: PatientDetails::default(),
            chief_complaint: "test".into(),
            selected_symptom_ids: Default::default(),
            vitals: VitalReading::default(),
            needs_isolation: false,
        }
    }

    #[test]
    fn beds_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = JsonFileRepository::new(dir.path()).expect("repo");
        assert!(repo.load_beds().expect("empty load").is_empty());

        repo.provision_beds(&[bed("ER-001"), bed("ER-002")])
            .expect("provision");
        let mut er1 = bed("ER-001");
        er1.status = BedStatus::Cleaning;
        repo.save_bed_state(&er1).expect("save");

        let beds = repo.load_beds().expect("load");
        assert_eq!(beds.len(), 2);
        assert_eq!(beds[0].status, BedStatus::Cleaning);
        assert_eq!(beds[1].status, BedStatus::Available);
    }

    #[test]
    fn pending_intakes_survive_save_and_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = JsonFileRepository::new(dir.path()).expect("repo");

        repo.save_intake(&intake("patient_1")).expect("save 1");
        repo.save_intake(&intake("patient_2")).expect("save 2");
        assert_eq!(repo.load_pending_intakes().expect("load").len(), 2);

        repo.remove_pending_intake(&PatientId::new("patient_1").unwrap())
            .expect("remove");
        let remaining = repo.load_pending_intakes().expect("load");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].patient_id.as_str(), "patient_2");

        // Removing again is a no-op.
        repo.remove_pending_intake(&PatientId::new("patient_1").unwrap())
            .expect("second remove is fine");
    }

    #[test]
    fn unparseable_intake_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = JsonFileRepository::new(dir.path()).expect("repo");
        repo.save_intake(&intake("patient_1")).expect("save");
        fs::write(dir.path().join("intakes/garbage.json"), "{not json")
            .expect("write garbage");

        let intakes = repo.load_pending_intakes().expect("load tolerates garbage");
        assert_eq!(intakes.len(), 1);
    }

    #[test]
    fn snapshot_is_written_as_a_json_array() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = JsonFileRepository::new(dir.path()).expect("repo");
        repo.save_queue_snapshot(&[]).expect("save");

        let text = fs::read_to_string(dir.path().join("queue_snapshot.json")).expect("read");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse");
        assert!(value.is_array());
    }
}

//! # Triage Core
//!
//! Core business logic for the emergency-department triage system.
//!
//! This crate contains the domain rules and ordering guarantees:
//! - Weighted symptom/vital severity scoring with fixed category bands
//! - The priority queue of pending patients (category, score, arrival)
//! - The bed fleet state machine and its binding invariant
//! - The dispatcher pairing queue head with available beds
//!
//! **No API concerns**: authentication, HTTP servers, or wire formats
//! belong in `api-rest`. Persistence is delegated to an injected
//! [`TriageRepository`], and authorization to an injected
//! [`AccessPolicy`].

pub mod beds;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod engine;
mod error;
pub mod intake;
pub mod queue;
pub mod repository;
pub mod scoring;

pub use beds::{Bed, BedAssignment, BedBoard, BedStats, BedStatus, BedType, DisplacedPatient};
pub use catalog::{SymptomCatalog, SymptomRule};
pub use config::CoreConfig;
pub use dispatch::{Assignment, DispatchOutcome};
pub use engine::{
    AccessPolicy, BedChange, BedObserver, QueueObserver, StaffRolePolicy, SubmitOutcome,
    TriageService,
};
pub use error::{CoreResult, TriageError};
pub use intake::{IntakeRecord, PatientDetails, VitalReading};
pub use queue::{PriorityQueue, QueueEntry};
pub use repository::{InMemoryRepository, JsonFileRepository, TriageRepository};
pub use scoring::{score, PriorityCategory, TriageResult};
pub use triage_types::{BedNumber, PatientId};

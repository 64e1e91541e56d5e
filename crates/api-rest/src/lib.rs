//! # API REST
//!
//! REST API implementation for the triage engine.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON wire shapes, CORS, role header)
//!
//! The wire shapes use camelCase keys to match the intake and ward
//! clients. Authorization is a pass-through: the role from the `x-role`
//! header is handed to the core engine, which consults its access policy.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use triage_core::{
    Bed, BedAssignment, BedNumber, BedStats, BedStatus, BedType, DispatchOutcome, IntakeRecord,
    PatientDetails, PatientId, QueueEntry, TriageError, TriageService, VitalReading,
};
use utoipa::{OpenApi, ToSchema};

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TriageService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        submit_patient,
        get_queue,
        request_dispatch,
        list_beds,
        bed_stats,
        change_bed_status,
        remove_patient
    ),
    components(schemas(
        IntakeRequest,
        VitalsRequest,
        DispatchRequest,
        BedStatusRequest
    ))
)]
pub struct ApiDoc;

/// Builds the REST router for the given engine.
pub fn router(service: Arc<TriageService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", post(submit_patient))
        .route("/queue", get(get_queue))
        .route("/queue/:patient_id", delete(remove_patient))
        .route("/dispatch", post(request_dispatch))
        .route("/beds", get(list_beds))
        .route("/beds/stats", get(bed_stats))
        .route("/beds/:number/status", post(change_bed_status))
        .layer(CorsLayer::permissive())
        .with_state(AppState { service })
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct VitalsRequest {
    pub heart_rate: Option<i32>,
    pub temperature: Option<f32>,
    pub respiratory_rate: Option<i32>,
    pub oxygen_saturation: Option<i32>,
    pub pain_level: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    /// Omitted on first contact; the server generates one.
    #[serde(default)]
    pub patient_id: Option<String>,
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
    pub chief_complaint: String,
    #[serde(default)]
    pub selected_symptoms: Vec<String>,
    #[serde(default)]
    pub vitals: VitalsRequest,
    #[serde(default)]
    pub needs_isolation: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    /// One of `icu`, `emergency`, `general`, `isolation`.
    #[schema(value_type = String)]
    pub bed_type: BedType,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BedStatusRequest {
    /// One of `available`, `occupied`, `maintenance`, `cleaning`.
    #[schema(value_type = String)]
    pub status: BedStatus,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub estimated_discharge: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TriageResponse {
    id: String,
    severity_score: u32,
    priority: String,
    has_critical_symptom: bool,
    estimated_wait_time: String,
    computed_at: DateTime<Utc>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueItemResponse {
    patient_id: String,
    patient_name: String,
    score: u32,
    priority: String,
    has_critical_symptom: bool,
    arrival_time: DateTime<Utc>,
    estimated_wait_time: String,
    needs_isolation: bool,
}

impl From<&QueueEntry> for QueueItemResponse {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            patient_id: entry.patient_id.to_string(),
            patient_name: entry.patient_name.clone(),
            score: entry.result.score,
            priority: entry.result.category.to_string(),
            has_critical_symptom: entry.result.has_critical_symptom,
            arrival_time: entry.arrival,
            estimated_wait_time: entry.result.category.estimated_wait().to_string(),
            needs_isolation: entry.needs_isolation,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BedResponse {
    number: String,
    #[serde(rename = "type")]
    bed_type: BedType,
    status: BedStatus,
    location: String,
    patient_id: Option<String>,
    patient_name: Option<String>,
    assigned_at: Option<DateTime<Utc>>,
    estimated_discharge: Option<DateTime<Utc>>,
}

impl From<&Bed> for BedResponse {
    fn from(bed: &Bed) -> Self {
        Self {
            number: bed.number.to_string(),
            bed_type: bed.bed_type,
            status: bed.status,
            location: bed.location.clone(),
            patient_id: bed
                .current_patient
                .as_ref()
                .map(|a| a.patient_id.to_string()),
            patient_name: bed.current_patient.as_ref().map(|a| a.patient_name.clone()),
            assigned_at: bed.assigned_at,
            estimated_discharge: bed.estimated_discharge,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
enum DispatchResponse {
    #[serde(rename_all = "camelCase")]
    Assigned {
        patient_id: String,
        patient_name: String,
        severity_score: u32,
        priority: String,
        bed: BedResponse,
    },
    NoMatch,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisplacedResponse {
    patient_id: String,
    patient_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BedChangeResponse {
    bed: BedResponse,
    /// Present when a forced maintenance move cleared an occupant; the
    /// ward client must reconcile the discharge.
    displaced: Option<DisplacedResponse>,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Wire-level error. Each core error kind keeps its identity so the
/// client can display the specific cause rather than a generic failure.
struct ApiError(TriageError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            TriageError::Unauthorized => StatusCode::FORBIDDEN,
            TriageError::BedNotFound => StatusCode::NOT_FOUND,
            TriageError::AlreadyAssigned | TriageError::BedAlreadyOccupied => StatusCode::CONFLICT,
            TriageError::MissingAssignmentData | TriageError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match &self.0 {
            TriageError::Validation(_) => "validation",
            TriageError::AlreadyAssigned => "already-assigned",
            TriageError::BedAlreadyOccupied => "bed-already-occupied",
            TriageError::MissingAssignmentData => "missing-assignment-data",
            TriageError::BedNotFound => "bed-not-found",
            TriageError::Unauthorized => "unauthorized",
            _ => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.kind(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<TriageError> for ApiError {
    fn from(e: TriageError) -> Self {
        Self(e)
    }
}

fn role_header(headers: &HeaderMap) -> &str {
    headers
        .get("x-role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = IntakeRequest,
    responses(
        (status = 200, description = "Triage result for the submitted intake"),
        (status = 409, description = "Patient already occupies a bed"),
        (status = 422, description = "Intake could not be interpreted")
    )
)]
async fn submit_patient(
    State(state): State<AppState>,
    Json(request): Json<IntakeRequest>,
) -> Result<Json<TriageResponse>, ApiError> {
    let intake = intake_from_request(request)?;
    let outcome = state.service.submit_intake(intake)?;

    Ok(Json(TriageResponse {
        id: outcome.result.patient_id.to_string(),
        severity_score: outcome.result.score,
        priority: outcome.result.category.to_string(),
        has_critical_symptom: outcome.result.has_critical_symptom,
        estimated_wait_time: outcome.result.category.estimated_wait().to_string(),
        computed_at: outcome.result.computed_at,
        warnings: outcome.warnings,
    }))
}

#[utoipa::path(get, path = "/queue", responses((status = 200, description = "Queue in priority order")))]
async fn get_queue(State(state): State<AppState>) -> Json<Vec<QueueItemResponse>> {
    let queue = state.service.queue_snapshot();
    Json(queue.iter().map(QueueItemResponse::from).collect())
}

#[utoipa::path(
    delete,
    path = "/queue/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient to remove")),
    responses(
        (status = 200, description = "Patient removed from the queue"),
        (status = 403, description = "Role not authorised for clinical operations"),
        (status = 409, description = "Patient is no longer queued")
    )
)]
async fn remove_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<QueueItemResponse>, ApiError> {
    let patient_id =
        PatientId::new(&patient_id).map_err(|e| TriageError::Validation(e.to_string()))?;
    let entry = state
        .service
        .remove_patient(role_header(&headers), &patient_id)?;
    Ok(Json(QueueItemResponse::from(&entry)))
}

#[utoipa::path(
    post,
    path = "/dispatch",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Assignment or no-match"),
        (status = 403, description = "Role not authorised for clinical operations")
    )
)]
async fn request_dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let outcome = state
        .service
        .request_dispatch(role_header(&headers), request.bed_type)?;

    let response = match outcome {
        DispatchOutcome::Assigned(a) => DispatchResponse::Assigned {
            patient_id: a.patient_id.to_string(),
            patient_name: a.patient_name,
            severity_score: a.result.score,
            priority: a.result.category.to_string(),
            bed: BedResponse::from(&a.bed),
        },
        DispatchOutcome::NoMatch => DispatchResponse::NoMatch,
    };
    Ok(Json(response))
}

#[utoipa::path(get, path = "/beds", responses((status = 200, description = "The bed fleet")))]
async fn list_beds(State(state): State<AppState>) -> Json<Vec<BedResponse>> {
    let beds = state.service.beds();
    Json(beds.iter().map(BedResponse::from).collect())
}

#[utoipa::path(get, path = "/beds/stats", responses((status = 200, description = "Per-status bed counts")))]
async fn bed_stats(State(state): State<AppState>) -> Json<BedStats> {
    Json(state.service.bed_stats())
}

#[utoipa::path(
    post,
    path = "/beds/{number}/status",
    request_body = BedStatusRequest,
    params(("number" = String, Path, description = "Bed number, e.g. ER-002")),
    responses(
        (status = 200, description = "Bed after the transition"),
        (status = 403, description = "Role not authorised for clinical operations"),
        (status = 404, description = "No bed with that number"),
        (status = 409, description = "Bed already occupied"),
        (status = 422, description = "Transition rejected")
    )
)]
async fn change_bed_status(
    State(state): State<AppState>,
    Path(number): Path<String>,
    headers: HeaderMap,
    Json(request): Json<BedStatusRequest>,
) -> Result<Json<BedChangeResponse>, ApiError> {
    let number = BedNumber::new(&number).map_err(|e| TriageError::Validation(e.to_string()))?;

    let assignment = match (request.patient_id, request.patient_name) {
        (Some(id), Some(name)) => Some(BedAssignment {
            patient_id: PatientId::new(&id).map_err(|e| TriageError::Validation(e.to_string()))?,
            patient_name: name,
        }),
        _ => None,
    };

    let change = state.service.change_bed_status(
        role_header(&headers),
        &number,
        request.status,
        assignment,
        request.estimated_discharge,
    )?;

    Ok(Json(BedChangeResponse {
        bed: BedResponse::from(&change.bed),
        displaced: change.displaced.map(|d| DisplacedResponse {
            patient_id: d.patient_id.to_string(),
            patient_name: d.patient_name,
        }),
    }))
}

fn intake_from_request(request: IntakeRequest) -> Result<IntakeRecord, TriageError> {
    let patient_id = match request.patient_id {
        Some(id) => PatientId::new(&id).map_err(|e| TriageError::Validation(e.to_string()))?,
        None => {
            let generated = format!("patient_{}", uuid::Uuid::new_v4().simple());
            PatientId::new(&generated).map_err(|e| TriageError::Validation(e.to_string()))?
        }
    };

    Ok(IntakeRecord {
        patient_id,
        arrival: Utc::now(),
        details: PatientDetails {
            first_name: request.first_name,
            last_name: request.last_name,
            age: request.age,
            gender: request.gender,
            phone: request.phone,
            emergency_contact: request.emergency_contact,
        },
        chief_complaint: request.chief_complaint,
        selected_symptom_ids: request.selected_symptoms.into_iter().collect::<BTreeSet<_>>(),
        vitals: VitalReading {
            heart_rate: request.vitals.heart_rate,
            temperature_f: request.vitals.temperature,
            respiratory_rate: request.vitals.respiratory_rate,
            oxygen_saturation_pct: request.vitals.oxygen_saturation,
            pain_level: request.vitals.pain_level,
        },
        needs_isolation: request.needs_isolation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use triage_core::{InMemoryRepository, StaffRolePolicy, SymptomCatalog};

    fn test_router() -> Router {
        let beds = vec![
            Bed::new(
                BedNumber::new("ER-001").unwrap(),
                BedType::Emergency,
                "Emergency Ward - Room 1",
            ),
            Bed::new(
                BedNumber::new("GEN-001").unwrap(),
                BedType::General,
                "General Ward - Room 1",
            ),
        ];
        let service = TriageService::new(
            SymptomCatalog::default_catalog(),
            Arc::new(InMemoryRepository::with_beds(beds)),
            Arc::new(StaffRolePolicy),
        )
        .expect("service");
        router(Arc::new(service))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post_json(uri: &str, role: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(role) = role {
            builder = builder.header("x-role", role);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_returns_the_triage_result() {
        let request = post_json(
            "/patients",
            None,
            serde_json::json!({
                "firstName": "Sarah",
                "lastName": "Johnson",
                "chiefComplaint": "chest pain",
                "selectedSymptoms": ["chest_pain", "dizziness"],
                "vitals": { "heartRate": 130, "temperature": 98.6, "oxygenSaturation": 98, "painLevel": 2 }
            }),
        );
        let response = test_router().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["severityScore"], 45);
        assert_eq!(body["priority"], "Urgent");
        assert_eq!(body["hasCriticalSymptom"], true);
        assert_eq!(body["estimatedWaitTime"], "< 30 min");
    }

    #[tokio::test]
    async fn dispatch_without_a_clinical_role_is_forbidden() {
        let request = post_json("/dispatch", None, serde_json::json!({ "bedType": "emergency" }));
        let response = test_router().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn dispatch_on_an_empty_queue_is_a_no_match() {
        let request = post_json(
            "/dispatch",
            Some("nurse"),
            serde_json::json!({ "bedType": "emergency" }),
        );
        let response = test_router().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["outcome"], "no-match");
    }

    #[tokio::test]
    async fn occupying_a_bed_without_payload_is_unprocessable() {
        let request = post_json(
            "/beds/ER-001/status",
            Some("nurse"),
            serde_json::json!({ "status": "occupied" }),
        );
        let response = test_router().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["error"], "missing-assignment-data");
    }
}

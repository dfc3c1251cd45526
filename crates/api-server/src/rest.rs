//! REST API handlers for treatment recommendations and operational endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use surgirec_core::error::RecommenderError;
use surgirec_core::lookup::PolicyLookup;
use surgirec_core::types::{Decision, Feature, PatientProfile};
use surgirec_policy::PolicyEngine;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PolicyEngine>,
    pub node_id: String,
    pub start_time: Instant,
}

/// POST /v1/recommend — Recommend a treatment for a patient profile.
#[utoipa::path(
    post,
    path = "/v1/recommend",
    tag = "Recommendation",
    request_body = PatientProfile,
    responses(
        (status = 200, description = "Recommended treatment", body = RecommendResponse),
        (status = 400, description = "Malformed patient profile or intake values outside the accepted ranges", body = ErrorResponse),
        (status = 422, description = "Discretized state not covered by the policy table", body = ErrorResponse),
    )
)]
pub async fn handle_recommend(
    State(state): State<AppState>,
    payload: Result<Json<PatientProfile>, JsonRejection>,
) -> Result<Json<RecommendResponse>, (StatusCode, Json<ErrorResponse>)> {
    metrics::counter!("recommend.requests").increment(1);
    let request_id = Uuid::new_v4();

    let profile = match payload {
        Ok(Json(profile)) => profile,
        Err(rejection) => {
            let msg = rejection.body_text();
            warn!(request_id = %request_id, error = %msg, "Patient profile could not be parsed");
            metrics::counter!("recommend.validation_errors").increment(1);
            return Err(invalid_profile(msg));
        }
    };

    match state.engine.recommend(&profile) {
        Ok(decision) => {
            metrics::counter!("recommend.decisions", "action" => decision.action.clone())
                .increment(1);
            info!(
                request_id = %request_id,
                state = %decision.state,
                action = %decision.action,
                "Recommendation served"
            );
            Ok(Json(RecommendResponse::new(request_id, decision)))
        }
        Err(RecommenderError::Validation(msg)) => {
            warn!(request_id = %request_id, error = %msg, "Patient profile validation failed");
            metrics::counter!("recommend.validation_errors").increment(1);
            Err(invalid_profile(msg))
        }
        Err(RecommenderError::Lookup(e)) => {
            warn!(request_id = %request_id, error = %e, "Discretized state outside policy table");
            metrics::counter!("recommend.invalid_state").increment(1);
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: "invalid_state".to_string(),
                    message: format!(
                        "Invalid state: {}. Please adjust input values.",
                        e.state()
                    ),
                    state: Some(e.state().as_slice().to_vec()),
                }),
            ))
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Recommendation failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "recommendation_failed".to_string(),
                    message: "Internal processing error".to_string(),
                    state: None,
                }),
            ))
        }
    }
}

fn invalid_profile(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "invalid_patient_profile".to_string(),
            message,
            state: None,
        }),
    )
}

/// GET /v1/policy — Describe the loaded policy table and bin thresholds.
#[utoipa::path(
    get,
    path = "/v1/policy",
    tag = "Recommendation",
    responses(
        (status = 200, description = "Loaded policy table", body = PolicyInfoResponse),
    )
)]
pub async fn handle_policy_info(State(state): State<AppState>) -> Json<PolicyInfoResponse> {
    Json(PolicyInfoResponse::new(&state.engine))
}

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses(
        (status = 200, description = "Service health", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe.
/// The router only exists once the policy table has loaded, so this is always 200.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to serve recommendations"),
    )
)]
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live — Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses(
        (status = 200, description = "Process is alive"),
    )
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize, ToSchema)]
pub struct ActionValue {
    pub action: String,
    pub value: f64,
}

#[derive(Serialize, ToSchema)]
pub struct RecommendResponse {
    pub request_id: Uuid,
    pub recommended_action: String,
    pub action_index: usize,
    pub action_values: Vec<ActionValue>,
    /// Bin indices: gender, age, bmi, wbc, sodium, hemoglobin, potassium.
    pub discretized_state: Vec<usize>,
    pub decided_at: DateTime<Utc>,
}

impl RecommendResponse {
    fn new(request_id: Uuid, decision: Decision) -> Self {
        Self {
            request_id,
            recommended_action: decision.action,
            action_index: decision.action_index,
            action_values: decision
                .action_values
                .into_iter()
                .map(|(action, value)| ActionValue { action, value })
                .collect(),
            discretized_state: decision.state.0,
            decided_at: Utc::now(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FeatureThresholds {
    pub feature: Feature,
    pub thresholds: Vec<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct PolicyInfoResponse {
    pub shape: Vec<usize>,
    pub actions: Vec<String>,
    /// Bins the discretizer can emit per state position.
    pub state_cardinalities: Vec<usize>,
    pub thresholds: Vec<FeatureThresholds>,
    pub loaded_at: DateTime<Utc>,
}

impl PolicyInfoResponse {
    pub fn new(engine: &PolicyEngine) -> Self {
        let discretizer = engine.discretizer();
        Self {
            shape: engine.lookup().shape().to_vec(),
            actions: engine.lookup().action_labels().to_vec(),
            state_cardinalities: discretizer.cardinalities(),
            thresholds: Feature::ALL
                .iter()
                .map(|&feature| FeatureThresholds {
                    feature,
                    thresholds: discretizer.thresholds(feature).as_slice().to_vec(),
                })
                .collect(),
            loaded_at: engine.loaded_at(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Offending discretized state, for `invalid_state` errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<usize>>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

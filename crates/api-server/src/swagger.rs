//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SurgiRec API",
        version = "0.1.0",
        description = "Surgical Treatment Recommender based on Q-learning (balanced data).\n\nMaps a patient intake profile to a recommended treatment by indexing a pre-trained, read-only decision table.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Recommendation", description = "Treatment recommendation and policy table inspection"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Recommendation
        crate::rest::handle_recommend,
        crate::rest::handle_policy_info,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Intake types
        surgirec_core::types::PatientProfile,
        surgirec_core::types::Gender,
        surgirec_core::types::Feature,
        // Response types
        crate::rest::RecommendResponse,
        crate::rest::ActionValue,
        crate::rest::PolicyInfoResponse,
        crate::rest::FeatureThresholds,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;

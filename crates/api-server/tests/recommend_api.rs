//! End-to-end tests for the REST surface against an in-memory policy table.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use ndarray::{ArrayD, IxDyn};
use serde_json::{json, Value};
use std::sync::Arc;
use surgirec_api::ApiServer;
use surgirec_core::config::AppConfig;
use surgirec_core::discretizer::FeatureDiscretizer;
use surgirec_policy::{PolicyEngine, PolicyTable};
use tower::ServiceExt;

/// Table covering only bins 0..3 on the age axis; everything else full width.
/// Laparoscopy wins for female patients, open surgery for male patients.
fn app() -> Router {
    let values = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4, 4, 4, 4, 4, 2]), |idx| {
        if idx[0] == idx[7] {
            0.25
        } else {
            0.75
        }
    });
    let config = AppConfig::default();
    let table = PolicyTable::from_array(
        values,
        FeatureDiscretizer::STATE_DIMS,
        &config.policy.actions,
    )
    .expect("valid table");
    let engine = PolicyEngine::with_lookup(Arc::new(table), FeatureDiscretizer::default());
    ApiServer::new(config, Arc::new(engine)).router()
}

fn profile(gender: &str, age: f64) -> Value {
    json!({
        "gender": gender,
        "age": age,
        "bmi": 22.0,
        "wbc": 7.0,
        "sodium": 138.0,
        "hemoglobin": 13.5,
        "potassium": 4.2
    })
}

async fn post_recommend(body: Value) -> (StatusCode, Value) {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/recommend")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn recommends_treatment() {
    let (status, body) = post_recommend(profile("female", 25.0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommended_action"], "Laparoscopy");
    assert_eq!(body["action_index"], 1);
    assert_eq!(body["discretized_state"], json!([0, 2, 1, 1, 2, 2, 1]));
    assert_eq!(body["action_values"][0]["action"], "Open Surgery");
    assert_eq!(body["action_values"][0]["value"], 0.25);
    assert_eq!(body["action_values"][1]["value"], 0.75);

    let (_, male) = post_recommend(profile("male", 25.0)).await;
    assert_eq!(male["recommended_action"], "Open Surgery");
}

#[tokio::test]
async fn out_of_range_state_is_a_warning() {
    let (status, body) = post_recommend(profile("male", 80.0)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_state");
    assert_eq!(body["state"], json!([1, 3, 1, 1, 2, 2, 1]));
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("(1, 3, 1, 1, 2, 2, 1)"));
}

#[tokio::test]
async fn rejects_values_outside_intake_ranges() {
    let (status, body) = post_recommend(profile("female", 150.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_patient_profile");
    assert!(body.get("state").is_none());
}

#[tokio::test]
async fn rejects_unknown_gender() {
    let (status, body) = post_recommend(profile("other", 25.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_patient_profile");
    assert!(body.get("state").is_none());
}

#[tokio::test]
async fn rejects_malformed_profiles() {
    let mut missing = profile("female", 25.0);
    missing.as_object_mut().unwrap().remove("sodium");

    let mut wrong_type = profile("female", 25.0);
    wrong_type["bmi"] = json!("heavy");

    for body in [missing, wrong_type, json!([1, 2, 3])] {
        let (status, body) = post_recommend(body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_patient_profile");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn describes_policy_table() {
    let response = app()
        .oneshot(Request::get("/v1/policy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["shape"], json!([2, 3, 4, 4, 4, 4, 4, 2]));
    assert_eq!(body["actions"], json!(["Open Surgery", "Laparoscopy"]));
    assert_eq!(body["state_cardinalities"], json!([2, 4, 4, 4, 4, 4, 4]));
    assert_eq!(body["thresholds"][0]["feature"], "age");
    assert_eq!(body["thresholds"][0]["thresholds"], json!([10.0, 25.0, 60.0]));
    assert!(body["loaded_at"].is_string());
}

#[tokio::test]
async fn operational_probes() {
    for path in ["/health", "/ready", "/live"] {
        let response = app()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}

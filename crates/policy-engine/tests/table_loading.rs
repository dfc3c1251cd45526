//! Loading decision tables from `.npy` artifacts on disk.

use ndarray::{ArrayD, IxDyn};
use ndarray_npy::write_npy;
use std::path::PathBuf;
use surgirec_core::config::AppConfig;
use surgirec_core::error::RecommenderError;
use surgirec_core::lookup::PolicyLookup;
use surgirec_core::types::{DiscretizedState, Gender, PatientProfile};
use surgirec_policy::{PolicyEngine, PolicyTable};
use tempfile::TempDir;

fn actions() -> Vec<String> {
    vec!["Open Surgery".to_string(), "Laparoscopy".to_string()]
}

/// Full-shape table: value of each action depends on the hemoglobin bin, so
/// anaemic patients get open surgery and everyone else laparoscopy.
fn full_table() -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(&[2, 4, 4, 4, 4, 4, 4, 2]), |idx| {
        let hemoglobin_bin = idx[5];
        match (hemoglobin_bin, idx[7]) {
            (0, 0) => 0.9,
            (0, _) => 0.1,
            (_, 0) => 0.3,
            _ => 0.7,
        }
    })
}

fn write_table<T: ndarray_npy::WritableElement>(dir: &TempDir, array: &ArrayD<T>) -> PathBuf {
    let path = dir.path().join("q_table.npy");
    write_npy(&path, array).expect("write fixture");
    path
}

fn patient(hemoglobin: f64) -> PatientProfile {
    PatientProfile {
        gender: Gender::Female,
        age: 42.0,
        bmi: 27.5,
        wbc: 12.0,
        sodium: 141.0,
        hemoglobin,
        potassium: 3.9,
    }
}

#[test]
fn loads_float64_table() {
    let dir = TempDir::new().unwrap();
    let path = write_table(&dir, &full_table());

    let table = PolicyTable::load(&path, 7, &actions()).unwrap();
    assert_eq!(table.shape(), &[2, 4, 4, 4, 4, 4, 4, 2]);

    let decision = table
        .decide(&DiscretizedState(vec![0, 2, 2, 2, 2, 0, 1]))
        .unwrap();
    assert_eq!(decision.action, "Open Surgery");
    assert_eq!(decision.values(), vec![0.9, 0.1]);
}

#[test]
fn widens_float32_table() {
    let dir = TempDir::new().unwrap();
    let narrow = full_table().mapv(|v| v as f32);
    let path = write_table(&dir, &narrow);

    let table = PolicyTable::load(&path, 7, &actions()).unwrap();
    let decision = table
        .decide(&DiscretizedState(vec![1, 0, 0, 0, 0, 3, 0]))
        .unwrap();
    assert_eq!(decision.action_index, 1);
    assert!((decision.values()[1] - 0.7).abs() < 1e-6);
}

#[test]
fn rejects_unsupported_dtype() {
    let dir = TempDir::new().unwrap();
    let ints = ArrayD::<i32>::zeros(IxDyn(&[2, 4, 4, 4, 4, 4, 4, 2]));
    let path = write_table(&dir, &ints);

    let err = PolicyTable::load(&path, 7, &actions()).unwrap_err();
    assert!(matches!(err, RecommenderError::ModelLoad(_)));
    assert!(err.to_string().contains("q_table.npy"));
}

#[test]
fn rejects_shape_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = write_table(&dir, &ArrayD::<f64>::zeros(IxDyn(&[2, 4, 4, 2])));

    let err = PolicyTable::load(&path, 7, &actions()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("q_table.npy"), "{message}");
    assert!(message.contains("expected 7 state axes"), "{message}");
}

#[test]
fn rejects_missing_and_garbage_files() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("absent.npy");
    let err = PolicyTable::load(&missing, 7, &actions()).unwrap_err();
    assert!(err.to_string().contains("absent.npy"));

    let garbage = dir.path().join("garbage.npy");
    std::fs::write(&garbage, b"definitely not numpy").unwrap();
    assert!(matches!(
        PolicyTable::load(&garbage, 7, &actions()),
        Err(RecommenderError::ModelLoad(_))
    ));
}

#[test]
fn engine_from_config_recommends() {
    let dir = TempDir::new().unwrap();
    let path = write_table(&dir, &full_table());

    let mut config = AppConfig::default();
    config.policy.table_path = path.to_string_lossy().into_owned();

    let engine = PolicyEngine::new(&config).unwrap();

    let anaemic = engine.recommend(&patient(8.0)).unwrap();
    assert_eq!(anaemic.action, "Open Surgery");
    assert_eq!(anaemic.state.as_slice(), &[0, 2, 2, 2, 2, 0, 1]);

    let healthy = engine.recommend(&patient(14.0)).unwrap();
    assert_eq!(healthy.action, "Laparoscopy");

    // Same input, same answer.
    assert_eq!(engine.recommend(&patient(14.0)).unwrap(), healthy);
}

#[test]
fn engine_fails_fast_without_table() {
    let mut config = AppConfig::default();
    config.policy.table_path = "/nonexistent/q_table.npy".to_string();
    let err = PolicyEngine::new(&config).err().expect("load must fail");
    assert!(err.to_string().contains("/nonexistent/q_table.npy"));
}

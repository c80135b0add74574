mod support;

use std::fs;

use canopy::{
    PipelineError,
    dataset::{TestSplit, load_breast_cancer},
    pipeline::{SplitCheck, run_evaluation, run_training, run_training_on},
    store::{ArtifactStore, StoreError},
    tracking::{RunStatus, Tracker},
};
use support::workspace::Workspace;

const TIMESTAMP: &str = "20240101_000000";

fn rewrite_split(ws: &Workspace, edit: impl FnOnce(&mut TestSplit)) {
    let path = ws.path("data/test_split.json");
    let mut split: TestSplit = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    edit(&mut split);
    fs::write(&path, serde_json::to_vec(&split).unwrap()).unwrap();
}

fn trained_workspace() -> Workspace {
    let ws = Workspace::new();
    run_training(&ws.settings(), TIMESTAMP).unwrap();
    ws
}

#[test]
fn train_then_evaluate_writes_rounded_metrics() {
    let ws = Workspace::new();
    let settings = ws.settings();

    let trained = run_training(&settings, TIMESTAMP).unwrap();
    assert_eq!(
        trained.model_path,
        ws.path("models/model_20240101_000000_rf_model.json")
    );
    assert_eq!(trained.test_split_path, ws.path("data/test_split.json"));
    assert_eq!(trained.train_rows + trained.test_rows, 569);
    assert_eq!(trained.test_rows, 114);
    assert_eq!(trained.n_features, 30);

    let evaluated = run_evaluation(&settings, TIMESTAMP).unwrap();
    assert_eq!(evaluated.rows, trained.test_rows);
    assert_eq!(evaluated.split_check, SplitCheck::Matches);
    assert_eq!(
        evaluated.metrics_path,
        ws.path("metrics/20240101_000000_metrics.json")
    );
    for score in [evaluated.metrics.accuracy, evaluated.metrics.f1_score] {
        assert!((0.0..=1.0).contains(&score));
        assert_eq!((score * 10_000.0).round() / 10_000.0, score);
    }
    // A forest on this dataset lands well above chance.
    assert!(evaluated.metrics.accuracy > 0.85);

    let text = fs::read_to_string(&evaluated.metrics_path).unwrap();
    assert!(text.starts_with("{\n  \"accuracy\": "));
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    let object = parsed.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(object["accuracy"].as_f64(), Some(evaluated.metrics.accuracy));
    assert_eq!(object["f1_score"].as_f64(), Some(evaluated.metrics.f1_score));
}

#[test]
fn evaluation_is_repeatable() {
    let ws = Workspace::new();
    let settings = ws.settings();
    run_training(&settings, TIMESTAMP).unwrap();

    let first = run_evaluation(&settings, TIMESTAMP).unwrap();
    let first_bytes = fs::read(&first.metrics_path).unwrap();
    let second = run_evaluation(&settings, TIMESTAMP).unwrap();
    let second_bytes = fs::read(&second.metrics_path).unwrap();
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn same_seed_produces_identical_artifacts() {
    let dataset = load_breast_cancer().unwrap();
    let left = Workspace::new();
    let right = Workspace::new();

    let a = run_training_on(&left.settings(), TIMESTAMP, &dataset).unwrap();
    let b = run_training_on(&right.settings(), TIMESTAMP, &dataset).unwrap();
    assert_eq!(a.metrics, b.metrics);
    assert_eq!(
        fs::read(&a.test_split_path).unwrap(),
        fs::read(&b.test_split_path).unwrap()
    );
    assert_eq!(
        fs::read(&a.model_path).unwrap(),
        fs::read(&b.model_path).unwrap()
    );
}

#[test]
fn missing_model_fails_without_writing_metrics() {
    let ws = Workspace::new();
    let settings = ws.settings();
    run_training(&settings, TIMESTAMP).unwrap();

    let err = run_evaluation(&settings, "19990101_000000").unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(!ws.path("metrics/19990101_000000_metrics.json").exists());
}

#[test]
fn missing_test_split_fails_without_writing_metrics() {
    let ws = Workspace::new();
    let settings = ws.settings();
    run_training(&settings, TIMESTAMP).unwrap();
    fs::remove_file(ws.path("data/test_split.json")).unwrap();

    let err = run_evaluation(&settings, TIMESTAMP).unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(!ws.path("metrics/20240101_000000_metrics.json").exists());
}

#[test]
fn retraining_with_new_seed_flags_older_models() {
    let ws = Workspace::new();
    let settings = ws.settings();
    run_training(&settings, TIMESTAMP).unwrap();

    let mut reseeded = settings.clone();
    reseeded.training.seed = 7;
    run_training(&reseeded, "20240102_000000").unwrap();

    let old = run_evaluation(&settings, TIMESTAMP).unwrap();
    assert_eq!(old.split_check, SplitCheck::Mismatch);
    let new = run_evaluation(&settings, "20240102_000000").unwrap();
    assert_eq!(new.split_check, SplitCheck::Matches);

    let store = ArtifactStore::from_settings(&settings);
    assert_eq!(
        store.model_timestamps().unwrap(),
        vec![TIMESTAMP.to_string(), "20240102_000000".to_string()]
    );
}

#[test]
fn training_run_is_recorded_in_tracker() {
    let ws = Workspace::new();
    let settings = ws.settings();
    let trained = run_training(&settings, TIMESTAMP).unwrap();
    assert!(trained.experiment_name.starts_with("breast_cancer_"));

    let tracker = Tracker::open(settings.tracking_dir()).unwrap();
    let experiments = tracker.experiments().unwrap();
    assert_eq!(experiments.len(), 1);
    assert_eq!(experiments[0].name, trained.experiment_name);

    let record = tracker
        .load_run(&trained.experiment_id, &trained.run_id)
        .unwrap();
    assert_eq!(record.meta.status, RunStatus::Finished);
    assert_eq!(record.meta.run_name, "RandomForest_BreastCancer");
    assert_eq!(record.params["n_features"], "30");
    assert_eq!(record.params["algorithm"], "RandomForestClassifier");
    assert_eq!(
        record.latest_metric("accuracy"),
        Some(trained.metrics.accuracy)
    );
    assert_eq!(
        record.latest_metric("f1_score"),
        Some(trained.metrics.f1_score)
    );
    assert_eq!(record.tags["timestamp"], TIMESTAMP);
}

#[test]
fn narrower_split_is_a_feature_mismatch() {
    let ws = trained_workspace();
    rewrite_split(&ws, |split| {
        split.feature_names.pop();
        for row in &mut split.x {
            row.pop();
        }
    });

    let err = run_evaluation(&ws.settings(), TIMESTAMP).unwrap_err();
    match err {
        PipelineError::FeatureMismatch(mismatch) => {
            assert_eq!(mismatch.found, 29);
            assert_eq!(mismatch.expected, 30);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ws.path("metrics/20240101_000000_metrics.json").exists());
}

#[test]
fn relabelled_classes_are_rejected() {
    let ws = trained_workspace();
    rewrite_split(&ws, |split| {
        split.classes = vec!["benign".into(), "malignant".into()];
    });

    let err = run_evaluation(&ws.settings(), TIMESTAMP).unwrap_err();
    assert!(
        matches!(err, PipelineError::ClassMismatch { .. }),
        "unexpected error: {err}"
    );
    assert!(!ws.path("metrics/20240101_000000_metrics.json").exists());
}

#[test]
fn truncated_labels_fail_instead_of_scoring_a_subset() {
    let ws = trained_workspace();
    rewrite_split(&ws, |split| split.y.truncate(10));

    let err = run_evaluation(&ws.settings(), TIMESTAMP).unwrap_err();
    assert!(
        matches!(err, PipelineError::Store(StoreError::InvalidSplit { .. })),
        "unexpected error: {err}"
    );
    assert!(!err.is_not_found());
    assert!(!ws.path("metrics/20240101_000000_metrics.json").exists());
}

#[test]
fn unknown_label_fails_instead_of_being_skipped() {
    let ws = trained_workspace();
    rewrite_split(&ws, |split| split.y[0] = 7);

    let err = run_evaluation(&ws.settings(), TIMESTAMP).unwrap_err();
    assert!(
        matches!(err, PipelineError::Store(StoreError::InvalidSplit { .. })),
        "unexpected error: {err}"
    );
    assert!(!ws.path("metrics/20240101_000000_metrics.json").exists());
}

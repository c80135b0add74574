use std::path::PathBuf;

use crate::{
    PipelineError,
    config::{Settings, TrainingSettings},
    dataset::{Dataset, load_breast_cancer, train_test_split},
    logging::now_local_or_utc,
    ml::{
        forest::{ALGORITHM_NAME, MaxFeatures, TrainDataset, TrainOptions, train_random_forest},
        metrics::MetricsReport,
    },
    store::ArtifactStore,
    tracking::{Tracker, experiment_name},
};

/// Outcome of one training run.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub timestamp: String,
    pub model_path: PathBuf,
    pub test_split_path: PathBuf,
    /// Unrounded scores on the held-out rows.
    pub metrics: MetricsReport,
    pub train_rows: usize,
    pub test_rows: usize,
    pub n_features: usize,
    pub experiment_name: String,
    pub experiment_id: String,
    pub run_id: String,
}

/// Map config hyperparameters onto forest options.
pub fn train_options(settings: &TrainingSettings) -> TrainOptions {
    TrainOptions {
        n_trees: settings.n_trees,
        max_depth: settings.max_depth,
        min_samples_split: settings.min_samples_split,
        min_samples_leaf: settings.min_samples_leaf,
        max_features: MaxFeatures::Sqrt,
        bootstrap: true,
        seed: settings.seed,
    }
}

/// Train on the bundled breast-cancer dataset and persist the artifacts for `timestamp`.
pub fn run_training(settings: &Settings, timestamp: &str) -> Result<TrainingSummary, PipelineError> {
    let dataset = load_breast_cancer()?;
    run_training_on(settings, timestamp, &dataset)
}

/// Same as [`run_training`] for an already loaded dataset.
pub fn run_training_on(
    settings: &Settings,
    timestamp: &str,
    dataset: &Dataset,
) -> Result<TrainingSummary, PipelineError> {
    let training = &settings.training;
    let (train, test) = train_test_split(dataset, training.test_fraction, training.seed)?;
    tracing::info!(
        timestamp,
        train_rows = train.len(),
        test_rows = test.len(),
        "Training random forest"
    );

    let train_set = TrainDataset {
        feature_names: train.feature_names.clone(),
        classes: train.classes.clone(),
        x: train.x,
        y: train.y,
    };
    let mut model = train_random_forest(&train_set, &train_options(training))
        .map_err(PipelineError::Training)?;
    let predicted = model.predict(&test.x)?;
    let metrics = MetricsReport::from_predictions(&test.y, &predicted, model.classes.len())?;
    tracing::info!(
        accuracy = metrics.accuracy,
        f1_score = metrics.f1_score,
        "Scored model on test split"
    );

    let tracker = Tracker::open(settings.tracking_dir())?;
    let name = experiment_name(&settings.tracking.experiment_prefix, now_local_or_utc())?;
    let experiment = tracker.set_experiment(&name)?;
    let mut run = experiment.start_run(&settings.tracking.run_name)?;
    run.log_param("n_features", dataset.feature_len())?;
    run.log_param("algorithm", ALGORITHM_NAME)?;
    run.log_metric("accuracy", metrics.accuracy)?;
    run.log_metric("f1_score", metrics.f1_score)?;

    let store = ArtifactStore::from_settings(settings);
    let saved_split = store.save_test_split(&test)?;
    model.test_split_digest = Some(saved_split.digest);
    let model_path = store.save_model(timestamp, &model)?;
    tracing::info!(path = %model_path.display(), "Saved model");

    run.set_tag("timestamp", timestamp)?;
    run.set_tag("model_path", model_path.display())?;
    let run_meta = run.finish()?;

    Ok(TrainingSummary {
        timestamp: timestamp.to_string(),
        model_path,
        test_split_path: saved_split.path,
        metrics,
        train_rows: train_set.x.len(),
        test_rows: test.len(),
        n_features: dataset.feature_len(),
        experiment_name: name,
        experiment_id: experiment.id().to_string(),
        run_id: run_meta.run_id,
    })
}

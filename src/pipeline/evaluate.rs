use std::path::PathBuf;

use super::REPORT_DECIMALS;
use crate::{PipelineError, config::Settings, ml::metrics::MetricsReport, store::ArtifactStore};

/// Whether the split on disk is the one saved with the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCheck {
    Matches,
    /// A later training run replaced the split after this model was saved.
    Mismatch,
    /// The model predates split fingerprints.
    Unknown,
}

/// Outcome of one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub timestamp: String,
    pub metrics_path: PathBuf,
    /// Rounded scores as written to the report.
    pub metrics: MetricsReport,
    pub rows: usize,
    pub split_check: SplitCheck,
}

/// Score the model trained under `timestamp` on the persisted test split.
///
/// Nothing is written unless both artifacts load and the feature layout matches.
pub fn run_evaluation(
    settings: &Settings,
    timestamp: &str,
) -> Result<EvaluationSummary, PipelineError> {
    let store = ArtifactStore::from_settings(settings);
    let loaded = store.load_test_split()?;
    let model = store.load_model(timestamp)?;
    if loaded.split.classes != model.classes {
        return Err(PipelineError::ClassMismatch {
            path: loaded.path,
            found: loaded.split.classes,
            expected: model.classes,
        });
    }

    let split_check = match model.test_split_digest.as_deref() {
        Some(digest) if digest == loaded.digest => SplitCheck::Matches,
        Some(_) => SplitCheck::Mismatch,
        None => SplitCheck::Unknown,
    };
    if split_check == SplitCheck::Mismatch {
        tracing::warn!(
            timestamp,
            split = %loaded.path.display(),
            "Test split was rewritten after this model was trained; evaluating against the current split"
        );
    }

    let predicted = model.predict(&loaded.split.x)?;
    let metrics = MetricsReport::from_predictions(&loaded.split.y, &predicted, model.classes.len())?
        .rounded(REPORT_DECIMALS);
    let metrics_path = store.write_metrics(timestamp, &metrics)?;
    tracing::info!(
        timestamp,
        accuracy = metrics.accuracy,
        f1_score = metrics.f1_score,
        path = %metrics_path.display(),
        "Wrote metrics report"
    );

    Ok(EvaluationSummary {
        timestamp: timestamp.to_string(),
        metrics_path,
        metrics,
        rows: predicted.len(),
        split_check,
    })
}

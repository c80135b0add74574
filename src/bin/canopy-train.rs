//! Training stage: fit the forest and persist the model and test split.

use canopy::cli::{self, Command};
use canopy::config::Settings;
use canopy::{PipelineError, logging, pipeline};

const PROGRAM: &str = "canopy-train";
const SUMMARY: &str = "Trains a random forest on the bundled breast-cancer dataset and saves the model and test split.";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), PipelineError> {
    let timestamp = match cli::parse_args(PROGRAM, SUMMARY, std::env::args().skip(1).collect())? {
        Command::Run { timestamp } => timestamp,
        Command::Help(text) => {
            println!("{text}");
            return Ok(());
        }
    };
    let settings = Settings::load()?;
    if let Err(err) = logging::init(&settings, "train") {
        eprintln!("Logging disabled: {err}");
    }
    println!("Timestamp received: {timestamp}");

    let summary = pipeline::run_training(&settings, &timestamp)?;
    println!(
        "Trained on {} rows, held out {} rows ({} features)",
        summary.train_rows, summary.test_rows, summary.n_features
    );
    println!(
        "test accuracy: {:.4}  f1: {:.4}",
        summary.metrics.accuracy, summary.metrics.f1_score
    );
    println!(
        "Logged run {} to experiment {} ({})",
        summary.run_id, summary.experiment_name, summary.experiment_id
    );
    println!("Model saved → {}", summary.model_path.display());
    println!("Test split saved → {}", summary.test_split_path.display());
    println!("Training complete.");
    Ok(())
}

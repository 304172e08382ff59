//! `train` entry point

use crate::config::parse_schema;
use anyhow::{Context, Result};
use clap::Args;
use preprocessor_lib::{Pipeline, Trainer, TrainingPaths, TrainingReport};
use std::path::PathBuf;

/// Locations handed over by the training platform
#[derive(Debug, Clone, Args)]
pub struct TrainArgs {
    /// Directory holding the training files
    #[arg(long, env = "SM_CHANNEL_TRAIN")]
    pub train: PathBuf,

    /// Directory the artifact is written to
    #[arg(long, env = "SM_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Directory for auxiliary outputs such as the training report
    #[arg(long, env = "SM_OUTPUT_DATA_DIR")]
    pub output_data_dir: Option<PathBuf>,

    /// Row-key column of the input files
    #[arg(long, env = "SM_INDEX_COLUMN", default_value = "timestamp")]
    pub index_column: String,

    /// Comma-separated numeric feature columns
    #[arg(long, env = "SM_FEATURE_COLUMNS", default_value = "value")]
    pub feature_columns: String,
}

impl TrainArgs {
    pub fn paths(&self) -> TrainingPaths {
        TrainingPaths {
            train_dir: self.train.clone(),
            model_dir: self.model_dir.clone(),
            output_data_dir: self.output_data_dir.clone(),
        }
    }

    pub fn trainer(&self) -> Trainer {
        Trainer::new(
            parse_schema(&self.index_column, &self.feature_columns),
            Pipeline::standard(),
        )
    }
}

/// Runs one training job to completion
pub fn run(args: &TrainArgs) -> Result<TrainingReport> {
    args.trainer()
        .run(&args.paths())
        .with_context(|| format!("Training from {} failed", args.train.display()))
}

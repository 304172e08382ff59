//! Batch training: read the input channel, fit the pipeline, persist it
//!
//! Every failure here is fatal to the run and nothing is retried. The
//! artifact is written last, after the training report, so a failed run
//! never leaves one behind.

use crate::artifact;
use crate::error::{ChannelProblem, PreprocessError, Result};
use crate::schema::FeatureSchema;
use crate::table::{read_csv, Table};
use crate::transform::{FittedPipeline, Pipeline};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the input channel the trainer reads from
pub const TRAIN_CHANNEL: &str = "train";

/// File written to the output-data directory after a successful run
pub const REPORT_FILE_NAME: &str = "training_report.json";

/// Filesystem locations handed to a training run
#[derive(Debug, Clone)]
pub struct TrainingPaths {
    pub train_dir: PathBuf,
    pub model_dir: PathBuf,
    pub output_data_dir: Option<PathBuf>,
}

/// Summary of a completed training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub input_files: Vec<PathBuf>,
    pub rows: usize,
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub artifact_path: PathBuf,
    pub completed_at: DateTime<Utc>,
}

/// Fits a [`Pipeline`] over every file of an input channel
pub struct Trainer {
    schema: FeatureSchema,
    pipeline: Pipeline,
    channel: String,
}

impl Trainer {
    pub fn new(schema: FeatureSchema, pipeline: Pipeline) -> Self {
        Self {
            schema,
            pipeline,
            channel: TRAIN_CHANNEL.to_string(),
        }
    }

    /// Overrides the channel name reported in configuration errors
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Lists the regular files of `train_dir` in file-name order
    pub fn input_files(&self, train_dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(train_dir)
            .map_err(|e| self.unreadable(train_dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.unreadable(train_dir, e))?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            } else {
                debug!(path = %path.display(), "Skipping non-file entry in input channel");
            }
        }

        if files.is_empty() {
            return Err(self.configuration_error(train_dir, ChannelProblem::Empty));
        }

        files.sort();
        Ok(files)
    }

    /// Reads and stacks every input file
    pub fn load_dataset(&self, train_dir: &Path) -> Result<(Vec<PathBuf>, Table)> {
        let files = self.input_files(train_dir)?;

        let mut tables = Vec::with_capacity(files.len());
        for path in &files {
            let reader = BufReader::new(File::open(path)?);
            let table = read_csv(reader, &self.schema, true, &path.display().to_string())?;
            debug!(path = %path.display(), rows = table.n_rows(), "Read input file");
            tables.push(table);
        }

        Ok((files, Table::concat(tables)?))
    }

    /// Fits the pipeline over an already loaded dataset
    pub fn fit(&self, dataset: &Table) -> Result<FittedPipeline> {
        self.pipeline.fit_table(dataset)
    }

    /// Runs training end to end and persists the artifact
    pub fn run(&self, paths: &TrainingPaths) -> Result<TrainingReport> {
        info!(
            train_dir = %paths.train_dir.display(),
            model_dir = %paths.model_dir.display(),
            channel = %self.channel,
            "Training started"
        );

        let (input_files, dataset) = self.load_dataset(&paths.train_dir)?;
        let fitted = self.fit(&dataset)?;

        let (mean, scale) = fitted
            .standard_params()
            .map(|p| (p.mean.clone(), p.scale.clone()))
            .unwrap_or_default();

        let report = TrainingReport {
            input_files,
            rows: dataset.n_rows(),
            feature_names: fitted.feature_names.clone(),
            mean,
            scale,
            artifact_path: artifact::artifact_path(&paths.model_dir),
            completed_at: Utc::now(),
        };

        if let Some(output_dir) = &paths.output_data_dir {
            fs::create_dir_all(output_dir)?;
            let report_path = output_dir.join(REPORT_FILE_NAME);
            fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;
            debug!(path = %report_path.display(), "Training report written");
        }

        artifact::save(&paths.model_dir, &fitted)?;

        info!(
            files = report.input_files.len(),
            rows = report.rows,
            artifact = %report.artifact_path.display(),
            "saved model!"
        );
        Ok(report)
    }

    fn configuration_error(&self, path: &Path, problem: ChannelProblem) -> PreprocessError {
        PreprocessError::Configuration {
            channel: self.channel.clone(),
            path: path.to_path_buf(),
            problem,
        }
    }

    fn unreadable(&self, path: &Path, err: std::io::Error) -> PreprocessError {
        self.configuration_error(path, ChannelProblem::Unreadable(err.to_string()))
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(FeatureSchema::default(), Pipeline::standard())
    }
}

//! Training and serving entry points for the time-series preprocessor
//!
//! The platform starts the same binary as `preprocessor train` for the batch
//! training job and as `preprocessor serve` for the inference container.

pub mod api;
pub mod config;
pub mod train;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Time-series preprocessor: fit and serve a feature-standardization pipeline
#[derive(Debug, Parser)]
#[command(name = "preprocessor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the pipeline over the training channel and write the artifact
    Train(train::TrainArgs),

    /// Load the artifact and serve invocations over HTTP
    Serve {
        /// Override the artifact directory (SM_MODEL_DIR)
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Override the listening port (SM_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
}

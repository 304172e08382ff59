//! Time-series preprocessing library
//!
//! This crate provides the core functionality for:
//! - Fitting a feature-standardization pipeline over CSV training data
//! - Persisting and loading the fitted pipeline as an artifact
//! - Serving callbacks: request parsing, transformation, response encoding
//! - Health checks and observability for the serving process

pub mod adapter;
pub mod artifact;
pub mod error;
pub mod health;
pub mod observability;
pub mod schema;
pub mod table;
pub mod trainer;
pub mod transform;

pub use adapter::{EncodedResponse, InferenceAdapter, MediaType};
pub use error::{ChannelProblem, PreprocessError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use observability::{ServingMetrics, StructuredLogger};
pub use schema::FeatureSchema;
pub use table::{Observation, RowKey, Table};
pub use trainer::{Trainer, TrainingPaths, TrainingReport};
pub use transform::{Apply, Fit, FittedPipeline, FittedTransform, Pipeline, StandardScaler};

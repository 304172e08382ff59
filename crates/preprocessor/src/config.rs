//! Serving configuration

use anyhow::{Context, Result};
use preprocessor_lib::{FeatureSchema, MediaType};
use serde::Deserialize;
use std::path::PathBuf;

/// Prefix of the platform environment variables (`SM_MODEL_DIR`, ...)
pub const ENV_PREFIX: &str = "SM";

/// Serving configuration, read from `SM_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServeConfig {
    /// Directory holding the trained artifact
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Port of the invocation, ping and metrics server
    #[serde(default = "default_port")]
    pub port: u16,

    /// Response encoding when a request sends no usable Accept header
    #[serde(default = "default_accept")]
    pub default_accept: String,

    /// Name accepted on `/endpoints/{name}/invocations`
    #[serde(default = "default_endpoint_name")]
    pub endpoint_name: String,

    /// Largest accepted request body
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Row-key column of the feature schema
    #[serde(default = "default_index_column")]
    pub index_column: String,

    /// Comma-separated feature columns of the feature schema
    #[serde(default = "default_feature_columns")]
    pub feature_columns: String,

    /// Instance name attached to structured logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("/opt/ml/model")
}

fn default_port() -> u16 {
    8080
}

fn default_accept() -> String {
    MediaType::Json.as_str().to_string()
}

fn default_endpoint_name() -> String {
    "preprocessor".to_string()
}

fn default_max_payload_bytes() -> usize {
    6 * 1024 * 1024
}

fn default_index_column() -> String {
    preprocessor_lib::schema::DEFAULT_INDEX_COLUMN.to_string()
}

fn default_feature_columns() -> String {
    preprocessor_lib::schema::DEFAULT_FEATURE_COLUMNS.join(",")
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

impl ServeConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_environment(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read serving configuration")?;

        config
            .try_deserialize()
            .context("Invalid serving configuration")
    }

    /// Parsed form of `default_accept`
    pub fn default_accept_type(&self) -> Result<MediaType> {
        MediaType::parse(&self.default_accept).context("Invalid default accept type")
    }

    /// Feature schema declared by `index_column` and `feature_columns`
    pub fn schema(&self) -> FeatureSchema {
        parse_schema(&self.index_column, &self.feature_columns)
    }
}

/// Builds a schema from a comma-separated feature column list
pub fn parse_schema(index_column: &str, feature_columns: &str) -> FeatureSchema {
    FeatureSchema::new(
        index_column.trim(),
        feature_columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = ServeConfig::from_environment(env(&[])).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/opt/ml/model"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_accept_type().unwrap(), MediaType::Json);
        assert_eq!(config.schema(), FeatureSchema::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ServeConfig::from_environment(env(&[
            ("SM_MODEL_DIR", "/tmp/model"),
            ("SM_PORT", "9090"),
            ("SM_DEFAULT_ACCEPT", "text/csv"),
            ("SM_FEATURE_COLUMNS", "cpu, mem"),
            ("SM_CHANNEL_TRAIN", "/opt/ml/input/data/train"),
        ]))
        .unwrap();

        assert_eq!(config.model_dir, PathBuf::from("/tmp/model"));
        assert_eq!(config.port, 9090);
        assert_eq!(config.default_accept_type().unwrap(), MediaType::Csv);
        assert_eq!(
            config.schema().feature_columns,
            vec!["cpu".to_string(), "mem".to_string()]
        );
    }

    #[test]
    fn test_invalid_default_accept() {
        let config = ServeConfig::from_environment(env(&[("SM_DEFAULT_ACCEPT", "application/xml")]))
            .unwrap();
        assert!(config.default_accept_type().is_err());
    }
}

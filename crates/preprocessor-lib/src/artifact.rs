//! Persistence of the fitted pipeline
//!
//! The artifact is a JSON envelope carrying a format version, a SHA256
//! checksum of the serialized pipeline and the pipeline itself. Writes go
//! through a temp file and a rename so a reader never sees a partial file.

use crate::error::{PreprocessError, Result};
use crate::transform::FittedPipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fixed file name of the artifact inside the model directory
pub const ARTIFACT_FILE_NAME: &str = "model.json";

/// Envelope layout version written by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    checksum: String,
    created_at: DateTime<Utc>,
    pipeline: FittedPipeline,
}

/// Location of the artifact for a model directory
pub fn artifact_path(model_dir: &Path) -> PathBuf {
    model_dir.join(ARTIFACT_FILE_NAME)
}

/// Writes the fitted pipeline to `<model_dir>/model.json`
pub fn save(model_dir: &Path, pipeline: &FittedPipeline) -> Result<PathBuf> {
    fs::create_dir_all(model_dir)?;

    let envelope = ArtifactEnvelope {
        format_version: ARTIFACT_FORMAT_VERSION,
        checksum: checksum(pipeline)?,
        created_at: Utc::now(),
        pipeline: pipeline.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&envelope)?;

    let path = artifact_path(model_dir);
    let temp_path = path.with_extension("tmp");
    let written = write_synced(&temp_path, &bytes).and_then(|()| fs::rename(&temp_path, &path));
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    info!(
        path = %path.display(),
        size_bytes = bytes.len(),
        checksum = %envelope.checksum,
        "Artifact written"
    );
    Ok(path)
}

/// Reads and validates the artifact in `model_dir`
pub fn load(model_dir: &Path) -> Result<FittedPipeline> {
    let path = artifact_path(model_dir);
    if !path.is_file() {
        return Err(PreprocessError::artifact(&path, "artifact file not found"));
    }

    let bytes = fs::read(&path).map_err(|e| PreprocessError::artifact(&path, e.to_string()))?;
    let envelope: ArtifactEnvelope = serde_json::from_slice(&bytes)
        .map_err(|e| PreprocessError::artifact(&path, format!("corrupt artifact: {}", e)))?;

    if envelope.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(PreprocessError::artifact(
            &path,
            format!(
                "unsupported format version {} (expected {})",
                envelope.format_version, ARTIFACT_FORMAT_VERSION
            ),
        ));
    }

    let actual = checksum(&envelope.pipeline)?;
    if actual != envelope.checksum {
        return Err(PreprocessError::artifact(
            &path,
            format!(
                "checksum mismatch: expected {}, got {}",
                envelope.checksum, actual
            ),
        ));
    }

    debug!(
        path = %path.display(),
        created_at = %envelope.created_at,
        steps = envelope.pipeline.steps.len(),
        "Artifact loaded"
    );
    Ok(envelope.pipeline)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn checksum(pipeline: &FittedPipeline) -> Result<String> {
    let bytes = serde_json::to_vec(pipeline)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

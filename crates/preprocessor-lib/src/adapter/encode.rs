//! Response encoders for the standardized feature matrix

use crate::error::{PreprocessError, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// One row of the JSON response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub features: Vec<f64>,
}

/// JSON response document: `{"instances": [{"features": [...]}, ...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancesDocument {
    pub instances: Vec<Instance>,
}

impl InstancesDocument {
    pub fn from_matrix(matrix: ArrayView2<'_, f64>) -> Self {
        Self {
            instances: matrix
                .rows()
                .into_iter()
                .map(|row| Instance {
                    features: row.to_vec(),
                })
                .collect(),
        }
    }
}

pub fn encode_json(matrix: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&InstancesDocument::from_matrix(matrix))?)
}

/// Row-major, header-less CSV with one line per row
pub fn encode_csv(matrix: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    for row in matrix.rows() {
        writer.write_record(row.iter().map(|v| format!("{:?}", v)))?;
    }

    writer
        .into_inner()
        .map_err(|e| PreprocessError::Io(e.into_error()))
}

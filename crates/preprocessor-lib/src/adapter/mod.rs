//! Inference adapter: the serving callbacks around a fitted pipeline
//!
//! The hosting runtime drives four independent operations:
//! - [`InferenceAdapter::load`] deserializes the artifact once at startup
//! - [`InferenceAdapter::parse_request`] decodes a request payload
//! - [`InferenceAdapter::transform`] standardizes the decoded table
//! - [`InferenceAdapter::encode_response`] serializes the result
//!
//! The adapter never mutates itself after construction, so one instance can
//! be shared behind an `Arc` by concurrently served requests.

mod encode;
mod media;

pub use encode::{encode_csv, encode_json, Instance, InstancesDocument};
pub use media::{MediaType, ANY, APPLICATION_JSON, TEXT_CSV};

use crate::artifact;
use crate::error::{PreprocessError, Result};
use crate::schema::FeatureSchema;
use crate::table::{read_csv, Table};
use crate::transform::{Apply, FittedPipeline};
use ndarray::{Array2, ArrayView2};
use std::path::Path;
use tracing::{debug, warn};

/// Serialized response plus the content type it was encoded with
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedResponse {
    pub body: Vec<u8>,
    pub content_type: MediaType,
}

/// Serving-side wrapper around a loaded [`FittedPipeline`]
#[derive(Debug, Clone)]
pub struct InferenceAdapter {
    schema: FeatureSchema,
    model: FittedPipeline,
}

impl InferenceAdapter {
    pub fn new(schema: FeatureSchema, model: FittedPipeline) -> Self {
        Self { schema, model }
    }

    /// Loads the artifact from `model_dir` and checks it against `schema`
    pub fn load(model_dir: &Path, schema: FeatureSchema) -> Result<Self> {
        let model = artifact::load(model_dir)?;

        if model.n_features() != schema.n_features() {
            return Err(PreprocessError::Artifact {
                path: artifact::artifact_path(model_dir),
                reason: format!(
                    "artifact was fitted on {} feature(s), schema declares {}",
                    model.n_features(),
                    schema.n_features()
                ),
            });
        }
        if model.feature_names != schema.feature_columns {
            warn!(
                fitted = ?model.feature_names,
                schema = ?schema.feature_columns,
                "Artifact feature names differ from the schema"
            );
        }

        Ok(Self::new(schema, model))
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model(&self) -> &FittedPipeline {
        &self.model
    }

    /// Decodes a request payload; only `text/csv` is accepted
    ///
    /// The CSV has no header row and its first column is the row key.
    pub fn parse_request(&self, body: &[u8], content_type: &str) -> Result<Table> {
        match MediaType::parse(content_type) {
            Ok(MediaType::Csv) => {}
            Ok(MediaType::Json) | Err(_) => {
                return Err(PreprocessError::UnsupportedMediaType(
                    content_type.trim().to_string(),
                ))
            }
        }

        let text = std::str::from_utf8(body).map_err(|e| {
            PreprocessError::MalformedInput(format!("request body is not UTF-8: {}", e))
        })?;
        if text.trim().is_empty() {
            return Err(PreprocessError::MalformedInput(
                "request body is empty".to_string(),
            ));
        }

        let table = read_csv(text.as_bytes(), &self.schema, false, "request")?;
        if table.n_rows() == 0 {
            return Err(PreprocessError::MalformedInput(
                "request contains no rows".to_string(),
            ));
        }

        debug!(rows = table.n_rows(), "Parsed request");
        Ok(table)
    }

    /// Standardizes every column of `table`
    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        self.model.transform(table)
    }

    /// Serializes `prediction`; the response content type mirrors `accept`
    pub fn encode_response(
        &self,
        prediction: ArrayView2<'_, f64>,
        accept: &str,
    ) -> Result<EncodedResponse> {
        let content_type = MediaType::parse(accept)?;
        let body = match content_type {
            MediaType::Json => encode_json(prediction)?,
            MediaType::Csv => encode_csv(prediction)?,
        };
        Ok(EncodedResponse { body, content_type })
    }

    /// Runs parse, transform and encode for one request
    pub fn invoke(&self, body: &[u8], content_type: &str, accept: &str) -> Result<EncodedResponse> {
        let table = self.parse_request(body, content_type)?;
        let prediction = self.transform(&table)?;
        self.encode_response(prediction.view(), accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{FittedTransform, StandardParams};
    use ndarray::array;

    fn adapter(mean: f64, scale: f64) -> InferenceAdapter {
        let model = FittedPipeline {
            feature_names: vec!["value".to_string()],
            steps: vec![FittedTransform::Standard(StandardParams {
                with_mean: true,
                with_std: true,
                mean: vec![mean],
                var: vec![scale * scale],
                scale: vec![scale],
                n_samples_seen: 100,
            })],
        };
        InferenceAdapter::new(FeatureSchema::default(), model)
    }

    #[test]
    fn test_csv_request_to_csv_response() {
        let response = adapter(70.0, 10.0)
            .invoke(b"2013-12-02 21:15:00, 75", "text/csv", "text/csv")
            .unwrap();
        assert_eq!(response.content_type, MediaType::Csv);
        assert_eq!(String::from_utf8(response.body).unwrap().trim(), "0.5");
    }

    #[test]
    fn test_csv_request_to_json_response() {
        let response = adapter(70.0, 10.0)
            .invoke(
                b"2013-12-02 21:15:00,75\n2013-12-02 21:20:00,50\n",
                "text/csv",
                "application/json",
            )
            .unwrap();
        assert_eq!(response.content_type, MediaType::Json);
        let doc: InstancesDocument = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(doc.instances.len(), 2);
        assert_eq!(doc.instances[0].features, vec![0.5]);
        assert_eq!(doc.instances[1].features, vec![-2.0]);
    }

    #[test]
    fn test_parse_request_rejects_other_content_types() {
        let adapter = adapter(0.0, 1.0);
        for content_type in ["application/json", "application/x-npy"] {
            let err = adapter.parse_request(b"[1]", content_type).unwrap_err();
            assert!(
                matches!(&err, PreprocessError::UnsupportedMediaType(t) if t == content_type),
                "unexpected error: {}",
                err
            );
        }
    }

    #[test]
    fn test_parse_request_rejects_empty_and_binary_bodies() {
        let adapter = adapter(0.0, 1.0);
        assert!(matches!(
            adapter.parse_request(b"  \n", "text/csv"),
            Err(PreprocessError::MalformedInput(_))
        ));
        assert!(matches!(
            adapter.parse_request(&[0xff, 0xfe, 0x00], "text/csv"),
            Err(PreprocessError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_non_finite_request_values_are_rejected() {
        let err = adapter(0.0, 1.0)
            .invoke(b"t,NaN\nt2,inf", "text/csv", "application/json")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::MalformedInput(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_encode_response_rejects_unknown_accept() {
        let err = adapter(0.0, 1.0)
            .encode_response(array![[1.0]].view(), "application/xml")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::UnsupportedMediaType(t) if t == "application/xml"));
    }

    #[test]
    fn test_transform_preserves_shape() {
        let adapter = adapter(1.0, 2.0);
        let table = adapter
            .parse_request(b"a,1\nb,3\nc,5\n", "text/csv")
            .unwrap();
        let out = adapter.transform(&table).unwrap();
        assert_eq!(out.dim(), (3, 1));
        assert_eq!(out, array![[0.0], [1.0], [2.0]]);
    }
}

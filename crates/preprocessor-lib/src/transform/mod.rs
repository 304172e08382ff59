//! Fit/apply transform contract and the preprocessing pipeline
//!
//! A [`Pipeline`] is an ordered list of unfitted steps. Fitting it over a
//! training table yields a [`FittedPipeline`], which is immutable and is what
//! the artifact stores and the inference adapter applies.

mod standard;

pub use standard::{StandardParams, StandardScaler};

use crate::error::{PreprocessError, Result};
use crate::table::Table;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Learns parameters from a feature matrix
pub trait Fit {
    type Output: Apply;

    fn fit(&self, data: ArrayView2<'_, f64>) -> Result<Self::Output>;
}

/// Applies learned parameters to a feature matrix
pub trait Apply {
    /// Number of columns the parameters were fitted on
    fn n_features(&self) -> usize;

    /// Returns a matrix with the same shape as `data`
    fn apply(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// Unfitted step kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    Standard(StandardScaler),
}

/// Fitted step kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedTransform {
    Standard(StandardParams),
}

impl FittedTransform {
    pub fn kind(&self) -> &'static str {
        match self {
            FittedTransform::Standard(_) => "standard",
        }
    }
}

impl Fit for TransformSpec {
    type Output = FittedTransform;

    fn fit(&self, data: ArrayView2<'_, f64>) -> Result<FittedTransform> {
        match self {
            TransformSpec::Standard(scaler) => scaler.fit(data).map(FittedTransform::Standard),
        }
    }
}

impl Apply for FittedTransform {
    fn n_features(&self) -> usize {
        match self {
            FittedTransform::Standard(params) => params.n_features(),
        }
    }

    fn apply(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        match self {
            FittedTransform::Standard(params) => params.apply(data),
        }
    }
}

/// Ordered list of unfitted steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub steps: Vec<TransformSpec>,
}

impl Pipeline {
    pub fn new(steps: Vec<TransformSpec>) -> Self {
        Self { steps }
    }

    /// Single standardization step with default options
    pub fn standard() -> Self {
        Self::new(vec![TransformSpec::Standard(StandardScaler::default())])
    }

    /// Fits every step in order, feeding each the previous step's output
    pub fn fit_table(&self, table: &Table) -> Result<FittedPipeline> {
        if self.steps.is_empty() {
            return Err(PreprocessError::Fit("pipeline has no steps".to_string()));
        }

        let mut fitted = Vec::with_capacity(self.steps.len());
        let mut current: Option<Array2<f64>> = None;

        for (i, step) in self.steps.iter().enumerate() {
            let input = current.as_ref().map(|m| m.view()).unwrap_or(table.values());
            let step_fitted = step.fit(input)?;
            if i + 1 < self.steps.len() {
                current = Some(step_fitted.apply(input)?);
            }
            fitted.push(step_fitted);
        }

        Ok(FittedPipeline {
            feature_names: table.columns().to_vec(),
            steps: fitted,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// Immutable result of fitting a [`Pipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub feature_names: Vec<String>,
    pub steps: Vec<FittedTransform>,
}

impl FittedPipeline {
    /// Standardizes a table's values
    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        self.apply(table.values())
    }

    /// Parameters of the first standardization step, if any
    pub fn standard_params(&self) -> Option<&StandardParams> {
        self.steps.iter().find_map(|step| match step {
            FittedTransform::Standard(params) => Some(params),
        })
    }
}

impl Apply for FittedPipeline {
    fn n_features(&self) -> usize {
        self.steps
            .first()
            .map(Apply::n_features)
            .unwrap_or(self.feature_names.len())
    }

    fn apply(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let mut steps = self.steps.iter();
        let Some(first) = steps.next() else {
            return Ok(data.to_owned());
        };
        let mut out = first.apply(data)?;
        for step in steps {
            out = step.apply(out.view())?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Observation, RowKey};
    use ndarray::array;

    fn table(values: &[f64]) -> Table {
        let observations = values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation {
                timestamp: RowKey::Text(format!("t{}", i)),
                values: vec![*v],
            })
            .collect();
        Table::from_observations(vec!["value".to_string()], observations).unwrap()
    }

    #[test]
    fn test_standard_pipeline_fit() {
        let fitted = Pipeline::standard().fit_table(&table(&[10.0, 20.0, 30.0])).unwrap();

        assert_eq!(fitted.feature_names, vec!["value".to_string()]);
        assert_eq!(fitted.n_features(), 1);
        let params = fitted.standard_params().unwrap();
        assert_eq!(params.mean, vec![20.0]);
        assert!((params.scale[0] - 8.165).abs() < 1e-3);
    }

    #[test]
    fn test_chained_steps_apply_in_order() {
        let pipeline = Pipeline::new(vec![
            TransformSpec::Standard(StandardScaler::default()),
            TransformSpec::Standard(StandardScaler::default()),
        ]);
        let data = table(&[1.0, 2.0, 3.0, 4.0]);
        let fitted = pipeline.fit_table(&data).unwrap();
        assert_eq!(fitted.steps.len(), 2);

        // The second step sees already-standardized data
        let FittedTransform::Standard(second) = &fitted.steps[1];
        assert!(second.mean[0].abs() < 1e-12);
        assert!((second.scale[0] - 1.0).abs() < 1e-12);

        let once = Pipeline::standard().fit_table(&data).unwrap();
        let a = fitted.transform(&data).unwrap();
        let b = once.transform(&data).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_pipeline_cannot_fit() {
        let err = Pipeline::new(Vec::new()).fit_table(&table(&[1.0])).unwrap_err();
        assert!(matches!(err, PreprocessError::Fit(_)));
    }

    #[test]
    fn test_fitted_transform_serde_is_tagged() {
        let fitted = Pipeline::standard().fit_table(&table(&[1.0, 3.0])).unwrap();
        let json = serde_json::to_value(&fitted).unwrap();
        assert_eq!(json["steps"][0]["kind"], "standard");
        assert_eq!(json["steps"][0]["mean"], serde_json::json!([2.0]));

        let back: FittedPipeline = serde_json::from_value(json).unwrap();
        assert_eq!(back, fitted);
        assert_eq!(back.apply(array![[3.0]].view()).unwrap(), array![[1.0]]);
    }
}

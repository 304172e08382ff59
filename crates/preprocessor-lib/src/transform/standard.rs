//! Feature standardization: `x -> (x - mean) / scale`
//!
//! The scale is the population standard deviation (divisor `n`). Columns
//! with a (near) zero standard deviation get a scale of `1.0`, so constant
//! features are centred but never divided by zero.

use super::{Apply, Fit};
use crate::error::{PreprocessError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Degrees of freedom removed from the variance divisor
const DDOF: f64 = 0.0;

/// Unfitted standardization step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub with_mean: bool,
    pub with_std: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self {
            with_mean: true,
            with_std: true,
        }
    }
}

/// Parameters learned by [`StandardScaler`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardParams {
    pub with_mean: bool,
    pub with_std: bool,
    pub mean: Vec<f64>,
    pub var: Vec<f64>,
    pub scale: Vec<f64>,
    pub n_samples_seen: usize,
}

impl Fit for StandardScaler {
    type Output = StandardParams;

    fn fit(&self, data: ArrayView2<'_, f64>) -> Result<StandardParams> {
        if data.nrows() == 0 {
            return Err(PreprocessError::Fit(
                "found array with 0 samples, at least 1 is required".to_string(),
            ));
        }
        if data.ncols() == 0 {
            return Err(PreprocessError::Fit(
                "found array with 0 features, at least 1 is required".to_string(),
            ));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(PreprocessError::Fit(
                "input contains NaN or infinite values".to_string(),
            ));
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| PreprocessError::Fit("cannot average an empty axis".to_string()))?;
        let var = data.var_axis(Axis(0), DDOF);
        let scale = var.mapv(|v| handle_zero_scale(v.sqrt()));

        Ok(StandardParams {
            with_mean: self.with_mean,
            with_std: self.with_std,
            mean: mean.to_vec(),
            var: var.to_vec(),
            scale: scale.to_vec(),
            n_samples_seen: data.nrows(),
        })
    }
}

impl Apply for StandardParams {
    fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn apply(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_features() {
            return Err(PreprocessError::FeatureMismatch {
                expected: self.n_features(),
                found: data.ncols(),
            });
        }

        let mut out = data.to_owned();
        if self.with_mean {
            out -= &ArrayView1::from(self.mean.as_slice());
        }
        if self.with_std {
            out /= &ArrayView1::from(self.scale.as_slice());
        }
        Ok(out)
    }
}

fn handle_zero_scale(std: f64) -> f64 {
    if std < 10.0 * f64::EPSILON {
        1.0
    } else {
        std
    }
}

//! Fixed bin edges of the predictive distribution.
//!
//! Cutpoints are validated once and then shared read-only between the model
//! and every histogram it produces. Nothing in the crate exposes a mutable
//! view of them.

use std::sync::Arc;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{DdrError, DdrResult};

/// Strictly increasing, finite bin edges c_0 < c_1 < ... < c_B (B ≥ 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Cutpoints {
    values: Arc<[f32]>,
}

impl Cutpoints {
    pub fn new(values: impl Into<Vec<f32>>) -> DdrResult<Self> {
        let values: Vec<f32> = values.into();
        if values.len() < 2 {
            return Err(DdrError::InvalidCutpoints(format!(
                "need at least 2 cutpoints (one bin), got {}",
                values.len()
            )));
        }
        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(DdrError::InvalidCutpoints(format!(
                "cutpoint {} is not finite: {}",
                i, v
            )));
        }
        if let Some(i) = values.windows(2).position(|w| w[1] <= w[0]) {
            return Err(DdrError::InvalidCutpoints(format!(
                "cutpoints must be strictly increasing: c[{}] = {} >= c[{}] = {}",
                i,
                values[i],
                i + 1,
                values[i + 1]
            )));
        }
        if let Some(i) = values.windows(2).position(|w| !(w[1] - w[0]).is_finite()) {
            return Err(DdrError::InvalidCutpoints(format!(
                "width of bin {} overflows: {} - {}",
                i,
                values[i + 1],
                values[i]
            )));
        }
        Ok(Self {
            values: values.into(),
        })
    }

    /// `num_bins` equal-width bins spanning [low, high].
    pub fn uniform(low: f32, high: f32, num_bins: usize) -> DdrResult<Self> {
        if num_bins == 0 {
            return Err(DdrError::InvalidDimension {
                name: "num_bins",
                value: 0,
            });
        }
        let step = (high - low) / num_bins as f32;
        let mut values: Vec<f32> = (0..num_bins).map(|k| low + step * k as f32).collect();
        values.push(high);
        Self::new(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn view(&self) -> ArrayView1<'_, f32> {
        ArrayView1::from(&self.values[..])
    }

    pub fn to_array(&self) -> Array1<f32> {
        Array1::from_vec(self.values.to_vec())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; a valid set holds at least two edges.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn num_bins(&self) -> usize {
        self.values.len() - 1
    }

    pub fn lower(&self) -> f32 {
        self.values[0]
    }

    pub fn upper(&self) -> f32 {
        self.values[self.values.len() - 1]
    }

    pub fn widths(&self) -> Array1<f32> {
        self.values.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn midpoints(&self) -> Array1<f32> {
        self.values.windows(2).map(|w| w[0] + 0.5 * (w[1] - w[0])).collect()
    }

    /// Bin containing `y`. Bins are half-open [c_k, c_{k+1}) except the
    /// last, which also contains the upper edge. `None` outside the support
    /// or for NaN.
    pub fn bin_index(&self, y: f32) -> Option<usize> {
        if y.is_nan() || y < self.lower() || y > self.upper() {
            return None;
        }
        let k = self.values.partition_point(|&c| c <= y);
        Some(k.saturating_sub(1).min(self.num_bins() - 1))
    }

    /// Whether both handles point at the same underlying storage.
    pub fn shares_storage(&self, other: &Cutpoints) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl TryFrom<Vec<f32>> for Cutpoints {
    type Error = DdrError;

    fn try_from(values: Vec<f32>) -> DdrResult<Self> {
        Self::new(values)
    }
}

impl From<Cutpoints> for Vec<f32> {
    fn from(c: Cutpoints) -> Self {
        c.values.to_vec()
    }
}

//! Elementwise nonlinearities and the row softmax that turns logits into
//! bin probabilities.

use ndarray::{Array2, Axis};

/// ReLU in place.
pub fn relu_inplace(x: &mut Array2<f32>) {
    x.mapv_inplace(|v| if v > 0.0 { v } else { 0.0 });
}

/// Softmax along the last axis (one categorical distribution per row).
///
/// Max-shifted for stability; the largest entry of every row contributes
/// exp(0) = 1, so the normaliser is never zero for finite logits. A row
/// holding inf or NaN logits has no usable normaliser and is replaced by the
/// uniform distribution, with a warning.
pub fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = logits.clone();
    for (i, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum: f32 = row.sum();
        if sum > 0.0 && sum.is_finite() {
            row /= sum;
        } else {
            tracing::warn!("softmax row {} is not normalisable (sum {}); using uniform", i, sum);
            let n = row.len() as f32;
            row.fill(1.0 / n);
        }
    }
    out
}

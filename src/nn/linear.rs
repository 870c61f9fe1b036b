//! Fully-connected affine layer: y = x · Wᵀ + b.

use ndarray::{Array1, Array2, ArrayView2};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Affine layer weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// Weight matrix: W ∈ R^{d_out × d_in}
    pub weight: Array2<f32>,

    /// Bias: b ∈ R^{d_out}
    pub bias: Array1<f32>,
}

impl Linear {
    pub fn zeros(d_in: usize, d_out: usize) -> Self {
        Self {
            weight: Array2::zeros((d_out, d_in)),
            bias: Array1::zeros(d_out),
        }
    }

    /// Uniform fan-in initialisation: W, b ~ U(-1/√d_in, 1/√d_in).
    pub fn init_uniform<R: Rng + ?Sized>(d_in: usize, d_out: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (d_in.max(1) as f32).sqrt();
        let dist = Uniform::new(-bound, bound);
        let weight = Array2::from_shape_fn((d_out, d_in), |_| dist.sample(rng));
        let bias = Array1::from_shape_fn(d_out, |_| dist.sample(rng));
        Self { weight, bias }
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    /// Batched forward: x is [N, d_in], result is [N, d_out].
    pub fn forward(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        x.dot(&self.weight.t()) + &self.bias
    }

    pub fn param_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    /// Whether the stored arrays agree with the given sizes.
    pub fn has_shape(&self, d_in: usize, d_out: usize) -> bool {
        self.weight.dim() == (d_out, d_in) && self.bias.len() == d_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zeros_gives_zero_output() {
        let layer = Linear::zeros(3, 2);
        let x = array![[1.0f32, 2.0, 3.0]];
        let y = layer.forward(&x.view());
        assert_eq!(y.dim(), (1, 2));
        assert!(y.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_affine_known_values() {
        let layer = Linear {
            weight: array![[1.0f32, 0.0], [1.0, -1.0], [0.5, 0.5]],
            bias: array![0.0f32, 1.0, -1.0],
        };
        let x = array![[2.0f32, 3.0], [0.0, 0.0]];
        let y = layer.forward(&x.view());
        assert_eq!(y, array![[2.0f32, 0.0, 1.5], [0.0, 1.0, -1.0]]);
    }

    #[test]
    fn test_init_within_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Linear::init_uniform(16, 4, &mut rng);
        let bound = 0.25;
        assert!(layer.weight.iter().all(|v| v.abs() <= bound));
        assert!(layer.bias.iter().all(|v| v.abs() <= bound));
        assert!(layer.weight.iter().any(|&v| v != 0.0));
        assert!(layer.has_shape(16, 4));
    }

    #[test]
    fn test_init_seeded_reproducible() {
        let a = Linear::init_uniform(5, 3, &mut StdRng::seed_from_u64(11));
        let b = Linear::init_uniform(5, 3, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn test_param_count() {
        let layer = Linear::zeros(100, 10);
        assert_eq!(layer.param_count(), 1010);
        assert_eq!(layer.in_features(), 100);
        assert_eq!(layer.out_features(), 10);
    }
}

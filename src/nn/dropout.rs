//! Inverted dropout with an explicit random source.
//!
//! In training mode each unit is zeroed with probability `rate` and the
//! survivors are scaled by 1/(1 - rate), so expected activations match eval
//! mode. In eval mode the layer is the identity and never draws randomness.

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DdrError, DdrResult};
use crate::nn::module::Mode;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dropout {
    rate: f32,
}

impl Dropout {
    pub fn new(rate: f32) -> DdrResult<Self> {
        if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
            return Err(DdrError::InvalidDropoutRate(rate));
        }
        Ok(Self { rate })
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn apply<R: Rng + ?Sized>(&self, x: &mut Array2<f32>, mode: Mode, rng: &mut R) {
        if !mode.is_training() || self.rate == 0.0 {
            return;
        }
        let keep = 1.0 - self.rate;
        let scale = 1.0 / keep;
        x.mapv_inplace(|v| {
            if rng.gen::<f32>() < keep {
                v * scale
            } else {
                0.0
            }
        });
    }
}

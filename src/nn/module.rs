//! Trainable-module capabilities.
//!
//! Parameter enumeration, train/eval mode, and device placement are three
//! independent traits. A model implements each one directly; there is no
//! base type to inherit from.

use ndarray::{ArrayViewD, ArrayViewMutD};
use serde::{Deserialize, Serialize};

use crate::error::DdrResult;
use crate::nn::device::Device;

/// Operational mode of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Stochastic regularisers (dropout) are active.
    #[default]
    Train,
    /// Deterministic evaluation.
    Eval,
}

impl Mode {
    pub fn is_training(self) -> bool {
        self == Mode::Train
    }
}

/// Enumerates trainable parameters under stable dotted names.
///
/// Non-trainable state (fixed cutpoints, for instance) must not appear here,
/// so that an optimiser built from this list never touches it.
pub trait Parameters {
    fn named_parameters(&self) -> Vec<(String, ArrayViewD<'_, f32>)>;

    fn named_parameters_mut(&mut self) -> Vec<(String, ArrayViewMutD<'_, f32>)>;

    /// Total number of trainable scalars.
    fn num_parameters(&self) -> usize {
        self.named_parameters().iter().map(|(_, p)| p.len()).sum()
    }
}

/// Caller-controlled train/eval switch.
pub trait ModeControl {
    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    fn train(&mut self) {
        self.set_mode(Mode::Train);
    }

    fn eval(&mut self) {
        self.set_mode(Mode::Eval);
    }

    fn is_training(&self) -> bool {
        self.mode().is_training()
    }
}

/// Device placement of a module's parameters.
pub trait Placement {
    fn device(&self) -> Device;

    /// Move the module. Fails without side effects if the device is unusable.
    fn to_device(&mut self, device: Device) -> DdrResult<()>;
}

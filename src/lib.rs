//! # DDR
//!
//! **Distributional density regression** — a feed-forward network that maps a
//! feature vector to a full predictive distribution over a real-valued
//! response, rather than a point estimate.
//!
//! The response range is cut into B bins by fixed cutpoints c_0 < ... < c_B.
//! The network emits one logit per bin; a softmax turns them into bin masses,
//! and the masses together with the cutpoints define a piecewise-constant
//! density (a [`histogram::Histogram`]) that supports log-likelihood, CDF and
//! quantiles, moments, and sampling.
//!
//! ## Layout
//!
//! - [`nn`] — affine layers, ReLU, softmax, dropout, and the capability
//!   traits ([`nn::Parameters`], [`nn::ModeControl`], [`nn::Placement`])
//! - [`model`] — cutpoints, [`model::DdrConfig`], the [`model::Ddr`] network,
//!   checkpoints
//! - [`histogram`] — the histogram distribution
//! - [`runtime`] — worker pool sizing and parallel ensembles
//!
//! ## Example
//!
//! ```no_run
//! use ddr::model::{Ddr, DdrConfig};
//! use ddr::nn::ModeControl;
//! use ndarray::array;
//!
//! let config = DdrConfig { hidden_size: 8, num_hidden_layers: 1, ..DdrConfig::new(3) };
//! let mut model = Ddr::with_cutpoints(config, vec![0.0, 1.0, 2.0, 3.0, 4.0])?;
//! model.eval();
//! let dists = model.distributions(&array![[0.1f32, -0.3, 1.2]])?;
//! let median = dists.quantile(0.5)?;
//! # Ok::<(), ddr::DdrError>(())
//! ```

pub mod error;
pub mod histogram;
pub mod model;
pub mod nn;
pub mod runtime;

pub use error::{DdrError, DdrResult};
pub use histogram::Histogram;
pub use model::{Cutpoints, Ddr, DdrConfig};

/// Library-wide defaults.
pub mod config {
    /// Number of (affine, ReLU, dropout) blocks.
    pub const DEFAULT_NUM_HIDDEN_LAYERS: usize = 2;

    /// Hidden width.
    pub const DEFAULT_HIDDEN_SIZE: usize = 100;

    /// Training-mode dropout probability.
    pub const DEFAULT_DROPOUT_RATE: f32 = 0.2;

    /// Global worker pool size. One worker keeps batched evaluation
    /// reproducible when callers parallelise across model instances.
    pub const DEFAULT_NUM_THREADS: usize = 1;

    /// Allowed deviation of a row of bin masses from a total of 1.
    pub const PROB_SUM_TOLERANCE: f32 = 1e-4;
}

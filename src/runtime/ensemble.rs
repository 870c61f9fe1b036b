//! Parallel evaluation of several DDR instances.
//!
//! Members share cutpoints and input dimension. Each member runs on its own
//! rayon task with its own seeded dropout source, and the member bin
//! probabilities are averaged into one equally weighted mixture.

use ndarray::{Array2, ArrayBase, Data, Ix2};
use rayon::prelude::*;

use crate::error::{DdrError, DdrResult};
use crate::histogram::Histogram;
use crate::model::config::DdrConfig;
use crate::model::cutpoints::Cutpoints;
use crate::model::ddr::{bind_histogram, dropout_rng, Ddr};
use crate::nn::module::{Mode, ModeControl};

pub struct DdrEnsemble {
    members: Vec<Ddr>,

    /// Base seed; member i draws dropout masks from the dropout stream of
    /// seed + i, separate from the stream that initialised it.
    seed: u64,
}

impl DdrEnsemble {
    pub fn new(members: Vec<Ddr>) -> DdrResult<Self> {
        let Some(first) = members.first() else {
            return Err(DdrError::InvalidEnsemble(
                "an ensemble needs at least one member".to_string(),
            ));
        };
        for (i, m) in members.iter().enumerate().skip(1) {
            if m.cutpoints().as_slice() != first.cutpoints().as_slice() {
                return Err(DdrError::InvalidEnsemble(format!(
                    "member {} has different cutpoints",
                    i
                )));
            }
            if m.p() != first.p() {
                return Err(DdrError::InvalidEnsemble(format!(
                    "member {} expects {} features, member 0 expects {}",
                    i,
                    m.p(),
                    first.p()
                )));
            }
        }
        let seed = first.config().seed;
        Ok(Self { members, seed })
    }

    /// `size` independently initialised members; member i is seeded with
    /// `config.seed + i`.
    pub fn from_config(config: &DdrConfig, cutpoints: &Cutpoints, size: usize) -> DdrResult<Self> {
        let members = (0..size)
            .map(|i| {
                let member_config = DdrConfig {
                    seed: config.seed.wrapping_add(i as u64),
                    ..config.clone()
                };
                Ddr::new(member_config, cutpoints.clone())
            })
            .collect::<DdrResult<Vec<_>>>()?;
        Self::new(members)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Ddr] {
        &self.members
    }

    pub fn cutpoints(&self) -> &Cutpoints {
        self.members[0].cutpoints()
    }

    /// Bin probabilities of every member, [N, B] each, computed in parallel.
    pub fn member_probs<S>(&self, x: &ArrayBase<S, Ix2>) -> DdrResult<Vec<Array2<f32>>>
    where
        S: Data<Elem = f32>,
    {
        let x = x.view();
        self.members
            .par_iter()
            .enumerate()
            .map(|(i, member)| {
                let mut rng = dropout_rng(self.seed.wrapping_add(i as u64));
                member.forward_with_rng(&x, &mut rng).map(|(_, probs)| probs)
            })
            .collect()
    }

    /// Mixture bin probabilities (member average), [N, B].
    pub fn forward<S>(&self, x: &ArrayBase<S, Ix2>) -> DdrResult<(Cutpoints, Array2<f32>)>
    where
        S: Data<Elem = f32>,
    {
        let per_member = self.member_probs(x)?;
        let mut mixture: Array2<f32> = Array2::zeros(per_member[0].raw_dim());
        for probs in &per_member {
            mixture += probs;
        }
        mixture /= per_member.len() as f32;
        Ok((self.cutpoints().clone(), mixture))
    }

    pub fn distributions<S>(&self, x: &ArrayBase<S, Ix2>) -> DdrResult<Histogram>
    where
        S: Data<Elem = f32>,
    {
        let (cutpoints, probs) = self.forward(x)?;
        bind_histogram(x.nrows(), cutpoints, probs)
    }
}

impl ModeControl for DdrEnsemble {
    fn mode(&self) -> Mode {
        self.members[0].mode()
    }

    fn set_mode(&mut self, mode: Mode) {
        for m in &mut self.members {
            m.set_mode(mode);
        }
    }
}

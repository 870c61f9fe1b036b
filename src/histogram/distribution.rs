//! Histogram distribution: a batch of N piecewise-constant densities that
//! share one set of cutpoints.
//!
//! Member i puts mass p[i, k] on bin k = [c_k, c_{k+1}), so its density on
//! that bin is p[i, k] / (c_{k+1} - c_k). The CDF is piecewise linear and
//! its inverse is computed bin by bin.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::config::PROB_SUM_TOLERANCE;
use crate::error::{DdrError, DdrResult};
use crate::model::cutpoints::Cutpoints;

#[derive(Clone, Debug)]
pub struct Histogram {
    cutpoints: Cutpoints,

    /// Bin masses, [N, B].
    probs: Array2<f32>,

    /// Bin widths, [B].
    widths: Array1<f32>,
}

impl Histogram {
    /// Bind cutpoints and per-row bin masses into a distribution batch.
    pub fn new(cutpoints: Cutpoints, probs: Array2<f32>) -> DdrResult<Self> {
        let (n, b) = probs.dim();
        if b != cutpoints.num_bins() {
            return Err(DdrError::shape(
                "histogram",
                format!("(N, {}) bin probabilities", cutpoints.num_bins()),
                format!("({}, {})", n, b),
            ));
        }
        if n == 0 {
            return Err(DdrError::EmptyBatch);
        }

        for (row, masses) in probs.axis_iter(Axis(0)).enumerate() {
            if let Some(v) = masses.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(DdrError::InvalidProbabilities {
                    row,
                    reason: format!("entry {} is negative or not finite", v),
                });
            }
            let sum: f32 = masses.sum();
            if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
                return Err(DdrError::InvalidProbabilities {
                    row,
                    reason: format!("masses sum to {}", sum),
                });
            }
        }

        let widths = cutpoints.widths();
        Ok(Self {
            cutpoints,
            probs,
            widths,
        })
    }

    /// Number of independent distributions, as a shape.
    pub fn batch_shape(&self) -> [usize; 1] {
        [self.probs.nrows()]
    }

    pub fn batch_size(&self) -> usize {
        self.probs.nrows()
    }

    pub fn num_bins(&self) -> usize {
        self.probs.ncols()
    }

    pub fn cutpoints(&self) -> &Cutpoints {
        &self.cutpoints
    }

    pub fn probs(&self) -> &Array2<f32> {
        &self.probs
    }

    pub fn bin_widths(&self) -> &Array1<f32> {
        &self.widths
    }

    /// Per-bin density heights, [N, B].
    pub fn densities(&self) -> Array2<f32> {
        &self.probs / &self.widths
    }

    fn check_batch_len(&self, context: &'static str, len: usize) -> DdrResult<()> {
        if len != self.batch_size() {
            return Err(DdrError::shape(
                context,
                format!("{} values (one per batch member)", self.batch_size()),
                len,
            ));
        }
        Ok(())
    }

    fn row_log_prob(&self, row: usize, y: f32) -> f32 {
        if y.is_nan() {
            return f32::NAN;
        }
        match self.cutpoints.bin_index(y) {
            Some(k) => (self.probs[[row, k]] / self.widths[k]).ln(),
            None => f32::NEG_INFINITY,
        }
    }

    /// Log density of member i at y[i]. Outside the support: -inf.
    pub fn log_prob(&self, y: &ArrayView1<f32>) -> DdrResult<Array1<f32>> {
        self.check_batch_len("log_prob", y.len())?;
        Ok(y.iter()
            .enumerate()
            .map(|(i, &v)| self.row_log_prob(i, v))
            .collect())
    }

    /// Density of member i at y[i].
    pub fn prob(&self, y: &ArrayView1<f32>) -> DdrResult<Array1<f32>> {
        Ok(self.log_prob(y)?.mapv(f32::exp))
    }

    /// Log densities of every member at every point, [N, M].
    pub fn log_prob_grid(&self, points: &[f32]) -> Array2<f32> {
        Array2::from_shape_fn((self.batch_size(), points.len()), |(i, j)| {
            self.row_log_prob(i, points[j])
        })
    }

    /// Average negative log-likelihood of a response batch.
    pub fn mean_nll(&self, y: &ArrayView1<f32>) -> DdrResult<f32> {
        let lp = self.log_prob(y)?;
        Ok(-lp.sum() / lp.len() as f32)
    }

    fn row_cdf(&self, row: usize, y: f32) -> f32 {
        if y.is_nan() {
            return f32::NAN;
        }
        if y <= self.cutpoints.lower() {
            return 0.0;
        }
        if y >= self.cutpoints.upper() {
            return 1.0;
        }
        let cuts = self.cutpoints.as_slice();
        match self.cutpoints.bin_index(y) {
            Some(k) => {
                let below: f32 = self.probs.row(row).iter().take(k).sum();
                let partial = self.probs[[row, k]] * (y - cuts[k]) / self.widths[k];
                (below + partial).min(1.0)
            }
            None => 1.0,
        }
    }

    /// CDF of member i at y[i].
    pub fn cdf(&self, y: &ArrayView1<f32>) -> DdrResult<Array1<f32>> {
        self.check_batch_len("cdf", y.len())?;
        Ok(y.iter()
            .enumerate()
            .map(|(i, &v)| self.row_cdf(i, v))
            .collect())
    }

    fn row_icdf(&self, row: usize, q: f32) -> f32 {
        let cuts = self.cutpoints.as_slice();
        let mut cum = 0.0f32;
        let mut last_upper = self.cutpoints.upper();
        for (k, &p) in self.probs.row(row).iter().enumerate() {
            if p <= 0.0 {
                continue;
            }
            last_upper = cuts[k + 1];
            if cum + p >= q {
                let frac = ((q - cum) / p).clamp(0.0, 1.0);
                return cuts[k] + frac * self.widths[k];
            }
            cum += p;
        }
        // rounding left the total mass just below q
        last_upper
    }

    /// Inverse CDF of member i at level q[i].
    pub fn icdf(&self, q: &ArrayView1<f32>) -> DdrResult<Array1<f32>> {
        self.check_batch_len("icdf", q.len())?;
        if let Some(&bad) = q.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(DdrError::InvalidQuantile(bad));
        }
        Ok(q.iter()
            .enumerate()
            .map(|(i, &level)| self.row_icdf(i, level))
            .collect())
    }

    /// The same quantile level for every member.
    pub fn quantile(&self, level: f32) -> DdrResult<Array1<f32>> {
        if !(0.0..=1.0).contains(&level) {
            return Err(DdrError::InvalidQuantile(level));
        }
        Ok((0..self.batch_size())
            .map(|i| self.row_icdf(i, level))
            .collect())
    }

    /// One draw per member: pick a bin by its mass, then a uniform point in it.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DdrResult<Array1<f32>> {
        let cuts = self.cutpoints.as_slice();
        let mut out = Array1::zeros(self.batch_size());
        for (i, masses) in self.probs.axis_iter(Axis(0)).enumerate() {
            let bins = WeightedIndex::<f32>::new(masses.iter()).map_err(|e| {
                DdrError::InvalidProbabilities {
                    row: i,
                    reason: e.to_string(),
                }
            })?;
            let k = bins.sample(rng);
            out[i] = cuts[k] + rng.gen::<f32>() * self.widths[k];
        }
        Ok(out)
    }

    /// `n` independent draws per member, [n, N].
    pub fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> DdrResult<Array2<f32>> {
        let mut out = Array2::zeros((n, self.batch_size()));
        for mut row in out.axis_iter_mut(Axis(0)) {
            row.assign(&self.sample(rng)?);
        }
        Ok(out)
    }

    pub fn mean(&self) -> Array1<f32> {
        self.probs.dot(&self.cutpoints.midpoints())
    }

    /// Variance of the piecewise-uniform mixture:
    ///   Σ p_k (m_k² + w_k²/12) − mean²
    pub fn variance(&self) -> Array1<f32> {
        let mids = self.cutpoints.midpoints();
        let second: Array1<f32> = &mids * &mids + &self.widths.mapv(|w| w * w / 12.0);
        let mean = self.mean();
        (self.probs.dot(&second) - &mean * &mean).mapv(|v| v.max(0.0))
    }

    pub fn stddev(&self) -> Array1<f32> {
        self.variance().mapv(f32::sqrt)
    }

    /// Differential entropy: −Σ p_k ln(p_k / w_k), empty bins contribute 0.
    pub fn entropy(&self) -> Array1<f32> {
        self.probs
            .axis_iter(Axis(0))
            .map(|masses| {
                -masses
                    .iter()
                    .zip(self.widths.iter())
                    .filter(|(p, _)| **p > 0.0)
                    .map(|(&p, &w)| p * (p / w).ln())
                    .sum::<f32>()
            })
            .collect()
    }

    /// Midpoint of the highest-density bin.
    pub fn mode(&self) -> Array1<f32> {
        let mids = self.cutpoints.midpoints();
        self.densities()
            .axis_iter(Axis(0))
            .map(|dens| {
                let k = dens
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(k, _)| k)
                    .unwrap_or(0);
                mids[k]
            })
            .collect()
    }
}

//! Histogram distribution over fixed cutpoints.

pub mod distribution;

pub use distribution::Histogram;

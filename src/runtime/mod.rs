//! Runtime — worker pool sizing and multi-instance evaluation.

pub mod ensemble;
pub mod threads;

pub use ensemble::DdrEnsemble;
pub use threads::{configure_threads, current_threads};

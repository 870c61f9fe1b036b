//! DDR model — cutpoints, configuration, network, and checkpoints.

pub mod checkpoint;
pub mod config;
pub mod cutpoints;
pub mod ddr;

pub use config::DdrConfig;
pub use cutpoints::Cutpoints;
pub use ddr::Ddr;

//! Network building blocks and the trainable-module capability traits.

pub mod activation;
pub mod device;
pub mod dropout;
pub mod linear;
pub mod module;

pub use device::Device;
pub use module::{Mode, ModeControl, Parameters, Placement};

//! Compute device placement.
//!
//! The CPU is always available. Accelerator variants exist only when the
//! matching cargo feature is enabled; this build ships no kernels for them,
//! so placement onto one is reported as unavailable:
//!   CUDA → HIP → CPU (always available).

use serde::{Deserialize, Serialize};

use crate::error::{DdrError, DdrResult};

/// Where a module's parameters live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    #[cfg(feature = "cuda")]
    Cuda,
    #[cfg(feature = "hip")]
    Hip,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "CPU"),
            #[cfg(feature = "cuda")]
            Device::Cuda => write!(f, "CUDA"),
            #[cfg(feature = "hip")]
            Device::Hip => write!(f, "HIP"),
        }
    }
}

impl Device {
    /// Whether a backend for this device exists at runtime.
    pub fn is_available(&self) -> bool {
        match self {
            Device::Cpu => true,
            #[cfg(feature = "cuda")]
            Device::Cuda => false,
            #[cfg(feature = "hip")]
            Device::Hip => false,
        }
    }

    /// Fail with [`DdrError::DeviceUnavailable`] unless the device is usable.
    pub fn ensure_available(&self) -> DdrResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(DdrError::DeviceUnavailable(self.to_string()))
        }
    }
}

/// Best available device, in preference order.
pub fn detect_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if Device::Cuda.is_available() {
            return Device::Cuda;
        }
    }
    #[cfg(feature = "hip")]
    {
        if Device::Hip.is_available() {
            return Device::Hip;
        }
    }
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_device_cpu() {
        assert_eq!(detect_device(), Device::Cpu);
    }

    #[test]
    fn test_cpu_available() {
        assert!(Device::Cpu.ensure_available().is_ok());
    }

    #[test]
    fn test_device_display() {
        assert_eq!(format!("{}", Device::Cpu), "CPU");
    }
}

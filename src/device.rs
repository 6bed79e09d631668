//! Compute placement tags.
//!
//! Every tensor, bounds pair and classifier carries a [`Device`]. Kernels
//! run host-side regardless of the tag; the tag records where an operand was
//! placed so that mixing placements is caught instead of silently coerced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FgsmError, Result};

/// Placement of a tensor or model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Device {
    /// General-purpose processor.
    #[default]
    Cpu,
    /// Accelerator with the given ordinal.
    Accelerator(usize),
}

impl Device {
    /// Check that `other` sits on the same device as `self`.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::DeviceMismatch`] naming `context` when they differ.
    pub fn ensure_same(self, other: Device, context: &str) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(FgsmError::DeviceMismatch {
                context: context.to_string(),
                expected: self,
                found: other,
            })
        }
    }

    /// True for the host processor.
    #[must_use]
    pub fn is_cpu(self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Accelerator(ordinal) => write!(f, "accel:{ordinal}"),
        }
    }
}

impl FromStr for Device {
    type Err = FgsmError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "accel" => Ok(Device::Accelerator(0)),
            other => other
                .strip_prefix("accel:")
                .and_then(|ordinal| ordinal.parse().ok())
                .map(Device::Accelerator)
                .ok_or_else(|| {
                    FgsmError::invalid_hyperparameter("device", other, "cpu, accel or accel:N")
                }),
        }
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

impl TryFrom<String> for Device {
    type Error = FgsmError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

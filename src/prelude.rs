//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use fgsm::prelude::*;
//! ```

pub use crate::attack::{perturb, AttackReport, AttackResult, FgsmAttack};
pub use crate::autograd::{GradContext, Tensor};
pub use crate::classifier::{top1, Classifier, ModuleClassifier, Target};
pub use crate::device::Device;
pub use crate::error::{FgsmError, Result};
pub use crate::labels::LabelTable;
pub use crate::models::TinyConvNet;
pub use crate::nn::Module;
pub use crate::normalization::{Bounds, Normalization};

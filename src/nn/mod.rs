//! Neural network modules for image classifiers.
//!
//! The nn module is organized around the [`Module`] trait:
//!
//! - **Layers**: [`Linear`], [`Conv2d`], [`Flatten`]
//! - **Pooling**: [`GlobalAvgPool2d`]
//! - **Activations**: [`ReLU`]
//! - **Regularization**: [`Dropout`]
//! - **Containers**: [`Sequential`]
//! - **Loss**: [`loss::CrossEntropyLoss`]
//!
//! Layer parameters are plain tensors that are never attached to a
//! [`GradContext`](crate::autograd::GradContext), so evaluating a module
//! records nothing unless its input was watched.
//!
//! # References
//!
//! - Paszke, A., et al. (2019). `PyTorch`: An imperative style, high-performance
//!   deep learning library. `NeurIPS`.

mod activation;
mod container;
mod conv;
mod dropout;
pub mod init;
mod linear;
pub mod loss;
mod module;

pub use activation::ReLU;
pub use container::Sequential;
pub use conv::{Conv2d, Flatten, GlobalAvgPool2d};
pub use dropout::Dropout;
pub use linear::Linear;
pub use module::Module;

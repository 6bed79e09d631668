//! Reverse-mode automatic differentiation for attack gradients.
//!
//! This module implements tape-based automatic differentiation following the
//! methodology described in Baydin et al. (2018) and Griewank & Walther (2008).
//!
//! # Architecture
//!
//! The engine uses a define-by-run (dynamic) computational graph:
//! - A [`GradContext`] owns the tape; nothing is recorded globally
//! - [`GradContext::watch`] attaches a leaf tensor to the tape
//! - Operations touching a watched tensor record themselves on that tape
//! - [`Tensor::backward`] walks the tape in reverse and stores gradients
//!   for watched leaves only
//!
//! Tensors that were never attached to a context (model parameters, inputs
//! evaluated for inference) record nothing, so no `no_grad` switch exists.
//!
//! # Example
//!
//! ```
//! use fgsm::autograd::{GradContext, Tensor};
//!
//! let ctx = GradContext::new();
//! let x = ctx.watch(&Tensor::from_slice(&[1.0, 2.0, 3.0]));
//! let w = Tensor::from_slice(&[0.5, -1.0, 2.0]);
//!
//! let y = x.mul(&w).sum();
//! y.backward();
//!
//! assert_eq!(ctx.grad(&x).unwrap().data(), &[0.5, -1.0, 2.0]);
//! ```
//!
//! # References
//!
//! - Baydin, A. G., et al. (2018). Automatic differentiation in machine learning: a survey. JMLR.
//! - Rumelhart, D. E., et al. (1986). Learning representations by back-propagating errors. Nature.
//! - Griewank, A., & Walther, A. (2008). Evaluating derivatives. SIAM.

pub(crate) mod grad_fn;
mod graph;
mod ops;
mod tensor;

pub use grad_fn::GradFn;
pub use graph::{ComputationGraph, GradContext};
pub use tensor::{Tensor, TensorId};

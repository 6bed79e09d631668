//! The `Module` trait shared by every layer.

use crate::autograd::Tensor;

/// A neural network building block.
///
/// Modules are `Send + Sync` so a trained network can be shared by
/// reference across threads. `forward` takes `&self`: evaluating a module
/// never mutates it, and gradient state lives in the caller's
/// [`GradContext`](crate::autograd::GradContext), not in the module.
pub trait Module: Send + Sync {
    /// Compute the output for `input`.
    fn forward(&self, input: &Tensor) -> Tensor;

    /// Learnable parameters, in a stable order.
    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    /// Mutable access to learnable parameters, same order as `parameters`.
    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    /// Switch to training mode (stochastic layers active).
    fn train(&mut self) {}

    /// Switch to evaluation mode (deterministic forward).
    fn eval(&mut self) {}

    /// Whether the module is in training mode.
    fn training(&self) -> bool {
        false
    }

    /// Total number of scalar parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }
}

//! Activation functions as modules.

use super::module::Module;
use crate::autograd::Tensor;

/// Rectified Linear Unit: `max(0, x)`.
///
/// Stateless; the gradient is 1 where the input is positive and 0
/// elsewhere (including at exactly 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl ReLU {
    /// Create a new `ReLU` activation.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Module for ReLU {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.relu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relu_forward() {
        let relu = ReLU::new();
        let x = Tensor::from_slice(&[-2.0, 0.0, 1.5]);
        assert_eq!(relu.forward(&x).data(), &[0.0, 0.0, 1.5]);
    }

    #[test]
    fn test_relu_has_no_parameters() {
        assert_eq!(ReLU::new().num_parameters(), 0);
        assert!(!ReLU::new().training());
    }
}

//! Loss functions.
//!
//! # Example
//!
//! ```
//! use fgsm::autograd::{GradContext, Tensor};
//! use fgsm::nn::loss::CrossEntropyLoss;
//!
//! let ctx = GradContext::new();
//! let logits = ctx.watch(&Tensor::new(&[1.0, 2.0, 0.5], &[1, 3]));
//! let loss = CrossEntropyLoss::new().forward(&logits, &[1]);
//! loss.backward();
//!
//! let grad = ctx.grad(&logits).unwrap();
//! assert!(grad.data()[1] < 0.0);
//! ```
//!
//! # References
//!
//! - Bishop, C. M. (2006). Pattern Recognition and Machine Learning. Springer.

use std::sync::Arc;

use crate::autograd::grad_fn::CrossEntropyBackward;
use crate::autograd::Tensor;

/// Reduction mode for loss functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// Return loss per element (no reduction)
    None,
    /// Return mean of losses (default)
    #[default]
    Mean,
    /// Return sum of losses
    Sum,
}

/// Cross-entropy loss over raw logits (log-softmax + negative log likelihood).
///
/// Gradient: ∂L/∂logits = softmax(logits) - `one_hot(target)`, scaled by
/// `1/batch` under [`Reduction::Mean`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
}

impl CrossEntropyLoss {
    /// Create a loss with mean reduction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loss with the given reduction.
    #[must_use]
    pub fn with_reduction(reduction: Reduction) -> Self {
        Self { reduction }
    }

    /// Compute cross-entropy loss.
    ///
    /// # Arguments
    ///
    /// * `logits` - Shape [batch, num_classes]
    /// * `targets` - One class index per batch row
    ///
    /// # Panics
    ///
    /// Panics on a shape mismatch or a target outside `[0, num_classes)`.
    #[must_use]
    pub fn forward(&self, logits: &Tensor, targets: &[usize]) -> Tensor {
        assert_eq!(logits.ndim(), 2, "Logits must be 2D [batch, classes]");
        assert_eq!(logits.shape()[0], targets.len(), "Batch sizes must match");

        let batch_size = logits.shape()[0];
        let num_classes = logits.shape()[1];
        for &t in targets {
            assert!(
                t < num_classes,
                "Target class {t} out of bounds for {num_classes} classes"
            );
        }

        let softmax_output = softmax_2d(logits);
        let log_probs = log_softmax(logits);

        let losses: Vec<f32> = targets
            .iter()
            .enumerate()
            .map(|(b, &t)| -log_probs[b * num_classes + t])
            .collect();

        let loss = match self.reduction {
            Reduction::None => Tensor::from_vec(losses, &[batch_size]),
            Reduction::Mean => {
                let mean_val = losses.iter().sum::<f32>() / batch_size as f32;
                Tensor::from_slice(&[mean_val])
            }
            Reduction::Sum => Tensor::from_slice(&[losses.iter().sum::<f32>()]),
        };

        let reduction = self.reduction;
        loss.placed(logits.device()).record_op(&[logits], || {
            Arc::new(CrossEntropyBackward {
                softmax_output,
                targets: targets.to_vec(),
                mean: reduction == Reduction::Mean,
                per_sample: reduction == Reduction::None,
            })
        })
    }
}

/// Row-wise softmax of a 2D tensor.
pub(crate) fn softmax_2d(x: &Tensor) -> Tensor {
    assert_eq!(x.ndim(), 2);

    let features = x.shape()[1];
    let mut output = Vec::with_capacity(x.numel());

    for row in x.data().chunks(features) {
        let max_val = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let exps: Vec<f32> = row.iter().map(|&v| (v - max_val).exp()).collect();
        let sum: f32 = exps.iter().sum();
        output.extend(exps.into_iter().map(|e| e / sum));
    }

    Tensor::from_vec(output, x.shape())
}

fn log_softmax(x: &Tensor) -> Vec<f32> {
    let features = x.shape()[1];
    let mut output = Vec::with_capacity(x.numel());

    for row in x.data().chunks(features) {
        let max_val = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let log_sum_exp = row
            .iter()
            .map(|&v| (v - max_val).exp())
            .sum::<f32>()
            .ln();
        output.extend(row.iter().map(|&v| v - max_val - log_sum_exp));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::GradContext;

    #[test]
    fn test_cross_entropy_value() {
        // Uniform logits over 4 classes: loss = ln(4)
        let loss = CrossEntropyLoss::new().forward(&Tensor::zeros(&[1, 4]), &[2]);
        assert!((loss.item() - 4.0_f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_large_logits_stable() {
        let logits = Tensor::new(&[1000.0, 0.0], &[1, 2]);
        let loss = CrossEntropyLoss::new().forward(&logits, &[0]);
        assert!(loss.item().is_finite());
        assert!(loss.item() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_gradient() {
        let ctx = GradContext::new();
        let logits = ctx.watch(&Tensor::new(&[0.0, 0.0], &[1, 2]));
        CrossEntropyLoss::new().forward(&logits, &[0]).backward();

        let grad = ctx.grad(&logits).unwrap();
        assert!((grad.data()[0] + 0.5).abs() < 1e-6);
        assert!((grad.data()[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_reductions() {
        let logits = Tensor::new(&[2.0, 0.0, 0.0, 2.0], &[2, 2]);
        let none = CrossEntropyLoss::with_reduction(Reduction::None).forward(&logits, &[0, 0]);
        let sum = CrossEntropyLoss::with_reduction(Reduction::Sum).forward(&logits, &[0, 0]);
        let mean = CrossEntropyLoss::new().forward(&logits, &[0, 0]);

        assert_eq!(none.shape(), &[2]);
        let total: f32 = none.data().iter().sum();
        assert!((sum.item() - total).abs() < 1e-6);
        assert!((mean.item() - total / 2.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_cross_entropy_bad_target() {
        let _ = CrossEntropyLoss::new().forward(&Tensor::zeros(&[1, 3]), &[3]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let s = softmax_2d(&Tensor::new(&[1.0, 2.0, 3.0, -1.0, 0.0, 1.0], &[2, 3]));
        for row in s.data().chunks(3) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
    }
}

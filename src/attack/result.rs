use crate::autograd::Tensor;

/// Outcome of one FGSM step.
///
/// `success` is derived from the two predictions and never stored on its
/// own, so the three can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackResult {
    adversarial: Tensor,
    clean_pred: usize,
    adv_pred: usize,
    target: usize,
    epsilon: f32,
}

impl AttackResult {
    pub(crate) fn new(
        adversarial: Tensor,
        clean_pred: usize,
        adv_pred: usize,
        target: usize,
        epsilon: f32,
    ) -> Self {
        Self {
            adversarial,
            clean_pred,
            adv_pred,
            target,
            epsilon,
        }
    }

    /// Adversarial image in normalized space, clamped into the bounds.
    #[must_use]
    pub fn adversarial_image(&self) -> &Tensor {
        &self.adversarial
    }

    /// Take ownership of the adversarial image.
    #[must_use]
    pub fn into_adversarial_image(self) -> Tensor {
        self.adversarial
    }

    /// Top-1 class of the clean image.
    #[must_use]
    pub fn clean_prediction(&self) -> usize {
        self.clean_pred
    }

    /// Top-1 class of the adversarial image.
    #[must_use]
    pub fn adversarial_prediction(&self) -> usize {
        self.adv_pred
    }

    /// Class the loss was ascended against.
    #[must_use]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Epsilon used for the step.
    #[must_use]
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// True when the adversarial prediction differs from the clean one.
    #[must_use]
    pub fn success(&self) -> bool {
        self.adv_pred != self.clean_pred
    }
}

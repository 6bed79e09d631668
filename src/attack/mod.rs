//! Fast Gradient Sign Method.
//!
//! One step of FGSM in normalized space:
//!
//! ```text
//! adv = clamp(image + ε · sign(∇ₓ CE(f(image), target)), min, max)
//! ```
//!
//! The sign bounds the perturbation to an L∞ ball of radius ε regardless of
//! the gradient's magnitude. `sign(0) = 0`, so a flat loss leaves the image
//! untouched.
//!
//! # Example
//!
//! ```
//! use fgsm::attack::FgsmAttack;
//! use fgsm::autograd::Tensor;
//! use fgsm::classifier::ModuleClassifier;
//! use fgsm::models::TinyConvNet;
//! use fgsm::normalization::Normalization;
//!
//! let classifier = ModuleClassifier::new(TinyConvNet::seeded(10, 7));
//! let bounds = Normalization::imagenet().bounds();
//! let attack = FgsmAttack::new(&classifier, 0.05, &bounds).unwrap();
//!
//! let image = Tensor::zeros(&[1, 3, 16, 16]);
//! let result = attack.run(&image, None).unwrap();
//! assert!(bounds.contains(result.adversarial_image()).unwrap());
//! assert_eq!(result.success(), result.clean_prediction() != result.adversarial_prediction());
//! ```
//!
//! # References
//!
//! - Goodfellow, I. J., Shlens, J., & Szegedy, C. (2015). Explaining and
//!   harnessing adversarial examples. ICLR.

mod report;
mod result;

pub use report::AttackReport;
pub use result::AttackResult;

use tracing::{debug, trace};

use crate::autograd::{GradContext, Tensor};
use crate::classifier::{top1, Classifier, InputGradient, Target};
use crate::error::{FgsmError, Result};
use crate::normalization::Bounds;

/// A single-step FGSM attack bound to one classifier, epsilon and bounds.
///
/// The engine holds no per-image state and can be reused across images and
/// shared between threads.
#[derive(Debug)]
pub struct FgsmAttack<'a, C: Classifier + ?Sized> {
    classifier: &'a C,
    epsilon: f32,
    bounds: &'a Bounds,
}

impl<'a, C: Classifier + ?Sized> FgsmAttack<'a, C> {
    /// Bind an attack to `classifier`, `epsilon` and `bounds`.
    ///
    /// # Errors
    ///
    /// - [`FgsmError::InvalidHyperparameter`] if `epsilon` is negative or
    ///   not finite
    /// - [`FgsmError::ClassifierInTrainingMode`] if the classifier has
    ///   stochastic layers active
    /// - [`FgsmError::DeviceMismatch`] if classifier and bounds live on
    ///   different devices
    pub fn new(classifier: &'a C, epsilon: f32, bounds: &'a Bounds) -> Result<Self> {
        validate_epsilon(epsilon)?;
        if classifier.is_training() {
            return Err(FgsmError::ClassifierInTrainingMode);
        }
        classifier
            .device()
            .ensure_same(bounds.device(), "classifier vs bounds")?;

        Ok(Self {
            classifier,
            epsilon,
            bounds,
        })
    }

    /// Perturbation budget in normalized-space units.
    #[must_use]
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Bounds adversarial images are clamped into.
    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        self.bounds
    }

    /// The attacked classifier.
    #[must_use]
    pub fn classifier(&self) -> &C {
        self.classifier
    }

    /// Attack one `(1, C, H, W)` normalized image.
    ///
    /// With `label = None` the loss ascends away from the classifier's own
    /// clean prediction; with `Some(label)` it ascends away from that
    /// ground-truth class. A fresh [`GradContext`] is used for the call.
    ///
    /// # Errors
    ///
    /// See [`run_with_context`](Self::run_with_context).
    pub fn run(&self, image: &Tensor, label: Option<usize>) -> Result<AttackResult> {
        let mut ctx = GradContext::new();
        self.run_with_context(&mut ctx, image, label)
    }

    /// Attack one image, recording the gradient pass on `ctx`.
    ///
    /// `ctx` is reset before use. Every validation happens before the
    /// classifier is called.
    ///
    /// # Errors
    ///
    /// - [`FgsmError::InvalidShape`] unless the image is rank 4 with batch 1,
    ///   the bounds' channel count and a non-empty spatial extent
    /// - [`FgsmError::DeviceMismatch`] if the image is not on the
    ///   classifier's device
    /// - [`FgsmError::LabelOutOfRange`] if `label` is not a valid class
    /// - [`FgsmError::ClassifierInTrainingMode`] if the classifier was
    ///   switched to training mode after construction
    pub fn run_with_context(
        &self,
        ctx: &mut GradContext,
        image: &Tensor,
        label: Option<usize>,
    ) -> Result<AttackResult> {
        self.validate(image, label)?;

        let target = label.map_or(Target::Predicted, Target::Label);
        let InputGradient {
            prediction: clean_pred,
            target: target_class,
            gradient,
            ..
        } = self.classifier.input_gradient(ctx, image, target)?;
        trace!(
            target = target_class,
            nonzero = gradient.data().iter().filter(|&&g| g != 0.0).count(),
            "input gradient"
        );

        let perturbed = perturb(image, &gradient, self.epsilon)?;
        let adversarial = self.bounds.clamp(&perturbed)?;

        let adv_pred = top1(&self.classifier.forward(&adversarial))?;
        debug!(
            clean_pred,
            adv_pred,
            epsilon = self.epsilon,
            success = adv_pred != clean_pred,
            "fgsm step"
        );

        Ok(AttackResult::new(
            adversarial,
            clean_pred,
            adv_pred,
            target_class,
            self.epsilon,
        ))
    }

    fn validate(&self, image: &Tensor, label: Option<usize>) -> Result<()> {
        let shape = image.shape();
        if shape.len() != 4 || shape[0] != 1 {
            return Err(FgsmError::invalid_shape(
                "(1, C, H, W) with batch size 1",
                shape,
            ));
        }
        if shape[1] != self.bounds.channels() {
            return Err(FgsmError::invalid_shape(
                &format!("(1, {}, H, W)", self.bounds.channels()),
                shape,
            ));
        }
        if shape[2] == 0 || shape[3] == 0 {
            return Err(FgsmError::invalid_shape(
                "(1, C, H, W) with H, W > 0",
                shape,
            ));
        }
        self.classifier
            .device()
            .ensure_same(image.device(), "classifier vs image")?;
        if self.classifier.is_training() {
            return Err(FgsmError::ClassifierInTrainingMode);
        }
        if let Some(label) = label {
            let num_classes = self.classifier.num_classes();
            if label >= num_classes {
                return Err(FgsmError::LabelOutOfRange { label, num_classes });
            }
        }
        Ok(())
    }
}

/// The unclamped FGSM step: `image + epsilon * sign(gradient)`.
///
/// `sign(0) = 0`. The result is detached and lives on the image's device.
///
/// # Errors
///
/// - [`FgsmError::InvalidHyperparameter`] for a negative or non-finite
///   `epsilon`
/// - [`FgsmError::InvalidShape`] if the gradient's shape differs from the
///   image's
/// - [`FgsmError::DeviceMismatch`] if they live on different devices
///
/// # Example
///
/// ```
/// use fgsm::attack::perturb;
/// use fgsm::autograd::Tensor;
///
/// let image = Tensor::from_slice(&[0.0, 0.0, 0.0]);
/// let grad = Tensor::from_slice(&[3.0, 0.0, -0.01]);
/// let adv = perturb(&image, &grad, 0.5).unwrap();
/// assert_eq!(adv.data(), &[0.5, 0.0, -0.5]);
/// ```
pub fn perturb(image: &Tensor, gradient: &Tensor, epsilon: f32) -> Result<Tensor> {
    validate_epsilon(epsilon)?;
    if gradient.shape() != image.shape() {
        return Err(FgsmError::invalid_shape(
            &format!("gradient of shape {:?}", image.shape()),
            gradient.shape(),
        ));
    }
    image
        .device()
        .ensure_same(gradient.device(), "image vs gradient")?;

    Ok(image
        .detach()
        .add(&gradient.sign().mul_scalar(epsilon)))
}

fn validate_epsilon(epsilon: f32) -> Result<()> {
    if epsilon.is_finite() && epsilon >= 0.0 {
        Ok(())
    } else {
        Err(FgsmError::invalid_hyperparameter(
            "epsilon",
            epsilon,
            "a finite value >= 0",
        ))
    }
}

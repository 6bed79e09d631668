//! The classifier capability consumed by attacks.
//!
//! A [`Classifier`] maps a `(1, C, H, W)` image to `(1, K)` logits and can
//! differentiate the cross-entropy loss with respect to its input. The
//! default [`Classifier::input_gradient`] runs the bundled autograd engine;
//! a classifier backed by another engine overrides it.

use crate::autograd::{GradContext, Tensor};
use crate::device::Device;
use crate::error::{FgsmError, Result};
use crate::nn::loss::CrossEntropyLoss;
use crate::nn::Module;

/// Which class the loss is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Caller-supplied ground-truth class.
    Label(usize),
    /// The classifier's own top-1 prediction on the clean image.
    Predicted,
}

/// Output of one differentiated forward pass.
#[derive(Debug, Clone)]
pub struct InputGradient {
    /// Logits of the clean image, `(1, K)`.
    pub logits: Tensor,
    /// Top-1 class of `logits`.
    pub prediction: usize,
    /// Class the loss was computed against.
    pub target: usize,
    /// ∂loss/∂image, same shape and device as the image.
    pub gradient: Tensor,
}

/// A differentiable image classifier.
///
/// Implementations must be usable from several threads at once through a
/// shared reference; per-call gradient state lives in the [`GradContext`]
/// handed to [`input_gradient`](Classifier::input_gradient).
pub trait Classifier: Send + Sync {
    /// Logits for a `(1, C, H, W)` image: `(1, K)`.
    fn forward(&self, image: &Tensor) -> Tensor;

    /// Device the classifier's parameters live on.
    fn device(&self) -> Device;

    /// Number of output classes `K`.
    fn num_classes(&self) -> usize;

    /// Whether stochastic layers are active.
    fn is_training(&self) -> bool {
        false
    }

    /// Evaluate `image` and return the gradient of the cross-entropy loss
    /// against `target` with respect to the image only.
    ///
    /// `ctx` is reset first, so stale gradients from an earlier call never
    /// leak into this one. A classifier whose output does not depend on the
    /// input yields an all-zero gradient, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::LabelOutOfRange`] if a supplied label is not in
    /// `[0, K)`, or [`FgsmError::InvalidShape`] if the logits are malformed.
    fn input_gradient(
        &self,
        ctx: &mut GradContext,
        image: &Tensor,
        target: Target,
    ) -> Result<InputGradient> {
        ctx.reset();
        let input = ctx.watch(image);
        let logits = self.forward(&input);
        let prediction = top1(&logits)?;

        let target = resolve_target(target, prediction, logits.shape()[1])?;

        CrossEntropyLoss::new().forward(&logits, &[target]).backward();

        let gradient = ctx
            .grad(&input)
            .unwrap_or_else(|| Tensor::zeros_like(image));

        Ok(InputGradient {
            logits: logits.detach(),
            prediction,
            target,
            gradient,
        })
    }
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn forward(&self, image: &Tensor) -> Tensor {
        (**self).forward(image)
    }

    fn device(&self) -> Device {
        (**self).device()
    }

    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn is_training(&self) -> bool {
        (**self).is_training()
    }

    fn input_gradient(
        &self,
        ctx: &mut GradContext,
        image: &Tensor,
        target: Target,
    ) -> Result<InputGradient> {
        (**self).input_gradient(ctx, image, target)
    }
}

fn resolve_target(target: Target, prediction: usize, num_classes: usize) -> Result<usize> {
    match target {
        Target::Predicted => Ok(prediction),
        Target::Label(label) if label < num_classes => Ok(label),
        Target::Label(label) => Err(FgsmError::LabelOutOfRange { label, num_classes }),
    }
}

/// Index of the largest logit in a `(1, K)` tensor.
///
/// Ties go to the first maximal index. NaN never wins over a finite value;
/// an all-NaN row selects index 0.
///
/// # Errors
///
/// Returns [`FgsmError::InvalidShape`] unless the shape is `(1, K)` with
/// `K > 0`.
///
/// # Example
///
/// ```
/// use fgsm::autograd::Tensor;
/// use fgsm::classifier::top1;
///
/// let logits = Tensor::new(&[0.1, 2.0, 2.0, f32::NAN], &[1, 4]);
/// assert_eq!(top1(&logits).unwrap(), 1);
/// ```
pub fn top1(logits: &Tensor) -> Result<usize> {
    let shape = logits.shape();
    if shape.len() != 2 || shape[0] != 1 || shape[1] == 0 {
        return Err(FgsmError::invalid_shape("logits (1, K) with K > 0", shape));
    }

    let mut best = 0;
    let mut best_val = f32::NAN;
    for (i, &v) in logits.data().iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best_val.is_nan() || v > best_val {
            best = i;
            best_val = v;
        }
    }
    Ok(best)
}

/// Adapts any [`Module`] into a [`Classifier`].
///
/// The module is switched to evaluation mode on construction.
///
/// # Example
///
/// ```
/// use fgsm::autograd::Tensor;
/// use fgsm::classifier::{Classifier, ModuleClassifier};
/// use fgsm::models::TinyConvNet;
///
/// let classifier = ModuleClassifier::new(TinyConvNet::seeded(10, 0));
/// let logits = classifier.forward(&Tensor::zeros(&[1, 3, 8, 8]));
/// assert_eq!(logits.shape(), &[1, 10]);
/// ```
#[derive(Debug)]
pub struct ModuleClassifier<M: Module> {
    module: M,
    device: Device,
    num_classes: usize,
}

impl<M: Module + OutputClasses> ModuleClassifier<M> {
    /// Wrap `module` on the CPU, in evaluation mode.
    #[must_use]
    pub fn new(module: M) -> Self {
        let num_classes = module.output_classes();
        Self::with_classes(module, num_classes)
    }
}

impl<M: Module> ModuleClassifier<M> {
    /// Wrap a module whose class count cannot be introspected.
    #[must_use]
    pub fn with_classes(mut module: M, num_classes: usize) -> Self {
        module.eval();
        Self {
            module,
            device: Device::Cpu,
            num_classes,
        }
    }

    /// Move every parameter to `device`.
    #[must_use]
    pub fn to_device(mut self, device: Device) -> Self {
        for param in self.module.parameters_mut() {
            *param = param.to_device(device).requires_grad();
        }
        self.device = device;
        self
    }

    /// Borrow the wrapped module.
    #[must_use]
    pub fn module(&self) -> &M {
        &self.module
    }

    /// Mutable access to the wrapped module, e.g. to flip it into training
    /// mode.
    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    /// Unwrap the module.
    #[must_use]
    pub fn into_inner(self) -> M {
        self.module
    }
}

/// Modules that know how many classes they emit.
pub trait OutputClasses {
    /// Width of the logits row.
    fn output_classes(&self) -> usize;
}

impl<M: Module> Classifier for ModuleClassifier<M> {
    fn forward(&self, image: &Tensor) -> Tensor {
        self.module.forward(image)
    }

    fn device(&self) -> Device {
        self.device
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn is_training(&self) -> bool {
        self.module.training()
    }
}

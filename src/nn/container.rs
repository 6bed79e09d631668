//! Container modules for composing neural networks.

use super::module::Module;
use crate::autograd::Tensor;

/// Sequential container for chaining modules.
///
/// Modules are executed in order, with each module's output
/// becoming the next module's input. `train`/`eval` propagate to every
/// child.
///
/// # Example
///
/// ```
/// use fgsm::autograd::Tensor;
/// use fgsm::nn::{Linear, Module, ReLU, Sequential};
///
/// let model = Sequential::new()
///     .add(Linear::with_seed(4, 8, Some(0)))
///     .add(ReLU::new())
///     .add(Linear::with_seed(8, 2, Some(1)));
///
/// let output = model.forward(&Tensor::ones(&[1, 4]));
/// assert_eq!(output.shape(), &[1, 2]);
/// ```
pub struct Sequential {
    modules: Vec<Box<dyn Module>>,
    training: bool,
}

impl Sequential {
    /// Create an empty Sequential container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            training: true,
        }
    }

    /// Add a module to the sequence.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn add<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Get the number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor) -> Tensor {
        self.modules
            .iter()
            .fold(input.clone(), |x, module| module.forward(&x))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.modules.iter().flat_map(|m| m.parameters()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.modules
            .iter_mut()
            .flat_map(|m| m.parameters_mut())
            .collect()
    }

    fn train(&mut self) {
        self.training = true;
        for module in &mut self.modules {
            module.train();
        }
    }

    fn eval(&mut self) {
        self.training = false;
        for module in &mut self.modules {
            module.eval();
        }
    }

    fn training(&self) -> bool {
        self.training || self.modules.iter().any(|m| m.training())
    }
}

impl std::fmt::Debug for Sequential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequential")
            .field("num_modules", &self.modules.len())
            .field("training", &self.training)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Dropout, Linear, ReLU};

    #[test]
    fn test_sequential_forward() {
        let model = Sequential::new()
            .add(Linear::with_seed(10, 5, Some(1)))
            .add(ReLU::new())
            .add(Linear::with_seed(5, 2, Some(2)));

        assert_eq!(model.len(), 3);
        let y = model.forward(&Tensor::ones(&[4, 10]));
        assert_eq!(y.shape(), &[4, 2]);
    }

    #[test]
    fn test_sequential_parameters() {
        let model = Sequential::new()
            .add(Linear::with_seed(10, 5, Some(1)))
            .add(ReLU::new())
            .add(Linear::with_seed(5, 2, Some(2)));

        assert_eq!(model.parameters().len(), 4);
        assert_eq!(model.num_parameters(), 10 * 5 + 5 + 5 * 2 + 2);
    }

    #[test]
    fn test_sequential_train_eval_propagates() {
        let mut model = Sequential::new()
            .add(Linear::with_seed(4, 4, Some(0)))
            .add(Dropout::with_seed(0.5, 9));
        assert!(model.training());

        model.eval();
        assert!(!model.training());

        let x = Tensor::ones(&[2, 4]);
        assert_eq!(model.forward(&x), model.forward(&x));

        model.train();
        assert!(model.training());
    }

    #[test]
    fn test_empty_sequential_is_identity() {
        let model = Sequential::default();
        assert!(model.is_empty());
        let x = Tensor::from_slice(&[1.0, 2.0]);
        assert_eq!(model.forward(&x), x);
    }
}

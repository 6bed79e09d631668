//! Dropout regularization.
//!
//! A network with an active dropout layer is stochastic, so attacks refuse
//! classifiers whose modules are still in training mode.
//!
//! # Reference
//!
//! - Srivastava, N., et al. (2014). Dropout: A simple way to prevent neural
//!   networks from overfitting. JMLR.

use super::module::Module;
use crate::autograd::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Dropout regularization layer.
///
/// During training, randomly zeroes elements with probability `p` and
/// scales the rest by `1/(1-p)` (inverted dropout). During evaluation,
/// returns input unchanged.
pub struct Dropout {
    /// Probability of element being zeroed
    p: f32,

    training: bool,

    rng: Mutex<StdRng>,
}

impl Dropout {
    /// Create a new Dropout layer.
    ///
    /// # Panics
    ///
    /// Panics if `p` is not in [0, 1).
    #[must_use]
    pub fn new(p: f32) -> Self {
        Self::build(p, StdRng::from_entropy())
    }

    /// Create a new Dropout layer with a specific seed for reproducibility.
    ///
    /// # Panics
    ///
    /// Panics if `p` is not in [0, 1).
    #[must_use]
    pub fn with_seed(p: f32, seed: u64) -> Self {
        Self::build(p, StdRng::seed_from_u64(seed))
    }

    fn build(p: f32, rng: StdRng) -> Self {
        assert!(
            (0.0..1.0).contains(&p),
            "Dropout probability must be in [0, 1), got {p}",
        );

        Self {
            p,
            training: true,
            rng: Mutex::new(rng),
        }
    }

    /// Get the dropout probability.
    #[must_use]
    pub fn probability(&self) -> f32 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&self, input: &Tensor) -> Tensor {
        if !self.training || self.p == 0.0 {
            return input.clone();
        }

        let scale = 1.0 / (1.0 - self.p);
        let mask: Vec<f32> = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            (0..input.numel())
                .map(|_| if rng.gen::<f32>() < self.p { 0.0 } else { scale })
                .collect()
        };

        let mask = Tensor::from_vec(mask, input.shape()).to_device(input.device());
        input.mul(&mask)
    }

    fn train(&mut self) {
        self.training = true;
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn training(&self) -> bool {
        self.training
    }
}

impl std::fmt::Debug for Dropout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dropout")
            .field("p", &self.p)
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}

//! Weight initialization functions.
//!
//! - Xavier/Glorot (Glorot & Bengio, 2010) for linear heads
//! - Kaiming/He (He et al., 2015) for `ReLU` convolution stacks
//!
//! Every function takes an optional seed; the same seed always yields the
//! same tensor.
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.
//! - He, K., et al. (2015). Delving deep into rectifiers: Surpassing human-level
//!   performance on `ImageNet` classification. ICCV.

use crate::autograd::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Xavier uniform initialization.
///
/// Samples from U(-a, a) where a = sqrt(6 / (`fan_in` + `fan_out`)).
#[must_use]
pub fn xavier_uniform(shape: &[usize], fan_in: usize, fan_out: usize, seed: Option<u64>) -> Tensor {
    let a = (6.0 / (fan_in + fan_out) as f32).sqrt();
    uniform(shape, -a, a, seed)
}

/// Kaiming uniform initialization.
///
/// Samples from U(-bound, bound) where bound = sqrt(6 / `fan_in`).
#[must_use]
pub fn kaiming_uniform(shape: &[usize], fan_in: usize, seed: Option<u64>) -> Tensor {
    let bound = (6.0 / fan_in as f32).sqrt();
    uniform(shape, -bound, bound, seed)
}

/// Uniform distribution initialization, U(low, high).
pub(crate) fn uniform(shape: &[usize], low: f32, high: f32, seed: Option<u64>) -> Tensor {
    let numel: usize = shape.iter().product();
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(low..high)).collect();

    Tensor::from_vec(data, shape)
}

/// Zeros.
#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::zeros(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xavier_uniform_bounds() {
        let t = xavier_uniform(&[16, 8], 8, 16, Some(7));
        let a = (6.0_f32 / 24.0).sqrt();
        assert!(t.data().iter().all(|&x| x >= -a && x < a));
    }

    #[test]
    fn test_kaiming_uniform_bounds() {
        let t = kaiming_uniform(&[8, 3, 3, 3], 27, Some(1));
        let bound = (6.0_f32 / 27.0).sqrt();
        assert_eq!(t.numel(), 216);
        assert!(t.data().iter().all(|&x| x.abs() <= bound));
    }

    #[test]
    fn test_seed_reproducible() {
        let a = kaiming_uniform(&[32], 4, Some(42));
        let b = kaiming_uniform(&[32], 4, Some(42));
        let c = kaiming_uniform(&[32], 4, Some(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

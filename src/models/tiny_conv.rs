//! A small convolutional image classifier.
//!
//! ```text
//! Conv2d(3→8, 3x3, pad 1) → ReLU
//!   → Conv2d(8→16, 3x3, stride 2, pad 1) → ReLU
//!   → GlobalAvgPool2d → Linear(16→K)
//! ```
//!
//! The global pooling head makes the network accept any spatial size, so
//! the same weights serve 224×224 crops and tiny test images.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::autograd::Tensor;
use crate::classifier::OutputClasses;
use crate::error::{FgsmError, Result};
use crate::nn::{Conv2d, GlobalAvgPool2d, Linear, Module, ReLU};

const IN_CHANNELS: usize = 3;
const HIDDEN: usize = 8;
const FEATURES: usize = 16;

/// Seeded three-layer convolutional classifier.
///
/// # Example
///
/// ```
/// use fgsm::autograd::Tensor;
/// use fgsm::models::TinyConvNet;
/// use fgsm::nn::Module;
///
/// let net = TinyConvNet::seeded(5, 42);
/// let logits = net.forward(&Tensor::zeros(&[1, 3, 12, 12]));
/// assert_eq!(logits.shape(), &[1, 5]);
/// ```
#[derive(Debug)]
pub struct TinyConvNet {
    conv1: Conv2d,
    conv2: Conv2d,
    pool: GlobalAvgPool2d,
    relu: ReLU,
    fc: Linear,
    num_classes: usize,
}

impl TinyConvNet {
    /// Build a network with weights drawn from `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `num_classes` is zero.
    #[must_use]
    pub fn seeded(num_classes: usize, seed: u64) -> Self {
        assert!(num_classes > 0, "TinyConvNet needs at least one class");

        Self {
            conv1: Conv2d::with_options(
                IN_CHANNELS,
                HIDDEN,
                (3, 3),
                (1, 1),
                (1, 1),
                true,
                Some(seed),
            ),
            conv2: Conv2d::with_options(
                HIDDEN,
                FEATURES,
                (3, 3),
                (2, 2),
                (1, 1),
                true,
                Some(seed.wrapping_add(1)),
            ),
            pool: GlobalAvgPool2d::new(),
            relu: ReLU::new(),
            fc: Linear::with_seed(FEATURES, num_classes, Some(seed.wrapping_add(2))),
            num_classes,
        }
    }

    /// Number of output classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Build a network from serialized weights.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Weights`] if a tensor has the wrong length.
    pub fn from_weights(weights: &TinyConvWeights) -> Result<Self> {
        if weights.num_classes == 0 {
            return Err(FgsmError::Weights("num_classes must be positive".into()));
        }
        let mut net = Self::seeded(weights.num_classes, 0);

        let sources = weights.tensors();
        let params = net.parameters_mut();
        for ((name, values), param) in sources.into_iter().zip(params) {
            if values.len() != param.numel() {
                return Err(FgsmError::Weights(format!(
                    "{name}: expected {} values, got {}",
                    param.numel(),
                    values.len()
                )));
            }
            *param = Tensor::new(values, param.shape()).requires_grad();
        }
        Ok(net)
    }

    /// Snapshot of the current weights.
    #[must_use]
    pub fn weights(&self) -> TinyConvWeights {
        let mut params = self.parameters().into_iter().map(|p| p.data().to_vec());
        let mut next = || params.next().unwrap_or_default();

        TinyConvWeights {
            num_classes: self.num_classes,
            conv1_weight: next(),
            conv1_bias: next(),
            conv2_weight: next(),
            conv2_bias: next(),
            fc_weight: next(),
            fc_bias: next(),
        }
    }

    /// Read JSON weights from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Json`] on malformed JSON and
    /// [`FgsmError::Weights`] on a size mismatch.
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let weights: TinyConvWeights = serde_json::from_reader(reader)?;
        Self::from_weights(&weights)
    }

    /// Write the weights as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Json`] if serialization or the write fails.
    pub fn to_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &self.weights())?;
        Ok(())
    }

    /// Load JSON weights from a file.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Io`] if the file cannot be opened, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(BufReader::new(File::open(path)?))
    }

    /// Save JSON weights to a file.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Io`] if the file cannot be created.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl Module for TinyConvNet {
    fn forward(&self, input: &Tensor) -> Tensor {
        let x = self.relu.forward(&self.conv1.forward(input));
        let x = self.relu.forward(&self.conv2.forward(&x));
        let x = self.pool.forward(&x);
        self.fc.forward(&x)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.conv1.parameters();
        params.extend(self.conv2.parameters());
        params.extend(self.fc.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.conv1.parameters_mut();
        params.extend(self.conv2.parameters_mut());
        params.extend(self.fc.parameters_mut());
        params
    }
}

impl OutputClasses for TinyConvNet {
    fn output_classes(&self) -> usize {
        self.num_classes
    }
}

/// Serialized [`TinyConvNet`] weights, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TinyConvWeights {
    /// Width of the classifier head.
    pub num_classes: usize,
    /// `[8, 3, 3, 3]`
    pub conv1_weight: Vec<f32>,
    /// `[8]`
    pub conv1_bias: Vec<f32>,
    /// `[16, 8, 3, 3]`
    pub conv2_weight: Vec<f32>,
    /// `[16]`
    pub conv2_bias: Vec<f32>,
    /// `[num_classes, 16]`
    pub fc_weight: Vec<f32>,
    /// `[num_classes]`
    pub fc_bias: Vec<f32>,
}

impl TinyConvWeights {
    fn tensors(&self) -> [(&'static str, &[f32]); 6] {
        [
            ("conv1_weight", self.conv1_weight.as_slice()),
            ("conv1_bias", self.conv1_bias.as_slice()),
            ("conv2_weight", self.conv2_weight.as_slice()),
            ("conv2_bias", self.conv2_bias.as_slice()),
            ("fc_weight", self.fc_weight.as_slice()),
            ("fc_bias", self.fc_bias.as_slice()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_shape_any_size() {
        let net = TinyConvNet::seeded(10, 0);
        assert_eq!(net.forward(&Tensor::zeros(&[1, 3, 7, 9])).shape(), &[1, 10]);
        assert_eq!(net.forward(&Tensor::zeros(&[1, 3, 32, 32])).shape(), &[1, 10]);
    }

    #[test]
    fn test_parameter_count() {
        let net = TinyConvNet::seeded(4, 0);
        let expected = (8 * 3 * 9 + 8) + (16 * 8 * 9 + 16) + (4 * 16 + 4);
        assert_eq!(net.num_parameters(), expected);
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = TinyConvNet::seeded(3, 11);
        let b = TinyConvNet::seeded(3, 11);
        let c = TinyConvNet::seeded(3, 12);
        assert_eq!(a.weights(), b.weights());
        assert_ne!(a.weights(), c.weights());
    }

    #[test]
    fn test_json_weights_reload() {
        let net = TinyConvNet::seeded(3, 5);
        let mut buf = Vec::new();
        net.to_json(&mut buf).unwrap();

        let reloaded = TinyConvNet::from_json(buf.as_slice()).unwrap();
        let x = Tensor::new(
            &(0..48).map(|i| i as f32 / 48.0).collect::<Vec<_>>(),
            &[1, 3, 4, 4],
        );
        assert_eq!(net.forward(&x), reloaded.forward(&x));
    }

    #[test]
    fn test_weights_size_mismatch() {
        let mut weights = TinyConvNet::seeded(3, 5).weights();
        weights.fc_bias.pop();
        let err = TinyConvNet::from_weights(&weights).unwrap_err();
        assert!(matches!(err, FgsmError::Weights(msg) if msg.contains("fc_bias")));
    }

    #[test]
    fn test_zero_classes_rejected() {
        let mut weights = TinyConvNet::seeded(1, 5).weights();
        weights.num_classes = 0;
        assert!(TinyConvNet::from_weights(&weights).is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");

        let net = TinyConvNet::seeded(2, 8);
        net.save(&path).unwrap();
        let loaded = TinyConvNet::load(&path).unwrap();
        assert_eq!(net.weights(), loaded.weights());
    }
}

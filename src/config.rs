//! Run configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration:
//!
//! ```toml
//! epsilon = 0.1
//! epsilons = [0.0, 0.01, 0.05, 0.1, 0.2]
//! device = "cpu"
//! resize = 256
//! image_size = 224
//! model_seed = 0
//! num_classes = 1000
//! # weights = "tiny_conv.json"
//! # labels = "imagenet_classes.txt"
//!
//! [normalization]
//! mean = [0.485, 0.456, 0.406]
//! std = [0.229, 0.224, 0.225]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::ModuleClassifier;
use crate::device::Device;
use crate::error::{FgsmError, Result};
use crate::harness::DEFAULT_EPSILONS;
use crate::image_io::Preprocess;
use crate::labels::LabelTable;
use crate::models::TinyConvNet;
use crate::normalization::{Bounds, Normalization};

/// Settings shared by the CLI subcommands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Epsilon for single attacks.
    pub epsilon: f32,
    /// Epsilon grid for batch evaluation.
    pub epsilons: Vec<f32>,
    /// Per-channel statistics.
    pub normalization: Normalization,
    /// Device tensors and the model are placed on.
    pub device: Device,
    /// Shorter-side length before cropping.
    pub resize: u32,
    /// Side of the center crop fed to the model.
    pub image_size: u32,
    /// Seed for the reference model when no weights file is given.
    pub model_seed: u64,
    /// Number of classes of the seeded reference model.
    pub num_classes: usize,
    /// JSON weights for the reference model.
    pub weights: Option<PathBuf>,
    /// One-label-per-line class names.
    pub labels: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            epsilons: DEFAULT_EPSILONS.to_vec(),
            normalization: Normalization::imagenet(),
            device: Device::Cpu,
            resize: 256,
            image_size: 224,
            model_seed: 0,
            num_classes: 1000,
            weights: None,
            labels: None,
        }
    }
}

impl RunConfig {
    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Io`] if the file cannot be read,
    /// [`FgsmError::Config`] if it does not parse, or any error from
    /// [`validate`](Self::validate).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text).map_err(|source| FgsmError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// As [`from_path`](Self::from_path), with `<inline>` as the path.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|source| FgsmError::Config {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::InvalidHyperparameter`] naming the first bad
    /// field.
    pub fn validate(&self) -> Result<()> {
        for &eps in std::iter::once(&self.epsilon).chain(&self.epsilons) {
            if !(eps.is_finite() && eps >= 0.0) {
                return Err(FgsmError::invalid_hyperparameter(
                    "epsilon",
                    eps,
                    "a finite value >= 0",
                ));
            }
        }
        if self.epsilons.is_empty() {
            return Err(FgsmError::invalid_hyperparameter(
                "epsilons",
                "[]",
                "at least one epsilon",
            ));
        }
        if self.image_size == 0 || self.image_size > self.resize {
            return Err(FgsmError::invalid_hyperparameter(
                "image_size",
                self.image_size,
                &format!("0 < image_size <= resize ({})", self.resize),
            ));
        }
        if self.num_classes == 0 {
            return Err(FgsmError::invalid_hyperparameter(
                "num_classes",
                0,
                "at least one class",
            ));
        }
        Ok(())
    }

    /// Normalization placed on the configured device.
    #[must_use]
    pub fn normalization(&self) -> Normalization {
        self.normalization.clone().to_device(self.device)
    }

    /// Clamping bounds on the configured device.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.normalization().bounds()
    }

    /// Image preprocessing matching this configuration.
    #[must_use]
    pub fn preprocess(&self) -> Preprocess {
        Preprocess {
            resize: self.resize,
            crop: self.image_size,
            normalization: self.normalization(),
        }
    }

    /// The reference classifier: loaded from `weights` when set, seeded
    /// otherwise, and placed on the configured device.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights file cannot be read or does not fit
    /// the architecture.
    pub fn classifier(&self) -> Result<ModuleClassifier<TinyConvNet>> {
        let model = match &self.weights {
            Some(path) => TinyConvNet::load(path)?,
            None => TinyConvNet::seeded(self.num_classes, self.model_seed),
        };
        Ok(ModuleClassifier::new(model).to_device(self.device))
    }

    /// The label table, if a path is configured.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Io`] if the file cannot be read.
    pub fn label_table(&self) -> Result<Option<LabelTable>> {
        self.labels.as_ref().map(LabelTable::from_path).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(RunConfig::from_toml_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = RunConfig::from_toml_str(
            r#"
            epsilon = 0.03
            device = "accel:1"
            num_classes = 10

            [normalization]
            mean = [0.5]
            std = [0.5]
            "#,
        )
        .unwrap();
        assert_eq!(config.epsilon, 0.03);
        assert_eq!(config.device, Device::Accelerator(1));
        assert_eq!(config.epsilons, DEFAULT_EPSILONS.to_vec());
        assert_eq!(config.normalization().channels(), 1);
        assert_eq!(config.bounds().device(), Device::Accelerator(1));
    }

    #[test]
    fn test_rejects_invalid_values() {
        for text in [
            "epsilon = -0.1",
            "epsilons = []",
            "epsilons = [0.1, nan]",
            "image_size = 300",
            "num_classes = 0",
        ] {
            assert!(
                matches!(
                    RunConfig::from_toml_str(text),
                    Err(FgsmError::InvalidHyperparameter { .. })
                ),
                "{text} accepted"
            );
        }
    }

    #[test]
    fn test_rejects_bad_normalization_and_unknown_keys() {
        assert!(matches!(
            RunConfig::from_toml_str("[normalization]\nmean = [0.5]\nstd = [0.0]"),
            Err(FgsmError::Config { .. })
        ));
        assert!(matches!(
            RunConfig::from_toml_str("epsilonz = 0.1"),
            Err(FgsmError::Config { .. })
        ));
    }

    #[test]
    fn test_from_path_and_seeded_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fgsm.toml");
        std::fs::write(&path, "num_classes = 7\nmodel_seed = 3\n").unwrap();

        let config = RunConfig::from_path(&path).unwrap();
        let classifier = config.classifier().unwrap();
        assert_eq!(crate::classifier::Classifier::num_classes(&classifier), 7);
        assert!(config.label_table().unwrap().is_none());
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(matches!(
            RunConfig::from_path("/no/such/fgsm.toml"),
            Err(FgsmError::Io(_))
        ));
    }
}

//! Per-channel normalization and the normalized-space pixel bounds.
//!
//! Classifiers consume images in *normalized* space,
//! `normalized = (raw - mean) / std` per channel, where *raw* pixels lie in
//! `[0, 1]`. The image of `[0, 1]` under that map is the [`Bounds`] pair
//! every adversarial image is clamped into.
//!
//! # Example
//!
//! ```
//! use fgsm::device::Device;
//! use fgsm::normalization::{bounds_for, normalization_stats};
//!
//! let (mean, std) = normalization_stats(Device::Cpu);
//! let bounds = bounds_for(&mean, &std).unwrap();
//! let (lo, hi) = bounds.per_channel()[0];
//! assert!((lo - (-0.485 / 0.229)).abs() < 1e-6);
//! assert!((hi - (0.515 / 0.229)).abs() < 1e-6);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::autograd::Tensor;
use crate::device::Device;
use crate::error::{FgsmError, Result};

/// `ImageNet` channel means (R, G, B).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// `ImageNet` channel standard deviations (R, G, B).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// `ImageNet` statistics as `(1, 3, 1, 1)` tensors placed on `device`.
#[must_use]
pub fn normalization_stats(device: Device) -> (Tensor, Tensor) {
    Normalization::imagenet().to_device(device).stats()
}

/// Compute the normalized-space bounds for per-channel `mean` and `std`.
///
/// `min = (0 - mean) / std`, `max = (1 - mean) / std`, placed on the device
/// of the statistics.
///
/// # Errors
///
/// Returns [`FgsmError::InvalidShape`] unless both tensors are `(1, C, 1, 1)`,
/// [`FgsmError::DeviceMismatch`] if they live on different devices, and
/// [`FgsmError::InvalidHyperparameter`] for a non-finite statistic or a
/// non-positive std.
pub fn bounds_for(mean: &Tensor, std: &Tensor) -> Result<Bounds> {
    let channels = channel_count(mean)?;
    if std.shape() != mean.shape() {
        return Err(FgsmError::invalid_shape(
            &format!("std of shape {:?}", mean.shape()),
            std.shape(),
        ));
    }
    mean.device().ensure_same(std.device(), "normalization mean vs std")?;
    validate_stats(mean.data(), std.data())?;

    let (min, max): (Vec<f32>, Vec<f32>) = mean
        .data()
        .iter()
        .zip(std.data())
        .map(|(&m, &s)| ((0.0 - m) / s, (1.0 - m) / s))
        .unzip();

    Ok(Bounds {
        min: channel_tensor(min, mean.device()),
        max: channel_tensor(max, mean.device()),
        channels,
    })
}

/// Per-channel normalized-space interval `[min_c, max_c]`.
///
/// Invariant: `min_c < max_c` for every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    min: Tensor,
    max: Tensor,
    channels: usize,
}

impl Bounds {
    /// Lower bounds, `(1, C, 1, 1)`.
    #[must_use]
    pub fn min(&self) -> &Tensor {
        &self.min
    }

    /// Upper bounds, `(1, C, 1, 1)`.
    #[must_use]
    pub fn max(&self) -> &Tensor {
        &self.max
    }

    /// Device the bounds were computed on.
    #[must_use]
    pub fn device(&self) -> Device {
        self.min.device()
    }

    /// Number of channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `(min_c, max_c)` for every channel.
    #[must_use]
    pub fn per_channel(&self) -> Vec<(f32, f32)> {
        self.min
            .data()
            .iter()
            .copied()
            .zip(self.max.data().iter().copied())
            .collect()
    }

    /// Clamp every element of a `(1, C, H, W)` tensor into its channel's
    /// interval. NaN elements land on the lower bound.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::InvalidShape`] if the tensor is not rank 4 with
    /// this channel count, or [`FgsmError::DeviceMismatch`] if it lives on
    /// another device.
    pub fn clamp(&self, image: &Tensor) -> Result<Tensor> {
        self.check(image)?;

        let min = self.min.data();
        let max = self.max.data();
        let data = map_channels(image, |c, v| v.max(min[c]).min(max[c]));

        Ok(Tensor::from_vec(data, image.shape()).to_device(image.device()))
    }

    /// True if every element of `image` lies in its channel's interval.
    ///
    /// # Errors
    ///
    /// Same as [`clamp`](Self::clamp).
    pub fn contains(&self, image: &Tensor) -> Result<bool> {
        self.check(image)?;

        let spatial = spatial_size(image).max(1);
        let min = self.min.data();
        let max = self.max.data();
        Ok(image
            .data()
            .chunks(spatial)
            .enumerate()
            .all(|(plane, values)| {
                let c = plane % self.channels;
                values.iter().all(|&v| v >= min[c] && v <= max[c])
            }))
    }

    fn check(&self, image: &Tensor) -> Result<()> {
        check_image(image, self.channels)?;
        self.device().ensure_same(image.device(), "bounds vs image")
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (c, (lo, hi)) in self.per_channel().into_iter().enumerate() {
            if c > 0 {
                writeln!(f)?;
            }
            write!(f, "channel {c}: [{lo:.6}, {hi:.6}]")?;
        }
        Ok(())
    }
}

/// A validated per-channel normalization scheme bound to a device.
///
/// # Example
///
/// ```
/// use fgsm::autograd::Tensor;
/// use fgsm::normalization::Normalization;
///
/// let norm = Normalization::imagenet();
/// let raw = Tensor::full(&[1, 3, 2, 2], 0.5);
/// let back = norm.to_raw(&norm.to_normalized(&raw).unwrap()).unwrap();
/// assert!(back.data().iter().all(|&v| (v - 0.5).abs() < 1e-6));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NormalizationParams", into = "NormalizationParams")]
pub struct Normalization {
    mean: Vec<f32>,
    std: Vec<f32>,
    device: Device,
}

#[derive(Serialize, Deserialize)]
struct NormalizationParams {
    mean: Vec<f32>,
    std: Vec<f32>,
    #[serde(default)]
    device: Device,
}

impl TryFrom<NormalizationParams> for Normalization {
    type Error = FgsmError;

    fn try_from(params: NormalizationParams) -> Result<Self> {
        Ok(Self::new(params.mean, params.std)?.to_device(params.device))
    }
}

impl From<Normalization> for NormalizationParams {
    fn from(norm: Normalization) -> Self {
        Self {
            mean: norm.mean,
            std: norm.std,
            device: norm.device,
        }
    }
}

impl Normalization {
    /// Build a CPU scheme from per-channel statistics.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::InvalidHyperparameter`] if the vectors are empty
    /// or of different lengths, any value is non-finite, or any std is not
    /// strictly positive.
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        if mean.is_empty() || mean.len() != std.len() {
            return Err(FgsmError::invalid_hyperparameter(
                "normalization",
                format!("{} means, {} stds", mean.len(), std.len()),
                "the same non-zero number of means and stds",
            ));
        }
        validate_stats(&mean, &std)?;
        Ok(Self {
            mean,
            std,
            device: Device::Cpu,
        })
    }

    /// The `ImageNet` preset.
    #[must_use]
    pub fn imagenet() -> Self {
        Self {
            mean: IMAGENET_MEAN.to_vec(),
            std: IMAGENET_STD.to_vec(),
            device: Device::Cpu,
        }
    }

    /// The same scheme placed on `device`.
    #[must_use]
    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Number of channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    /// Channel means.
    #[must_use]
    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    /// Channel standard deviations.
    #[must_use]
    pub fn std(&self) -> &[f32] {
        &self.std
    }

    /// Device the scheme's tensors are placed on.
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }

    /// `(mean, std)` as `(1, C, 1, 1)` tensors.
    #[must_use]
    pub fn stats(&self) -> (Tensor, Tensor) {
        (
            channel_tensor(self.mean.clone(), self.device),
            channel_tensor(self.std.clone(), self.device),
        )
    }

    /// Normalized-space bounds of this scheme.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let (min, max): (Vec<f32>, Vec<f32>) = self
            .mean
            .iter()
            .zip(&self.std)
            .map(|(&m, &s)| ((0.0 - m) / s, (1.0 - m) / s))
            .unzip();

        Bounds {
            min: channel_tensor(min, self.device),
            max: channel_tensor(max, self.device),
            channels: self.channels(),
        }
    }

    /// Map a raw `[0, 1]` image into normalized space.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::InvalidShape`] on a rank or channel mismatch and
    /// [`FgsmError::DeviceMismatch`] if the image lives on another device.
    pub fn to_normalized(&self, raw: &Tensor) -> Result<Tensor> {
        self.check(raw)?;
        let data = map_channels(raw, |c, v| (v - self.mean[c]) / self.std[c]);
        Ok(Tensor::from_vec(data, raw.shape()).to_device(self.device))
    }

    /// Map a normalized image back to raw space, clamped into `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Same as [`to_normalized`](Self::to_normalized).
    pub fn to_raw(&self, normalized: &Tensor) -> Result<Tensor> {
        self.check(normalized)?;
        let data = map_channels(normalized, |c, v| {
            (v * self.std[c] + self.mean[c]).max(0.0).min(1.0)
        });
        Ok(Tensor::from_vec(data, normalized.shape()).to_device(self.device))
    }

    fn check(&self, image: &Tensor) -> Result<()> {
        check_image(image, self.channels())?;
        self.device
            .ensure_same(image.device(), "normalization vs image")
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self::imagenet()
    }
}

fn validate_stats(mean: &[f32], std: &[f32]) -> Result<()> {
    if let Some(m) = mean.iter().find(|m| !m.is_finite()) {
        return Err(FgsmError::invalid_hyperparameter("mean", m, "finite"));
    }
    if let Some(s) = std.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(FgsmError::invalid_hyperparameter("std", s, "finite and > 0"));
    }
    Ok(())
}

fn channel_tensor(values: Vec<f32>, device: Device) -> Tensor {
    let channels = values.len();
    Tensor::from_vec(values, &[1, channels, 1, 1]).to_device(device)
}

fn channel_count(stat: &Tensor) -> Result<usize> {
    match stat.shape() {
        &[1, c, 1, 1] if c > 0 => Ok(c),
        other => Err(FgsmError::invalid_shape("statistics of shape (1, C, 1, 1)", other)),
    }
}

fn check_image(image: &Tensor, channels: usize) -> Result<()> {
    let shape = image.shape();
    if shape.len() != 4 || shape[1] != channels {
        return Err(FgsmError::invalid_shape(
            &format!("(N, {channels}, H, W)"),
            shape,
        ));
    }
    Ok(())
}

fn spatial_size(image: &Tensor) -> usize {
    image.shape()[2] * image.shape()[3]
}

/// Apply `f(channel, value)` to every element of an `(N, C, H, W)` tensor.
fn map_channels<F>(image: &Tensor, f: F) -> Vec<f32>
where
    F: Fn(usize, f32) -> f32,
{
    let channels = image.shape()[1];
    let spatial = spatial_size(image).max(1);
    image
        .data()
        .chunks(spatial)
        .enumerate()
        .flat_map(|(plane, values)| {
            let c = plane % channels;
            values.iter().map(move |&v| (c, v))
        })
        .map(|(c, v)| f(c, v))
        .collect()
}

//! Decode, preprocess and render images at the edge of the library.
//!
//! The attack core only ever sees preprocessed `(1, 3, H, W)` tensors; this
//! module turns PNG/JPEG bytes into such tensors and raw-space tensors back
//! into pictures.
//!
//! Preprocessing follows the usual `ImageNet` evaluation pipeline: resize
//! the shorter side to 256 with a bilinear filter, center-crop 224×224,
//! scale to `[0, 1]`, lay out channels first, then normalize.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracing::debug;

use crate::autograd::Tensor;
use crate::error::{FgsmError, Result};
use crate::normalization::Normalization;

/// Resize and crop geometry plus the normalization to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocess {
    /// Target length of the shorter side after resizing.
    pub resize: u32,
    /// Side of the square center crop.
    pub crop: u32,
    /// Normalization applied after scaling to `[0, 1]`; its device is the
    /// device of the produced tensor.
    pub normalization: Normalization,
}

impl Default for Preprocess {
    fn default() -> Self {
        Self {
            resize: 256,
            crop: 224,
            normalization: Normalization::imagenet(),
        }
    }
}

/// Check that `bytes` look like PNG or JPEG.
///
/// # Errors
///
/// Returns [`FgsmError::UnsupportedMediaType`] for any other or unknown
/// format.
pub fn check_content(bytes: &[u8]) -> Result<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => Ok(format),
        Ok(other) => Err(FgsmError::UnsupportedMediaType(
            other.to_mime_type().to_string(),
        )),
        Err(_) => Err(FgsmError::UnsupportedMediaType("unknown".to_string())),
    }
}

/// Decode PNG or JPEG bytes.
///
/// # Errors
///
/// Returns [`FgsmError::UnsupportedMediaType`] for other formats and
/// [`FgsmError::Decode`] for malformed data.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let format = check_content(bytes)?;
    Ok(image::load_from_memory_with_format(bytes, format)?)
}

/// Read and decode an image file.
///
/// # Errors
///
/// Returns [`FgsmError::Io`] if the file cannot be read, otherwise as
/// [`decode`].
pub fn load(path: impl AsRef<Path>) -> Result<DynamicImage> {
    decode(&std::fs::read(path)?)
}

/// Turn a decoded image into a normalized `(1, 3, crop, crop)` tensor.
///
/// # Errors
///
/// Returns [`FgsmError::InvalidHyperparameter`] if `crop` is zero or larger
/// than `resize`, and [`FgsmError::InvalidShape`] for an empty image or a
/// normalization that is not three-channel.
pub fn preprocess(image: &DynamicImage, opts: &Preprocess) -> Result<Tensor> {
    if opts.crop == 0 || opts.crop > opts.resize {
        return Err(FgsmError::invalid_hyperparameter(
            "crop",
            opts.crop,
            &format!("0 < crop <= resize ({})", opts.resize),
        ));
    }
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(FgsmError::invalid_shape(
            "a non-empty image",
            &[height as usize, width as usize],
        ));
    }

    let rgb = image.to_rgb8();
    let (new_w, new_h) = shorter_side_to(width, height, opts.resize);
    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

    let left = center_offset(new_w, opts.crop);
    let top = center_offset(new_h, opts.crop);
    let cropped = imageops::crop_imm(&resized, left, top, opts.crop, opts.crop).to_image();
    debug!(width, height, new_w, new_h, crop = opts.crop, "preprocessed image");

    let raw = to_chw(&cropped).to_device(opts.normalization.device());
    opts.normalization.to_normalized(&raw)
}

/// Render a raw-space `(1, 3, H, W)` tensor as an 8-bit RGB image.
///
/// Values are clamped into `[0, 1]` before quantizing.
///
/// # Errors
///
/// Returns [`FgsmError::InvalidShape`] unless the tensor is `(1, 3, H, W)`.
pub fn to_rgb_image(raw: &Tensor) -> Result<RgbImage> {
    let shape = raw.shape();
    if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
        return Err(FgsmError::invalid_shape("(1, 3, H, W)", shape));
    }
    let (height, width) = (shape[2], shape[3]);
    let plane = height * width;
    let data = raw.data();
    let quantize = |v: f32| (v.max(0.0).min(1.0) * 255.0).round() as u8;

    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let i = y as usize * width + x as usize;
        Rgb([
            quantize(data[i]),
            quantize(data[plane + i]),
            quantize(data[2 * plane + i]),
        ])
    }))
}

/// Encode a raw-space `(1, 3, H, W)` tensor as PNG bytes.
///
/// # Errors
///
/// Returns [`FgsmError::InvalidShape`] as [`to_rgb_image`], or
/// [`FgsmError::Decode`] if the encoder fails.
pub fn encode_png(raw: &Tensor) -> Result<Vec<u8>> {
    let image = to_rgb_image(raw)?;
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn shorter_side_to(width: u32, height: u32, target: u32) -> (u32, u32) {
    let scale = |long: u32, short: u32| {
        ((u64::from(long) * u64::from(target)) / u64::from(short)).max(1) as u32
    };
    if width <= height {
        (target, scale(height, width))
    } else {
        (scale(width, height), target)
    }
}

/// Start of a centered window, with the half-pixel case rounded to even.
fn center_offset(len: u32, window: u32) -> u32 {
    let diff = len - window;
    let half = diff / 2;
    if diff % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

fn to_chw(image: &RgbImage) -> Tensor {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let plane = width * height;
    let mut data = vec![0.0; 3 * plane];
    for (x, y, pixel) in image.enumerate_pixels() {
        let i = y as usize * width + x as usize;
        for c in 0..3 {
            data[c * plane + i] = f32::from(pixel[c]) / 255.0;
        }
    }
    Tensor::from_vec(data, &[1, 3, height, width])
}

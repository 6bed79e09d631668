//! FGSM: single-step adversarial perturbations for image classifiers.
//!
//! Given a classifier, a normalized input image and an epsilon, the Fast
//! Gradient Sign Method moves every pixel by ±ε in the direction that
//! increases the classification loss, then clamps the result back into the
//! range of valid normalized images.
//!
//! # Quick Start
//!
//! ```
//! use fgsm::prelude::*;
//!
//! let classifier = ModuleClassifier::new(TinyConvNet::seeded(10, 42));
//! let bounds = Normalization::imagenet().bounds();
//! let attack = FgsmAttack::new(&classifier, 0.1, &bounds).unwrap();
//!
//! let image = Tensor::zeros(&[1, 3, 16, 16]);
//! let result = attack.run(&image, None).unwrap();
//!
//! // every pixel moved by at most epsilon and stays inside the bounds
//! let moved = result
//!     .adversarial_image()
//!     .data()
//!     .iter()
//!     .zip(image.data())
//!     .all(|(a, b)| (a - b).abs() <= 0.1 + 1e-6);
//! assert!(moved);
//! assert!(bounds.contains(result.adversarial_image()).unwrap());
//! ```
//!
//! # Modules
//!
//! - [`attack`]: The FGSM engine, its result and a serializable report
//! - [`autograd`]: Tape-based reverse-mode differentiation owned by the caller
//! - [`classifier`]: The classifier contract and input-gradient computation
//! - [`normalization`]: Per-channel statistics and valid-pixel bounds
//! - [`nn`]: Layers used by the reference model
//! - [`models`]: A small seeded convolutional reference classifier
//! - [`image_io`]: PNG/JPEG decoding, preprocessing and rendering
//! - [`harness`]: Batch evaluation over images and epsilon grids
//! - [`labels`]: Class index to label lookup
//! - [`config`]: TOML run configuration
//! - [`device`]: Compute placement tags

pub mod attack;
pub mod autograd;
pub mod classifier;
pub mod config;
pub mod device;
pub mod error;
pub mod harness;
pub mod image_io;
pub mod labels;
pub mod models;
pub mod nn;
pub mod normalization;
pub mod prelude;

pub use error::{FgsmError, Result};

//! Reference classifiers.
//!
//! - [`TinyConvNet`]: small seeded convolutional network used by the CLI,
//!   the benchmarks and the integration tests.

mod tiny_conv;

pub use tiny_conv::{TinyConvNet, TinyConvWeights};

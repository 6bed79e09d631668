//! Tensor with automatic differentiation support.
//!
//! This module provides the core `Tensor` type that tracks gradients
//! through computational operations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::device::Device;

use super::grad_fn::GradFn;
use super::graph::Tape;

/// Unique identifier for tensors in the computation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(u64);

impl TensorId {
    /// Generate a new unique tensor ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        TensorId(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TensorId {
    fn default() -> Self {
        Self::new()
    }
}

/// A dense `f32` tensor with optional gradient tracking.
///
/// # Design
///
/// The tensor stores:
/// - `data`: The numerical values, row-major
/// - `shape`: Dimensions of the tensor
/// - `device`: Placement tag, checked on every binary operation
/// - `requires_grad`: Whether this tensor participates in gradient computation
/// - `grad_fn`: The operation that created this tensor (for backprop)
/// - `tape`: The context this tensor records onto, if it was watched
/// - `id`: Unique identifier for graph tracking
///
/// Gradients are not stored on the tensor itself; they live in the
/// [`GradContext`](super::GradContext) that owns the tape.
#[derive(Clone)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
    device: Device,
    requires_grad: bool,
    is_leaf: bool,
    grad_fn: Option<Arc<dyn GradFn>>,
    tape: Option<Tape>,
    id: TensorId,
}

impl Tensor {
    /// Create a new tensor on the CPU from a slice with the given shape.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        Self::from_vec(data.to_vec(), shape)
    }

    /// Create a new tensor taking ownership of `data`.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "Data length {} doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_len
        );

        Self {
            data,
            shape: shape.to_vec(),
            device: Device::Cpu,
            requires_grad: false,
            is_leaf: true,
            grad_fn: None,
            tape: None,
            id: TensorId::new(),
        }
    }

    /// Create a tensor from a 1D slice (vector).
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self::new(data, &[data.len()])
    }

    /// Create a tensor filled with `value`.
    #[must_use]
    pub fn full(shape: &[usize], value: f32) -> Self {
        let len: usize = shape.iter().product();
        Self::from_vec(vec![value; len], shape)
    }

    /// Create a tensor filled with zeros.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// Create a tensor filled with ones.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// Zeros with the same shape and device as `other`.
    #[must_use]
    pub fn zeros_like(other: &Tensor) -> Self {
        Self::zeros(&other.shape).placed(other.device)
    }

    /// Enable gradient tracking for this tensor.
    ///
    /// A tensor only records operations once it is attached to a
    /// [`GradContext`](super::GradContext); this flag alone does not.
    #[must_use]
    pub fn requires_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }

    /// Check if this tensor requires gradient computation.
    #[must_use]
    pub fn requires_grad_enabled(&self) -> bool {
        self.requires_grad
    }

    /// Check if this is a leaf tensor (not created by an operation).
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Get the tensor's unique identifier.
    #[must_use]
    pub fn id(&self) -> TensorId {
        self.id
    }

    /// Get the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Get the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Device this tensor was placed on.
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Get a reference to the underlying data.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get a mutable reference to the underlying data.
    ///
    /// # Warning
    ///
    /// Modifying data directly may invalidate gradients.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the tensor and return its data.
    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Name of the operation that produced this tensor, if tracked.
    #[must_use]
    pub fn grad_fn_name(&self) -> Option<&'static str> {
        self.grad_fn.as_ref().map(|f| f.name())
    }

    /// Explicit transfer to another device.
    ///
    /// Returns a detached copy carrying the new placement; the original is
    /// left untouched.
    #[must_use]
    pub fn to_device(&self, device: Device) -> Tensor {
        self.detach().placed(device)
    }

    /// Detach tensor from computation graph.
    ///
    /// Returns a new tensor with the same data and placement but no gradient
    /// tracking.
    #[must_use]
    pub fn detach(&self) -> Tensor {
        Tensor {
            data: self.data.clone(),
            shape: self.shape.clone(),
            device: self.device,
            requires_grad: false,
            is_leaf: true,
            grad_fn: None,
            tape: None,
            id: TensorId::new(),
        }
    }

    /// Get a scalar value (for 0-d or 1-element tensors).
    ///
    /// # Panics
    ///
    /// Panics if the tensor has more than one element.
    #[must_use]
    pub fn item(&self) -> f32 {
        assert_eq!(
            self.numel(),
            1,
            "item() only works on tensors with exactly 1 element, got {}",
            self.numel()
        );
        self.data[0]
    }

    /// Compute gradients via backpropagation.
    ///
    /// Gradients land in the [`GradContext`](super::GradContext) this tensor
    /// was recorded on. A tensor that was never attached to a context has no
    /// tape and this is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if called on a tensor with more than one element
    /// (use `backward_with_grad` for non-scalar outputs).
    pub fn backward(&self) {
        assert_eq!(
            self.numel(),
            1,
            "backward() requires scalar output, got shape {:?}. Use backward_with_grad() instead.",
            self.shape
        );

        self.backward_with_grad(Tensor::ones(&self.shape));
    }

    /// Compute gradients with a specified output gradient.
    pub fn backward_with_grad(&self, grad_output: Tensor) {
        if let Some(tape) = &self.tape {
            tape.with(|graph| graph.backward(self.id, grad_output));
        }
    }

    /// Relabel placement without copying. Used by kernels whose output
    /// inherits the placement of their inputs.
    pub(crate) fn placed(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Attach this leaf to `tape` so later operations record onto it.
    pub(crate) fn attach(mut self, tape: Tape) -> Self {
        self.requires_grad = true;
        self.tape = Some(tape);
        self
    }

    /// Record the operation that produced `self` from `inputs`.
    ///
    /// Nothing is recorded unless some input requires gradients and some
    /// input carries a tape.
    pub(crate) fn record_op<F>(mut self, inputs: &[&Tensor], make_grad_fn: F) -> Tensor
    where
        F: FnOnce() -> Arc<dyn GradFn>,
    {
        if !inputs.iter().any(|t| t.requires_grad) {
            return self;
        }
        let Some(tape) = inputs.iter().find_map(|t| t.tape.clone()) else {
            return self;
        };

        let grad_fn = make_grad_fn();
        let input_ids = inputs.iter().map(|t| t.id).collect();
        tape.with(|graph| graph.record(self.id, Arc::clone(&grad_fn), input_ids));

        self.requires_grad = true;
        self.is_leaf = false;
        self.grad_fn = Some(grad_fn);
        self.tape = Some(tape);
        self
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("device", &self.device)
            .field("requires_grad", &self.requires_grad)
            .field("is_leaf", &self.is_leaf)
            .field("tracked", &self.tape.is_some())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Tensor {
    /// Value equality: same shape, device and data. Identity and tracking
    /// state are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.device == other.device && self.data == other.data
    }
}

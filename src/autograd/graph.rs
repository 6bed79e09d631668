//! Computation graph for automatic differentiation.
//!
//! This module implements the tape-based recording of operations, the
//! backward pass algorithm, and the caller-owned [`GradContext`] that holds
//! a tape for the duration of one gradient computation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::device::Device;

use super::grad_fn::GradFn;
use super::tensor::{Tensor, TensorId};

/// Entry in the computation tape.
#[derive(Clone)]
pub(crate) struct TapeEntry {
    /// ID of the output tensor
    pub output_id: TensorId,

    /// Function to compute gradients
    pub grad_fn: Arc<dyn GradFn>,

    /// IDs of input tensors
    pub input_ids: Vec<TensorId>,
}

/// Computation graph that records operations for backward pass.
///
/// The graph uses a tape-based approach where operations are recorded
/// in order during the forward pass, then gradients are computed in
/// reverse order during the backward pass. Only watched leaves keep their
/// gradient after `backward`; intermediate and parameter gradients are
/// dropped as soon as they have been propagated.
#[allow(missing_debug_implementations)]
pub struct ComputationGraph {
    /// Recorded operations (tape)
    tape: Vec<TapeEntry>,

    /// Watched leaves and the device their gradient must be placed on
    watched: HashMap<TensorId, Device>,

    /// Accumulated gradients of watched leaves
    grads: HashMap<TensorId, Tensor>,
}

impl ComputationGraph {
    /// Create a new empty computation graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tape: Vec::new(),
            watched: HashMap::new(),
            grads: HashMap::new(),
        }
    }

    /// Clear recorded operations, watched leaves and stored gradients.
    pub fn clear(&mut self) {
        self.tape.clear();
        self.watched.clear();
        self.grads.clear();
    }

    /// Register a leaf whose gradient should be kept after `backward`.
    pub fn watch(&mut self, id: TensorId, device: Device) {
        self.watched.insert(id, device);
    }

    /// Record an operation to the tape.
    pub fn record(
        &mut self,
        output_id: TensorId,
        grad_fn: Arc<dyn GradFn>,
        input_ids: Vec<TensorId>,
    ) {
        self.tape.push(TapeEntry {
            output_id,
            grad_fn,
            input_ids,
        });
    }

    /// Compute gradients via backpropagation.
    ///
    /// This implements the reverse-mode automatic differentiation algorithm:
    /// 1. Start with `grad_output` for the output tensor
    /// 2. Iterate through operations in reverse order
    /// 3. For each operation, compute gradients w.r.t. inputs
    /// 4. Accumulate gradients for tensors used multiple times
    /// 5. Keep the result only for watched leaves
    pub fn backward(&mut self, output_id: TensorId, grad_output: Tensor) {
        let mut grads: HashMap<TensorId, Tensor> = HashMap::new();
        grads.insert(output_id, grad_output);

        for entry in self.tape.iter().rev() {
            let grad_out = match grads.remove(&entry.output_id) {
                Some(g) => g,
                None => continue,
            };

            let input_grads = entry.grad_fn.backward(&grad_out);

            for (input_id, input_grad) in entry.input_ids.iter().zip(input_grads) {
                accumulate(&mut grads, *input_id, input_grad);
            }
        }

        for (id, device) in &self.watched {
            if let Some(grad) = grads.remove(id) {
                accumulate(&mut self.grads, *id, grad.placed(*device));
            }
        }
    }

    /// Get the number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tape.len()
    }

    /// Check if the tape is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    /// Get gradient for a watched tensor by ID (after backward).
    #[must_use]
    pub fn get_grad(&self, id: TensorId) -> Option<Tensor> {
        self.grads.get(&id).cloned()
    }

    /// Clear gradient for a specific tensor.
    pub fn clear_grad(&mut self, id: TensorId) {
        self.grads.remove(&id);
    }
}

impl Default for ComputationGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn accumulate(grads: &mut HashMap<TensorId, Tensor>, id: TensorId, grad: Tensor) {
    grads
        .entry(id)
        .and_modify(|existing| {
            for (a, b) in existing.data_mut().iter_mut().zip(grad.data()) {
                *a += b;
            }
        })
        .or_insert(grad);
}

/// Shared handle to a graph, carried by tracked tensors.
#[derive(Clone)]
pub(crate) struct Tape(Arc<Mutex<ComputationGraph>>);

impl Tape {
    fn new() -> Self {
        Tape(Arc::new(Mutex::new(ComputationGraph::new())))
    }

    /// Run `f` with exclusive access to the graph.
    pub(crate) fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ComputationGraph) -> R,
    {
        let mut graph = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut graph)
    }
}

/// Caller-owned gradient computation context.
///
/// Each context owns an independent tape. Two calls that use separate
/// contexts never share gradient storage, so a classifier can be evaluated
/// and differentiated concurrently from several threads without locks.
///
/// # Example
///
/// ```
/// use fgsm::autograd::{GradContext, Tensor};
///
/// let mut ctx = GradContext::new();
/// let x = ctx.watch(&Tensor::from_slice(&[1.0, -2.0]));
/// x.relu().sum().backward();
/// assert_eq!(ctx.grad(&x).unwrap().data(), &[1.0, 0.0]);
///
/// ctx.reset();
/// assert!(ctx.grad(&x).is_none());
/// ```
#[derive(Clone)]
pub struct GradContext {
    tape: Tape,
}

impl GradContext {
    /// Create a context with an empty tape.
    #[must_use]
    pub fn new() -> Self {
        Self { tape: Tape::new() }
    }

    /// Discard every recorded operation and stored gradient.
    pub fn reset(&mut self) {
        self.tape.with(ComputationGraph::clear);
    }

    /// Return a tracked copy of `tensor` attached to this context.
    ///
    /// The copy is a fresh leaf whose gradient is kept after `backward`.
    #[must_use]
    pub fn watch(&self, tensor: &Tensor) -> Tensor {
        let leaf = tensor.detach().attach(self.tape.clone());
        self.tape
            .with(|graph| graph.watch(leaf.id(), leaf.device()));
        leaf
    }

    /// Gradient of the last backward pass with respect to a watched tensor.
    #[must_use]
    pub fn grad(&self, tensor: &Tensor) -> Option<Tensor> {
        self.tape.with(|graph| graph.get_grad(tensor.id()))
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tape.with(|graph| graph.len())
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tape.with(|graph| graph.is_empty())
    }
}

impl Default for GradContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GradContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradContext")
            .field("ops", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::grad_fn::NegBackward;

    #[test]
    fn test_graph_creation() {
        let graph = ComputationGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn test_graph_clear() {
        let mut graph = ComputationGraph::new();
        let t = Tensor::from_slice(&[1.0, 2.0]);
        graph.watch(t.id(), t.device());
        graph.record(TensorId::new(), Arc::new(NegBackward), vec![t.id()]);

        assert_eq!(graph.len(), 1);
        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.watched.is_empty());
    }

    #[test]
    fn test_backward_simple() {
        let mut graph = ComputationGraph::new();

        let input = Tensor::from_slice(&[1.0, 2.0]);
        let input_id = input.id();
        graph.watch(input_id, Device::Cpu);

        let output_id = TensorId::new();
        graph.record(output_id, Arc::new(NegBackward), vec![input_id]);

        graph.backward(output_id, Tensor::from_slice(&[1.0, 1.0]));

        let grad = graph.get_grad(input_id).expect("watched leaf has a gradient");
        assert_eq!(grad.data(), &[-1.0, -1.0]);
    }

    #[test]
    fn test_backward_drops_unwatched_gradients() {
        let mut graph = ComputationGraph::new();

        let watched = TensorId::new();
        let parameter = TensorId::new();
        graph.watch(watched, Device::Cpu);

        let output_id = TensorId::new();
        graph.record(output_id, Arc::new(NegBackward), vec![watched]);
        let other = TensorId::new();
        graph.record(other, Arc::new(NegBackward), vec![parameter]);

        graph.backward(output_id, Tensor::from_slice(&[1.0]));

        assert!(graph.get_grad(watched).is_some());
        assert!(graph.get_grad(parameter).is_none());
    }

    #[test]
    fn test_backward_no_matching_output() {
        let mut graph = ComputationGraph::new();
        let watched = TensorId::new();
        graph.watch(watched, Device::Cpu);

        graph.backward(TensorId::new(), Tensor::from_slice(&[1.0]));

        assert!(graph.get_grad(watched).is_none());
    }

    #[test]
    fn test_gradient_placed_on_watched_device() {
        let mut graph = ComputationGraph::new();
        let watched = TensorId::new();
        graph.watch(watched, Device::Accelerator(3));

        let output_id = TensorId::new();
        graph.record(output_id, Arc::new(NegBackward), vec![watched]);
        graph.backward(output_id, Tensor::from_slice(&[2.0]));

        let grad = graph.get_grad(watched).unwrap();
        assert_eq!(grad.device(), Device::Accelerator(3));
    }

    #[test]
    fn test_repeated_backward_accumulates_until_reset() {
        let mut ctx = GradContext::new();
        let x = ctx.watch(&Tensor::from_slice(&[1.0, 2.0]));
        let y = x.sum();

        y.backward();
        y.backward();
        assert_eq!(ctx.grad(&x).unwrap().data(), &[2.0, 2.0]);

        ctx.reset();
        assert!(ctx.grad(&x).is_none());
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_clear_grad() {
        let ctx = GradContext::new();
        let x = ctx.watch(&Tensor::from_slice(&[1.0]));
        x.sum().backward();
        assert!(ctx.grad(&x).is_some());

        ctx.tape.with(|graph| graph.clear_grad(x.id()));
        assert!(ctx.grad(&x).is_none());
    }
}

//! Gradient function trait and implementations.
//!
//! Each differentiable operation implements `GradFn` to define
//! how gradients flow backward through the operation.

use super::tensor::Tensor;

/// Trait for functions that compute gradients during backward pass.
///
/// Each differentiable operation creates a `GradFn` implementation
/// that captures the necessary context for gradient computation.
///
/// # Example Implementation
///
/// For element-wise addition z = x + y:
/// - ∂z/∂x = 1
/// - ∂z/∂y = 1
///
/// So `backward(grad_output)` returns [`grad_output`, `grad_output`].
pub trait GradFn: Send + Sync {
    /// Compute gradients with respect to inputs.
    ///
    /// The order of the returned gradients matches the input order used
    /// during the forward pass.
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor>;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Element-wise Operations
// ============================================================================

/// Gradient function for addition: z = x + y
pub(crate) struct AddBackward;

impl GradFn for AddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x+y)/∂x = 1, ∂(x+y)/∂y = 1
        vec![grad_output.detach(), grad_output.detach()]
    }

    fn name(&self) -> &'static str {
        "AddBackward"
    }
}

/// Gradient function for subtraction: z = x - y
pub(crate) struct SubBackward;

impl GradFn for SubBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x-y)/∂x = 1, ∂(x-y)/∂y = -1
        vec![grad_output.detach(), negate(grad_output)]
    }

    fn name(&self) -> &'static str {
        "SubBackward"
    }
}

/// Gradient function for multiplication: z = x * y
pub(crate) struct MulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x*y)/∂x = y, ∂(x*y)/∂y = x
        let grad_x: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.y.data())
            .map(|(&g, &y)| g * y)
            .collect();
        let grad_y: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data())
            .map(|(&g, &x)| g * x)
            .collect();

        vec![
            Tensor::from_vec(grad_x, grad_output.shape()),
            Tensor::from_vec(grad_y, grad_output.shape()),
        ]
    }

    fn name(&self) -> &'static str {
        "MulBackward"
    }
}

/// Gradient function for scalar multiplication: z = x * c
pub(crate) struct MulScalarBackward {
    pub(crate) scalar: f32,
}

impl GradFn for MulScalarBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let grad: Vec<f32> = grad_output.data().iter().map(|&g| g * self.scalar).collect();
        vec![Tensor::from_vec(grad, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "MulScalarBackward"
    }
}

/// Gradient function for negation: z = -x
pub(crate) struct NegBackward;

impl GradFn for NegBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(-x)/∂x = -1
        vec![negate(grad_output)]
    }

    fn name(&self) -> &'static str {
        "NegBackward"
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

/// Gradient function for sum: z = sum(x)
pub(crate) struct SumBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂sum(x)/∂x_i = 1 for all i
        vec![Tensor::full(&self.input_shape, grad_output.item())]
    }

    fn name(&self) -> &'static str {
        "SumBackward"
    }
}

/// Gradient function for mean: z = mean(x)
pub(crate) struct MeanBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for MeanBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂mean(x)/∂x_i = 1/n for all i
        let numel: usize = self.input_shape.iter().product();
        let grad_val = grad_output.item() / numel as f32;
        vec![Tensor::full(&self.input_shape, grad_val)]
    }

    fn name(&self) -> &'static str {
        "MeanBackward"
    }
}

// ============================================================================
// Activation Functions
// ============================================================================

/// Gradient function for `ReLU`: z = max(0, x)
pub(crate) struct ReluBackward {
    pub(crate) x: Tensor,
}

impl GradFn for ReluBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂relu(x)/∂x = 1 if x > 0, else 0
        let grad: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data())
            .map(|(&g, &x)| if x > 0.0 { g } else { 0.0 })
            .collect();
        vec![Tensor::from_vec(grad, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "ReluBackward"
    }
}

// ============================================================================
// Linear Algebra
// ============================================================================

/// Gradient function for matmul: Z = X @ Y with X [m, k], Y [k, n]
pub(crate) struct MatmulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MatmulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂L/∂X = G @ Y^T, ∂L/∂Y = X^T @ G
        let (m, k) = (self.x.shape()[0], self.x.shape()[1]);
        let n = self.y.shape()[1];
        let g = grad_output.data();
        let x = self.x.data();
        let y = self.y.data();

        let mut grad_x = vec![0.0; m * k];
        for i in 0..m {
            for p in 0..k {
                let mut acc = 0.0;
                for j in 0..n {
                    acc += g[i * n + j] * y[p * n + j];
                }
                grad_x[i * k + p] = acc;
            }
        }

        let mut grad_y = vec![0.0; k * n];
        for p in 0..k {
            for i in 0..m {
                let x_ip = x[i * k + p];
                for j in 0..n {
                    grad_y[p * n + j] += x_ip * g[i * n + j];
                }
            }
        }

        vec![
            Tensor::from_vec(grad_x, &[m, k]),
            Tensor::from_vec(grad_y, &[k, n]),
        ]
    }

    fn name(&self) -> &'static str {
        "MatmulBackward"
    }
}

/// Gradient function for 2D transpose
pub(crate) struct TransposeBackward;

impl GradFn for TransposeBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (rows, cols) = (grad_output.shape()[0], grad_output.shape()[1]);
        let g = grad_output.data();
        let mut grad = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                grad[j * rows + i] = g[i * cols + j];
            }
        }
        vec![Tensor::from_vec(grad, &[cols, rows])]
    }

    fn name(&self) -> &'static str {
        "TransposeBackward"
    }
}

/// Gradient function for row-broadcast addition: Z = X + b, X [n, m], b [m]
pub(crate) struct BroadcastAddBackward {
    pub(crate) cols: usize,
}

impl GradFn for BroadcastAddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let mut grad_b = vec![0.0; self.cols];
        for row in grad_output.data().chunks(self.cols) {
            for (acc, &g) in grad_b.iter_mut().zip(row) {
                *acc += g;
            }
        }
        vec![
            grad_output.detach(),
            Tensor::from_vec(grad_b, &[self.cols]),
        ]
    }

    fn name(&self) -> &'static str {
        "BroadcastAddBackward"
    }
}

/// Gradient function for reshape
pub(crate) struct ViewBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for ViewBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![Tensor::new(grad_output.data(), &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "ViewBackward"
    }
}

// ============================================================================
// Convolution and Pooling
// ============================================================================

/// Gradient function for 2D convolution over `[N, C, H, W]` input.
///
/// Inputs are `[input, weight]` or `[input, weight, bias]`.
pub(crate) struct Conv2dBackward {
    pub(crate) input: Tensor,
    pub(crate) weight: Tensor,
    pub(crate) has_bias: bool,
    pub(crate) stride: (usize, usize),
    pub(crate) padding: (usize, usize),
}

impl GradFn for Conv2dBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let in_shape = self.input.shape();
        let (batch, in_c, in_h, in_w) = (in_shape[0], in_shape[1], in_shape[2], in_shape[3]);
        let w_shape = self.weight.shape();
        let (out_c, k_h, k_w) = (w_shape[0], w_shape[2], w_shape[3]);
        let out_shape = grad_output.shape();
        let (out_h, out_w) = (out_shape[2], out_shape[3]);
        let (stride_h, stride_w) = self.stride;
        let (pad_h, pad_w) = self.padding;

        let x = self.input.data();
        let w = self.weight.data();
        let g = grad_output.data();

        let mut grad_input = vec![0.0; x.len()];
        let mut grad_weight = vec![0.0; w.len()];
        let mut grad_bias = vec![0.0; out_c];

        for n in 0..batch {
            for oc in 0..out_c {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let g_val = g[((n * out_c + oc) * out_h + oh) * out_w + ow];
                        if g_val == 0.0 {
                            continue;
                        }
                        grad_bias[oc] += g_val;

                        for ic in 0..in_c {
                            for kh in 0..k_h {
                                let ih = oh * stride_h + kh;
                                if ih < pad_h || ih >= in_h + pad_h {
                                    continue;
                                }
                                let ih = ih - pad_h;
                                for kw in 0..k_w {
                                    let iw = ow * stride_w + kw;
                                    if iw < pad_w || iw >= in_w + pad_w {
                                        continue;
                                    }
                                    let iw = iw - pad_w;

                                    let x_idx = ((n * in_c + ic) * in_h + ih) * in_w + iw;
                                    let w_idx = ((oc * in_c + ic) * k_h + kh) * k_w + kw;
                                    grad_input[x_idx] += g_val * w[w_idx];
                                    grad_weight[w_idx] += g_val * x[x_idx];
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut grads = vec![
            Tensor::from_vec(grad_input, in_shape),
            Tensor::from_vec(grad_weight, w_shape),
        ];
        if self.has_bias {
            grads.push(Tensor::from_vec(grad_bias, &[out_c]));
        }
        grads
    }

    fn name(&self) -> &'static str {
        "Conv2dBackward"
    }
}

/// Gradient function for global average pooling `[N, C, H, W] -> [N, C]`
pub(crate) struct GlobalAvgPool2dBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for GlobalAvgPool2dBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let spatial = self.input_shape[2] * self.input_shape[3];
        let scale = 1.0 / spatial as f32;
        let grad: Vec<f32> = grad_output
            .data()
            .iter()
            .flat_map(|&g| std::iter::repeat(g * scale).take(spatial))
            .collect();
        vec![Tensor::from_vec(grad, &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "GlobalAvgPool2dBackward"
    }
}

// ============================================================================
// Loss Functions
// ============================================================================

/// Gradient function for Cross-Entropy Loss (combined softmax + NLL)
/// For L = -log(softmax(x)[target]), the gradient is:
/// ∂`L/∂x_i` = softmax(x)_i - 1 if i == target else softmax(x)_i
/// This is simply: grad = softmax(logits) - `one_hot(targets)`
pub(crate) struct CrossEntropyBackward {
    pub(crate) softmax_output: Tensor,
    pub(crate) targets: Vec<usize>,
    /// Divide by batch size (mean reduction)
    pub(crate) mean: bool,
    /// Loss was left per sample (no reduction)
    pub(crate) per_sample: bool,
}

impl GradFn for CrossEntropyBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (batch, classes) = (
            self.softmax_output.shape()[0],
            self.softmax_output.shape()[1],
        );
        let scale = if self.mean { 1.0 / batch as f32 } else { 1.0 };

        let mut grad = self.softmax_output.data().to_vec();
        for (b, &target) in self.targets.iter().enumerate() {
            let row = &mut grad[b * classes..(b + 1) * classes];
            row[target] -= 1.0;

            let upstream = if self.per_sample {
                grad_output.data()[b]
            } else {
                grad_output.item()
            };
            for v in row.iter_mut() {
                *v *= upstream * scale;
            }
        }

        vec![Tensor::from_vec(grad, &[batch, classes])]
    }

    fn name(&self) -> &'static str {
        "CrossEntropyBackward"
    }
}

fn negate(t: &Tensor) -> Tensor {
    let data: Vec<f32> = t.data().iter().map(|&g| -g).collect();
    Tensor::from_vec(data, t.shape())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_backward() {
        let grads = AddBackward.backward(&Tensor::from_slice(&[1.0, 2.0]));
        assert_eq!(grads.len(), 2);
        assert_eq!(grads[0].data(), &[1.0, 2.0]);
        assert_eq!(grads[1].data(), &[1.0, 2.0]);
    }

    #[test]
    fn test_sub_backward() {
        let grads = SubBackward.backward(&Tensor::from_slice(&[1.0, -2.0]));
        assert_eq!(grads[1].data(), &[-1.0, 2.0]);
    }

    #[test]
    fn test_cross_entropy_backward_mean() {
        let grad_fn = CrossEntropyBackward {
            softmax_output: Tensor::new(&[0.25, 0.75, 0.5, 0.5], &[2, 2]),
            targets: vec![1, 0],
            mean: true,
            per_sample: false,
        };
        let grads = grad_fn.backward(&Tensor::from_slice(&[1.0]));
        assert_eq!(grads[0].data(), &[0.125, -0.125, -0.25, 0.25]);
    }

    #[test]
    fn test_global_avg_pool_backward_spreads_evenly() {
        let grad_fn = GlobalAvgPool2dBackward {
            input_shape: vec![1, 2, 2, 2],
        };
        let grads = grad_fn.backward(&Tensor::new(&[4.0, 8.0], &[1, 2]));
        assert_eq!(grads[0].data(), &[1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_names() {
        assert_eq!(NegBackward.name(), "NegBackward");
        assert_eq!(TransposeBackward.name(), "TransposeBackward");
    }
}

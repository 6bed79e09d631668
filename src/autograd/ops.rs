//! Differentiable operations for tensors.
//!
//! Each operation:
//! 1. Checks that its operands share a device
//! 2. Computes the forward result on the operands' device
//! 3. Records a `GradFn` onto the operands' tape, if any operand is tracked

use std::sync::Arc;

use super::grad_fn::{
    AddBackward, BroadcastAddBackward, Conv2dBackward, GlobalAvgPool2dBackward, MatmulBackward,
    MeanBackward, MulBackward, MulScalarBackward, NegBackward, ReluBackward, SubBackward,
    SumBackward, TransposeBackward, ViewBackward,
};
use super::tensor::Tensor;

fn assert_same_placement(op: &str, a: &Tensor, b: &Tensor) {
    assert_eq!(
        a.device(),
        b.device(),
        "{op}: operands on different devices ({} vs {})",
        a.device(),
        b.device()
    );
}

fn assert_same_shape(op: &str, a: &Tensor, b: &Tensor) {
    assert_eq!(
        a.shape(),
        b.shape(),
        "{op}: shape mismatch {:?} vs {:?}",
        a.shape(),
        b.shape()
    );
}

// ============================================================================
// Element-wise Operations
// ============================================================================

impl Tensor {
    /// Element-wise addition: z = self + other
    #[must_use]
    pub fn add(&self, other: &Tensor) -> Tensor {
        assert_same_shape("add", self, other);
        assert_same_placement("add", self, other);

        let data: Vec<f32> = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(&a, &b)| a + b)
            .collect();

        Tensor::from_vec(data, self.shape())
            .placed(self.device())
            .record_op(&[self, other], || Arc::new(AddBackward))
    }

    /// Element-wise subtraction: z = self - other
    #[must_use]
    pub fn sub(&self, other: &Tensor) -> Tensor {
        assert_same_shape("sub", self, other);
        assert_same_placement("sub", self, other);

        let data: Vec<f32> = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(&a, &b)| a - b)
            .collect();

        Tensor::from_vec(data, self.shape())
            .placed(self.device())
            .record_op(&[self, other], || Arc::new(SubBackward))
    }

    /// Element-wise multiplication: z = self * other
    #[must_use]
    pub fn mul(&self, other: &Tensor) -> Tensor {
        assert_same_shape("mul", self, other);
        assert_same_placement("mul", self, other);

        let data: Vec<f32> = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(&a, &b)| a * b)
            .collect();

        Tensor::from_vec(data, self.shape())
            .placed(self.device())
            .record_op(&[self, other], || {
                Arc::new(MulBackward {
                    x: self.detach(),
                    y: other.detach(),
                })
            })
    }

    /// Element-wise negation: z = -self
    #[must_use]
    pub fn neg(&self) -> Tensor {
        let data: Vec<f32> = self.data().iter().map(|&a| -a).collect();

        Tensor::from_vec(data, self.shape())
            .placed(self.device())
            .record_op(&[self], || Arc::new(NegBackward))
    }

    /// Scalar multiplication: z = self * scalar
    #[must_use]
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let data: Vec<f32> = self.data().iter().map(|&a| a * scalar).collect();

        Tensor::from_vec(data, self.shape())
            .placed(self.device())
            .record_op(&[self], || Arc::new(MulScalarBackward { scalar }))
    }

    /// Element-wise sign with `sign(0) = 0`. Never tracked.
    #[must_use]
    pub fn sign(&self) -> Tensor {
        let data: Vec<f32> = self
            .data()
            .iter()
            .map(|&a| {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            })
            .collect();

        Tensor::from_vec(data, self.shape()).placed(self.device())
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

impl Tensor {
    /// Sum all elements: z = sum(self)
    #[must_use]
    pub fn sum(&self) -> Tensor {
        let sum: f32 = self.data().iter().sum();

        Tensor::from_vec(vec![sum], &[1])
            .placed(self.device())
            .record_op(&[self], || {
                Arc::new(SumBackward {
                    input_shape: self.shape().to_vec(),
                })
            })
    }

    /// Mean of all elements: z = mean(self)
    #[must_use]
    pub fn mean(&self) -> Tensor {
        let sum: f32 = self.data().iter().sum();
        let mean = sum / self.numel() as f32;

        Tensor::from_vec(vec![mean], &[1])
            .placed(self.device())
            .record_op(&[self], || {
                Arc::new(MeanBackward {
                    input_shape: self.shape().to_vec(),
                })
            })
    }
}

// ============================================================================
// Activation Functions
// ============================================================================

impl Tensor {
    /// `ReLU` activation: z = max(0, self)
    #[must_use]
    pub fn relu(&self) -> Tensor {
        let data: Vec<f32> = self.data().iter().map(|&a| a.max(0.0)).collect();

        Tensor::from_vec(data, self.shape())
            .placed(self.device())
            .record_op(&[self], || Arc::new(ReluBackward { x: self.detach() }))
    }
}

// ============================================================================
// Linear Algebra
// ============================================================================

impl Tensor {
    /// Matrix multiplication: z = self @ other
    ///
    /// Supports 2D tensors only.
    #[must_use]
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "matmul requires 2D tensors");
        assert_eq!(other.ndim(), 2, "matmul requires 2D tensors");
        assert_same_placement("matmul", self, other);

        let (m, k1) = (self.shape()[0], self.shape()[1]);
        let (k2, n) = (other.shape()[0], other.shape()[1]);
        assert_eq!(k1, k2, "matmul dimension mismatch: {k1} vs {k2}");

        let a = self.data();
        let b = other.data();
        let mut data = vec![0.0; m * n];
        for i in 0..m {
            for p in 0..k1 {
                let a_ip = a[i * k1 + p];
                if a_ip == 0.0 {
                    continue;
                }
                let row = &b[p * n..(p + 1) * n];
                for (out, &b_pj) in data[i * n..(i + 1) * n].iter_mut().zip(row) {
                    *out += a_ip * b_pj;
                }
            }
        }

        Tensor::from_vec(data, &[m, n])
            .placed(self.device())
            .record_op(&[self, other], || {
                Arc::new(MatmulBackward {
                    x: self.detach(),
                    y: other.detach(),
                })
            })
    }

    /// Transpose a 2D tensor.
    #[must_use]
    pub fn transpose(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "transpose requires 2D tensor");

        let (rows, cols) = (self.shape()[0], self.shape()[1]);
        let src = self.data();
        let mut data = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                data[j * rows + i] = src[i * cols + j];
            }
        }

        Tensor::from_vec(data, &[cols, rows])
            .placed(self.device())
            .record_op(&[self], || Arc::new(TransposeBackward))
    }

    /// Broadcast addition: z = matrix + vector (broadcasts over rows).
    ///
    /// # Shape
    ///
    /// - self: `[N, M]` (2D matrix)
    /// - other: `[M]` (1D vector)
    /// - output: `[N, M]`
    #[must_use]
    pub fn broadcast_add(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "broadcast_add requires 2D matrix");
        assert_eq!(other.ndim(), 1, "broadcast_add requires 1D vector");
        assert_eq!(
            self.shape()[1],
            other.shape()[0],
            "Matrix columns {} must match vector length {}",
            self.shape()[1],
            other.shape()[0]
        );
        assert_same_placement("broadcast_add", self, other);

        let cols = self.shape()[1];
        let data: Vec<f32> = self
            .data()
            .chunks(cols)
            .flat_map(|row| row.iter().zip(other.data()).map(|(&x, &b)| x + b))
            .collect();

        Tensor::from_vec(data, self.shape())
            .placed(self.device())
            .record_op(&[self, other], || Arc::new(BroadcastAddBackward { cols }))
    }

    /// Reshape tensor to a new shape (view).
    ///
    /// The total number of elements must remain the same.
    #[must_use]
    pub fn view(&self, new_shape: &[usize]) -> Tensor {
        let new_numel: usize = new_shape.iter().product();
        assert_eq!(
            self.numel(),
            new_numel,
            "view: number of elements must match ({} vs {new_numel})",
            self.numel()
        );

        Tensor::new(self.data(), new_shape)
            .placed(self.device())
            .record_op(&[self], || {
                Arc::new(ViewBackward {
                    input_shape: self.shape().to_vec(),
                })
            })
    }
}

// ============================================================================
// Convolution and Pooling
// ============================================================================

impl Tensor {
    /// 2D cross-correlation of a `[N, C, H, W]` input with a
    /// `[O, C, KH, KW]` kernel, zero padding.
    #[must_use]
    pub fn conv2d(
        &self,
        weight: &Tensor,
        bias: Option<&Tensor>,
        stride: (usize, usize),
        padding: (usize, usize),
    ) -> Tensor {
        assert_eq!(
            self.ndim(),
            4,
            "conv2d expects 4D input [N, C, H, W], got {}D",
            self.ndim()
        );
        assert_eq!(weight.ndim(), 4, "conv2d expects 4D weight [O, C, KH, KW]");
        assert_same_placement("conv2d", self, weight);

        let shape = self.shape();
        let (batch, in_c, in_h, in_w) = (shape[0], shape[1], shape[2], shape[3]);
        let w_shape = weight.shape();
        let (out_c, k_h, k_w) = (w_shape[0], w_shape[2], w_shape[3]);
        assert_eq!(
            in_c, w_shape[1],
            "Expected {} input channels, got {in_c}",
            w_shape[1]
        );
        let (stride_h, stride_w) = stride;
        let (pad_h, pad_w) = padding;
        assert!(
            in_h + 2 * pad_h >= k_h && in_w + 2 * pad_w >= k_w,
            "conv2d kernel {k_h}x{k_w} larger than padded input {in_h}x{in_w}"
        );

        let out_h = (in_h + 2 * pad_h - k_h) / stride_h + 1;
        let out_w = (in_w + 2 * pad_w - k_w) / stride_w + 1;

        let x = self.data();
        let w = weight.data();
        let mut output = vec![0.0; batch * out_c * out_h * out_w];

        for n in 0..batch {
            for oc in 0..out_c {
                let b = bias.map_or(0.0, |b| b.data()[oc]);
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let mut sum = b;
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
                                    sum += x[((n * in_c + ic) * in_h + ih) * in_w + iw]
                                        * w[((oc * in_c + ic) * k_h + kh) * k_w + kw];
                                }
                            }
                        }
                        output[((n * out_c + oc) * out_h + oh) * out_w + ow] = sum;
                    }
                }
            }
        }

        let result = Tensor::from_vec(output, &[batch, out_c, out_h, out_w]).placed(self.device());
        let make_grad_fn = || -> Arc<dyn super::GradFn> {
            Arc::new(Conv2dBackward {
                input: self.detach(),
                weight: weight.detach(),
                has_bias: bias.is_some(),
                stride,
                padding,
            })
        };
        match bias {
            Some(b) => {
                assert_same_placement("conv2d", self, b);
                result.record_op(&[self, weight, b], make_grad_fn)
            }
            None => result.record_op(&[self, weight], make_grad_fn),
        }
    }

    /// Global average pooling: `[N, C, H, W] -> [N, C]`.
    #[must_use]
    pub fn global_avg_pool2d(&self) -> Tensor {
        assert_eq!(
            self.ndim(),
            4,
            "global_avg_pool2d expects 4D input [N, C, H, W]"
        );

        let shape = self.shape();
        let (batch, channels, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let spatial = h * w;
        let data: Vec<f32> = self
            .data()
            .chunks(spatial)
            .map(|plane| plane.iter().sum::<f32>() / spatial as f32)
            .collect();

        Tensor::from_vec(data, &[batch, channels])
            .placed(self.device())
            .record_op(&[self], || {
                Arc::new(GlobalAvgPool2dBackward {
                    input_shape: self.shape().to_vec(),
                })
            })
    }
}

//! 2D convolutional layer.
//!
//! Valid (no padding) convolution with a fused ReLU activation, implemented
//! with explicit loops over batch, output position, channel, and kernel
//! offset. The backward pass derives the weight, bias, and input gradients
//! by hand and applies the SGD step in place.

use crate::error::{NetworkError, Result};
use crate::layers::SpatialLayer;
use crate::tensor::Tensor;
use crate::utils::SimpleRng;

/// Transient state saved by `forward` for the matching `backward` call.
struct ConvCache {
    input: Tensor,
    /// True where the pre-activation output was positive (ReLU kept it).
    relu_mask: Vec<bool>,
}

/// 2D convolutional layer with learnable filters and a fused ReLU.
///
/// Operates on channel-last tensors (batch, height, width, channels).
/// Filters are stored as (out_channels, in_channels, kernel_h, kernel_w);
/// output spatial size is `input - kernel + 1` per axis (valid convolution),
/// and must stay strictly positive.
///
/// Weights are initialized from Normal(0, 0.01), biases to zero.
///
/// # Example
///
/// ```
/// use convnet::layers::{Conv2D, SpatialLayer};
/// use convnet::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// // 1 input channel, 8 filters, 3x3 kernel
/// let layer = Conv2D::new(1, 8, 3, 3, &mut rng);
/// assert_eq!(layer.parameter_count(), 8 * 9 + 8);
/// ```
pub struct Conv2D {
    in_channels: usize,
    out_channels: usize,
    kernel_h: usize,
    kernel_w: usize,
    weights: Vec<f32>, // [out_channels * in_channels * kernel_h * kernel_w]
    biases: Vec<f32>,  // [out_channels]
    cache: Option<ConvCache>,
}

impl Conv2D {
    /// Create a new convolutional layer.
    ///
    /// # Panics
    ///
    /// Panics if any of the channel or kernel dimensions is zero; topology
    /// validation happens in the config layer before construction.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_h: usize,
        kernel_w: usize,
        rng: &mut SimpleRng,
    ) -> Self {
        assert!(
            in_channels > 0 && out_channels > 0 && kernel_h > 0 && kernel_w > 0,
            "conv2d dimensions must be positive"
        );

        let weight_count = out_channels * in_channels * kernel_h * kernel_w;
        let mut weights = vec![0.0f32; weight_count];
        for value in &mut weights {
            *value = rng.next_normal_f32(0.0, 0.01);
        }

        Self {
            in_channels,
            out_channels,
            kernel_h,
            kernel_w,
            weights,
            biases: vec![0.0f32; out_channels],
            cache: None,
        }
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Kernel size as (height, width).
    pub fn kernel_size(&self) -> (usize, usize) {
        (self.kernel_h, self.kernel_w)
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    /// Replace the filter weights, e.g. to pin a known kernel in tests.
    pub fn set_weights(&mut self, weights: Vec<f32>) {
        assert_eq!(weights.len(), self.weights.len(), "weight buffer length mismatch");
        self.weights = weights;
    }

    pub fn set_biases(&mut self, biases: Vec<f32>) {
        assert_eq!(biases.len(), self.biases.len(), "bias buffer length mismatch");
        self.biases = biases;
    }

    /// Flat offset of weight (oc, ic, kh, kw).
    #[inline]
    fn w_idx(&self, oc: usize, ic: usize, kh: usize, kw: usize) -> usize {
        ((oc * self.in_channels + ic) * self.kernel_h + kh) * self.kernel_w + kw
    }

    fn check_input(&self, input: &Tensor) -> Result<(usize, usize)> {
        if input.channels() != self.in_channels {
            return Err(NetworkError::ShapeMismatch {
                layer: "conv2d",
                expected: format!("{} input channels", self.in_channels),
                actual: format!("{} input channels", input.channels()),
            });
        }
        if input.height() < self.kernel_h || input.width() < self.kernel_w {
            return Err(NetworkError::Config(format!(
                "conv2d output would be non-positive: input {}x{} with kernel {}x{}",
                input.height(),
                input.width(),
                self.kernel_h,
                self.kernel_w
            )));
        }
        Ok((
            input.height() - self.kernel_h + 1,
            input.width() - self.kernel_w + 1,
        ))
    }
}

impl SpatialLayer for Conv2D {
    fn name(&self) -> &'static str {
        "conv2d"
    }

    /// Valid convolution plus bias, then ReLU. Saves the input tensor and
    /// the ReLU mask for the next backward call.
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let (out_h, out_w) = self.check_input(input)?;
        let batch = input.batch();

        let mut output = Tensor::zeros(batch, out_h, out_w, self.out_channels);
        let mut relu_mask = vec![false; batch * out_h * out_w * self.out_channels];

        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    for oc in 0..self.out_channels {
                        let mut sum = 0.0f32;
                        for ic in 0..self.in_channels {
                            for kh in 0..self.kernel_h {
                                for kw in 0..self.kernel_w {
                                    sum += input.get(b, oh + kh, ow + kw, ic)
                                        * self.weights[self.w_idx(oc, ic, kh, kw)];
                                }
                            }
                        }
                        let pre = sum + self.biases[oc];
                        let out_i = output.idx(b, oh, ow, oc);
                        relu_mask[out_i] = pre > 0.0;
                        output.data_mut()[out_i] = if pre > 0.0 { pre } else { 0.0 };
                    }
                }
            }
        }

        self.cache = Some(ConvCache {
            input: input.clone(),
            relu_mask,
        });
        Ok(output)
    }

    /// Masks the upstream gradient by the stored ReLU mask, accumulates the
    /// bias gradient (sum over batch and positions), the weight gradient
    /// (input value times masked gradient), and the input gradient (the
    /// transposed convolution), then applies `w -= lr * grad` in place.
    ///
    /// The weight and bias gradients are raw sums over the batch; no
    /// batch-size normalization is applied at this layer.
    fn backward(&mut self, grad_output: &Tensor, learning_rate: f32) -> Result<Tensor> {
        let ConvCache { input, relu_mask } =
            self.cache
                .take()
                .ok_or(NetworkError::MissingForwardState { layer: "conv2d" })?;

        let (out_h, out_w) = self.check_input(&input)?;
        let batch = input.batch();
        let expected = [batch, out_h, out_w, self.out_channels];
        if grad_output.shape() != expected {
            return Err(NetworkError::ShapeMismatch {
                layer: "conv2d",
                expected: format!("{:?} gradient", expected),
                actual: format!("{:?} gradient", grad_output.shape()),
            });
        }

        // Zero the gradient wherever ReLU clipped the forward output.
        let mut masked = grad_output.data().to_vec();
        for (g, &kept) in masked.iter_mut().zip(relu_mask.iter()) {
            if !kept {
                *g = 0.0;
            }
        }

        let mut grad_weights = vec![0.0f32; self.weights.len()];
        let mut grad_biases = vec![0.0f32; self.biases.len()];
        let mut grad_input = Tensor::zeros(batch, input.height(), input.width(), self.in_channels);

        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    for oc in 0..self.out_channels {
                        let g = masked[grad_output.idx(b, oh, ow, oc)];
                        grad_biases[oc] += g;

                        for ic in 0..self.in_channels {
                            for kh in 0..self.kernel_h {
                                for kw in 0..self.kernel_w {
                                    let w_i = self.w_idx(oc, ic, kh, kw);
                                    grad_weights[w_i] += input.get(b, oh + kh, ow + kw, ic) * g;

                                    // Input positions are touched by several
                                    // output positions, so accumulate.
                                    let in_i = grad_input.idx(b, oh + kh, ow + kw, ic);
                                    grad_input.data_mut()[in_i] += self.weights[w_i] * g;
                                }
                            }
                        }
                    }
                }
            }
        }

        for (w, g) in self.weights.iter_mut().zip(grad_weights.iter()) {
            *w -= learning_rate * g;
        }
        for (b, g) in self.biases.iter_mut().zip(grad_biases.iter()) {
            *b -= learning_rate * g;
        }

        Ok(grad_input)
    }

    fn output_shape(&self, input: [usize; 3]) -> Result<[usize; 3]> {
        let [h, w, c] = input;
        if c != self.in_channels {
            return Err(NetworkError::ShapeMismatch {
                layer: "conv2d",
                expected: format!("{} input channels", self.in_channels),
                actual: format!("{} input channels", c),
            });
        }
        if h < self.kernel_h || w < self.kernel_w {
            return Err(NetworkError::Config(format!(
                "conv2d output would be non-positive: input {}x{} with kernel {}x{}",
                h, w, self.kernel_h, self.kernel_w
            )));
        }
        Ok([h - self.kernel_h + 1, w - self.kernel_w + 1, self.out_channels])
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

//! Layer abstractions for the network.
//!
//! Spatial layers (convolution, pooling) implement [`SpatialLayer`] and are
//! chained as trait objects; the dense stage uses [`DenseLayer`] directly.
//! Each layer owns its parameters and its per-call transient state.

pub mod conv2d;
pub mod dense;
pub mod maxpool;

pub use conv2d::Conv2D;
pub use dense::DenseLayer;
pub use maxpool::MaxPool2D;

use crate::error::Result;
use crate::tensor::Tensor;

/// Common interface for layers operating on 4-D spatial tensors.
///
/// `forward` stores whatever transient state (saved input, activation mask)
/// the matching `backward` call needs; `backward` consumes that state, so
/// calling it twice, or before any forward pass, is an error rather than a
/// silent reuse of stale data.
pub trait SpatialLayer {
    /// Layer name used in error messages.
    fn name(&self) -> &'static str;

    /// Forward propagation. Allocates and returns a fresh output tensor.
    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    /// Backward propagation. Computes the gradient w.r.t. the layer input,
    /// applies any parameter update in place, and returns the input gradient
    /// for the preceding layer.
    ///
    /// `learning_rate` is accepted by every spatial layer for interface
    /// uniformity; layers without learnable parameters ignore it.
    fn backward(&mut self, grad_output: &Tensor, learning_rate: f32) -> Result<Tensor>;

    /// Spatial output dimensions (height, width, channels) for a given input,
    /// without running any data through the layer. Fails on dimensions the
    /// layer cannot accept or that would collapse to zero.
    fn output_shape(&self, input: [usize; 3]) -> Result<[usize; 3]>;

    /// Number of trainable parameters (weights plus biases).
    fn parameter_count(&self) -> usize;
}

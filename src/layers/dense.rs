//! Dense (fully connected) layer.
//!
//! Performs the per-sample transformation `y = activation(x * W + b)` with
//! W stored row-major as (input_size, output_size). The activation is one of
//! the closed [`Activation`] variants; softmax output layers rely on the
//! cross-entropy gradient shortcut in the backward pass.

use crate::error::{NetworkError, Result};
use crate::tensor::Matrix;
use crate::utils::{Activation, SimpleRng};

/// Fully connected layer with a configurable activation.
///
/// Weights are initialized from Normal(0, 0.01), biases to zero.
///
/// `backward` treats the upstream gradient as the gradient w.r.t. this
/// layer's pre-activation. The weight and bias gradients are normalized by
/// the batch size before the in-place update; the input gradient it returns
/// is left un-normalized.
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    activation: Activation,
    weights: Vec<f32>, // [input_size * output_size], row-major
    biases: Vec<f32>,  // [output_size]
    /// Input saved by `forward` for the matching `backward` call.
    cache: Option<Matrix>,
}

impl DenseLayer {
    /// Create a new dense layer.
    ///
    /// # Panics
    ///
    /// Panics if `input_size` or `output_size` is zero; topology validation
    /// happens in the config layer before construction.
    pub fn new(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut SimpleRng,
    ) -> Self {
        assert!(
            input_size > 0 && output_size > 0,
            "dense dimensions must be positive"
        );

        let mut weights = vec![0.0f32; input_size * output_size];
        for value in &mut weights {
            *value = rng.next_normal_f32(0.0, 0.01);
        }

        Self {
            input_size,
            output_size,
            activation,
            weights,
            biases: vec![0.0f32; output_size],
            cache: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    /// Replace the weight matrix, e.g. to pin known values in tests.
    pub fn set_weights(&mut self, weights: Vec<f32>) {
        assert_eq!(weights.len(), self.weights.len(), "weight buffer length mismatch");
        self.weights = weights;
    }

    pub fn set_biases(&mut self, biases: Vec<f32>) {
        assert_eq!(biases.len(), self.biases.len(), "bias buffer length mismatch");
        self.biases = biases;
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Affine transform per sample, then the configured activation.
    /// Saves the input for the matching backward call.
    pub fn forward(&mut self, input: &Matrix) -> Result<Matrix> {
        if input.cols != self.input_size {
            return Err(NetworkError::ShapeMismatch {
                layer: "dense",
                expected: format!("{} input features", self.input_size),
                actual: format!("{} input features", input.cols),
            });
        }

        let batch = input.rows;
        let mut output = Matrix::zeros(batch, self.output_size);
        for b in 0..batch {
            for j in 0..self.output_size {
                let mut sum = self.biases[j];
                for i in 0..self.input_size {
                    sum += input.get(b, i) * self.weights[i * self.output_size + j];
                }
                output.set(b, j, sum);
            }
        }
        self.activation
            .apply(&mut output.data, batch, self.output_size);

        self.cache = Some(input.clone());
        Ok(output)
    }

    /// Backward pass and in-place SGD step.
    ///
    /// `grad_output` is taken as already being the gradient w.r.t. this
    /// layer's pre-activation; the caller is responsible for the matching
    /// loss-gradient convention (the softmax output layer is fed the
    /// combined softmax/cross-entropy gradient). Accumulates the
    /// batch-summed weight and bias gradients, divides them by the batch
    /// size, updates in place, and returns the input gradient
    /// `grad_output * W^T` without batch normalization.
    pub fn backward(&mut self, grad_output: &Matrix, learning_rate: f32) -> Result<Matrix> {
        let input = self
            .cache
            .take()
            .ok_or(NetworkError::MissingForwardState { layer: "dense" })?;

        let batch = input.rows;
        if grad_output.rows != batch || grad_output.cols != self.output_size {
            return Err(NetworkError::ShapeMismatch {
                layer: "dense",
                expected: format!("{}x{} gradient", batch, self.output_size),
                actual: format!("{}x{} gradient", grad_output.rows, grad_output.cols),
            });
        }

        let mut grad_weights = vec![0.0f32; self.weights.len()];
        let mut grad_biases = vec![0.0f32; self.biases.len()];
        let mut grad_input = Matrix::zeros(batch, self.input_size);

        for b in 0..batch {
            for j in 0..self.output_size {
                let g = grad_output.get(b, j);
                grad_biases[j] += g;
                for i in 0..self.input_size {
                    grad_weights[i * self.output_size + j] += input.get(b, i) * g;
                    let gi = grad_input.get(b, i) + self.weights[i * self.output_size + j] * g;
                    grad_input.set(b, i, gi);
                }
            }
        }

        let scale = 1.0 / batch as f32;
        for (w, g) in self.weights.iter_mut().zip(grad_weights.iter()) {
            *w -= learning_rate * g * scale;
        }
        for (b, g) in self.biases.iter_mut().zip(grad_biases.iter()) {
            *b -= learning_rate * g * scale;
        }

        Ok(grad_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_layer_creation() {
        let mut rng = SimpleRng::new(42);
        let layer = DenseLayer::new(10, 5, Activation::Relu, &mut rng);

        assert_eq!(layer.input_size(), 10);
        assert_eq!(layer.output_size(), 5);
        assert_eq!(layer.weights().len(), 50);
        assert_eq!(layer.biases().len(), 5);
        assert_eq!(layer.parameter_count(), 55);
    }

    #[test]
    fn test_dense_biases_start_at_zero() {
        let mut rng = SimpleRng::new(42);
        let layer = DenseLayer::new(4, 3, Activation::Softmax, &mut rng);
        for &b in layer.biases() {
            assert_eq!(b, 0.0);
        }
    }

    #[test]
    fn test_deterministic_initialization() {
        let mut rng1 = SimpleRng::new(42);
        let layer1 = DenseLayer::new(10, 5, Activation::Relu, &mut rng1);

        let mut rng2 = SimpleRng::new(42);
        let layer2 = DenseLayer::new(10, 5, Activation::Relu, &mut rng2);

        assert_eq!(layer1.weights(), layer2.weights());
    }

    #[test]
    fn test_dense_forward_rejects_wrong_feature_count() {
        let mut rng = SimpleRng::new(42);
        let mut layer = DenseLayer::new(4, 2, Activation::Relu, &mut rng);
        let input = Matrix::zeros(1, 3);
        assert!(layer.forward(&input).is_err());
    }

    #[test]
    fn test_dense_backward_requires_forward() {
        let mut rng = SimpleRng::new(42);
        let mut layer = DenseLayer::new(4, 2, Activation::Relu, &mut rng);
        let grad = Matrix::zeros(1, 2);
        assert!(matches!(
            layer.backward(&grad, 0.01),
            Err(NetworkError::MissingForwardState { .. })
        ));
    }
}

//! 2x2 max-pooling layer.
//!
//! Non-overlapping spatial downsampling with no learnable parameters. The
//! backward pass routes each upstream gradient to the position that won the
//! forward maximum, recomputed from the saved input.

use crate::error::{NetworkError, Result};
use crate::layers::SpatialLayer;
use crate::tensor::Tensor;

const POOL: usize = 2;

/// Max pooling over non-overlapping 2x2 windows, stride 2.
///
/// Odd trailing rows/columns are dropped (floor division). Within a window,
/// ties go to the first maximum in row-major order.
pub struct MaxPool2D {
    cache: Option<Tensor>,
}

impl MaxPool2D {
    pub fn new() -> Self {
        Self { cache: None }
    }
}

impl Default for MaxPool2D {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialLayer for MaxPool2D {
    fn name(&self) -> &'static str {
        "maxpool2d"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let [out_h, out_w, channels] =
            self.output_shape([input.height(), input.width(), input.channels()])?;
        let batch = input.batch();

        let mut output = Tensor::zeros(batch, out_h, out_w, channels);
        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    for c in 0..channels {
                        let mut best = f32::NEG_INFINITY;
                        for dy in 0..POOL {
                            for dx in 0..POOL {
                                let v = input.get(b, oh * POOL + dy, ow * POOL + dx, c);
                                if v > best {
                                    best = v;
                                }
                            }
                        }
                        output.set(b, oh, ow, c, best);
                    }
                }
            }
        }

        self.cache = Some(input.clone());
        Ok(output)
    }

    /// Recomputes each window's argmax from the saved input and accumulates
    /// the upstream gradient there; every other position gets zero.
    fn backward(&mut self, grad_output: &Tensor, _learning_rate: f32) -> Result<Tensor> {
        let input = self
            .cache
            .take()
            .ok_or(NetworkError::MissingForwardState { layer: "maxpool2d" })?;

        let out_h = input.height() / POOL;
        let out_w = input.width() / POOL;
        let channels = input.channels();
        let batch = input.batch();
        let expected = [batch, out_h, out_w, channels];
        if grad_output.shape() != expected {
            return Err(NetworkError::ShapeMismatch {
                layer: "maxpool2d",
                expected: format!("{:?} gradient", expected),
                actual: format!("{:?} gradient", grad_output.shape()),
            });
        }

        let mut grad_input = Tensor::zeros(batch, input.height(), input.width(), channels);
        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    for c in 0..channels {
                        // Strict comparison keeps the first maximum in
                        // row-major order on ties.
                        let mut best = f32::NEG_INFINITY;
                        let mut best_dy = 0;
                        let mut best_dx = 0;
                        for dy in 0..POOL {
                            for dx in 0..POOL {
                                let v = input.get(b, oh * POOL + dy, ow * POOL + dx, c);
                                if v > best {
                                    best = v;
                                    best_dy = dy;
                                    best_dx = dx;
                                }
                            }
                        }
                        let g = grad_output.get(b, oh, ow, c);
                        let in_i =
                            grad_input.idx(b, oh * POOL + best_dy, ow * POOL + best_dx, c);
                        grad_input.data_mut()[in_i] += g;
                    }
                }
            }
        }

        Ok(grad_input)
    }

    fn output_shape(&self, input: [usize; 3]) -> Result<[usize; 3]> {
        let [h, w, c] = input;
        let out_h = h / POOL;
        let out_w = w / POOL;
        if out_h == 0 || out_w == 0 {
            return Err(NetworkError::Config(format!(
                "maxpool2d output would be non-positive for input {}x{}",
                h, w
            )));
        }
        Ok([out_h, out_w, c])
    }

    fn parameter_count(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maxpool_single_window() {
        let mut layer = MaxPool2D::new();
        let input = Tensor::from_vec(1, 2, 2, 1, vec![1.0, 2.0, 3.0, 4.0]).unwrap();

        let output = layer.forward(&input).unwrap();
        assert_eq!(output.shape(), [1, 1, 1, 1]);
        assert_eq!(output.get(0, 0, 0, 0), 4.0);
    }

    #[test]
    fn test_maxpool_backward_routes_to_argmax() {
        let mut layer = MaxPool2D::new();
        let input = Tensor::from_vec(1, 2, 2, 1, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        layer.forward(&input).unwrap();

        let grad = Tensor::from_vec(1, 1, 1, 1, vec![0.5]).unwrap();
        let grad_input = layer.backward(&grad, 0.01).unwrap();

        assert_eq!(grad_input.data(), &[0.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_maxpool_drops_odd_trailing_row_and_column() {
        let mut layer = MaxPool2D::new();
        let input = Tensor::zeros(1, 5, 5, 2);
        let output = layer.forward(&input).unwrap();
        assert_eq!(output.shape(), [1, 2, 2, 2]);
    }

    #[test]
    fn test_maxpool_rejects_degenerate_input() {
        let layer = MaxPool2D::new();
        assert!(layer.output_shape([1, 4, 3]).is_err());
    }

    #[test]
    fn test_maxpool_backward_requires_forward() {
        let mut layer = MaxPool2D::new();
        let grad = Tensor::zeros(1, 1, 1, 1);
        assert!(matches!(
            layer.backward(&grad, 0.0),
            Err(NetworkError::MissingForwardState { .. })
        ));
    }
}

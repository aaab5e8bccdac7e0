//! Activation functions for the network.
//!
//! ReLU and row-wise softmax are the only activations the topology uses.
//! The free functions operate in place on flat row-major buffers; the
//! [`Activation`] enum selects between them for dense layers.

use serde::Deserialize;

/// Closed set of dense-layer activations.
///
/// Parsing a config rejects anything that is not `"relu"` or `"softmax"`, so
/// an unsupported activation can never reach the math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Softmax,
}

impl Activation {
    /// Apply the activation to pre-activation values, in place.
    pub fn apply(self, values: &mut [f32], rows: usize, cols: usize) {
        match self {
            Activation::Relu => relu_inplace(values),
            Activation::Softmax => softmax_rows(values, rows, cols),
        }
    }
}

/// ReLU activation function applied in-place.
///
/// Sets all negative values to 0.0, keeps positive values unchanged.
pub fn relu_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

/// Softmax activation function applied row-wise.
///
/// Converts logits to probabilities for each row. Uses the max-subtraction
/// trick for numerical stability to avoid overflow with large values.
///
/// # Arguments
/// * `outputs` - Flat array containing row-major matrix data
/// * `rows` - Number of rows in the matrix
/// * `cols` - Number of columns in the matrix
pub fn softmax_rows(outputs: &mut [f32], rows: usize, cols: usize) {
    if cols == 0 {
        return;
    }
    assert_eq!(outputs.len(), rows * cols, "outputs length mismatch in softmax_rows");

    for row in outputs.chunks_exact_mut(cols).take(rows) {
        let mut max_value = row[0];
        for &value in row.iter().skip(1) {
            if value > max_value {
                max_value = value;
            }
        }

        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - max_value).exp();
            sum += *value;
        }

        let inv_sum = 1.0f32 / sum;
        for value in row.iter_mut() {
            *value *= inv_sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON_F32: f32 = 1e-6;

    #[test]
    fn test_relu_negative() {
        let mut data = vec![-1.0f32];
        relu_inplace(&mut data);
        assert_eq!(data[0], 0.0);
    }

    #[test]
    fn test_relu_mixed() {
        let mut data = vec![-2.0, -1.0, 0.0, 1.0, 2.0];
        relu_inplace(&mut data);
        assert_eq!(data, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_softmax_single_row_sum() {
        let mut data = vec![1.0, 2.0, 3.0];
        softmax_rows(&mut data, 1, 3);
        let sum: f32 = data.iter().sum();
        assert!((sum - 1.0).abs() < EPSILON_F32);
    }

    #[test]
    fn test_softmax_uniform_input() {
        let mut data = vec![1.0, 1.0, 1.0];
        softmax_rows(&mut data, 1, 3);
        for &val in &data {
            assert!((val - 1.0 / 3.0).abs() < EPSILON_F32);
        }
    }

    #[test]
    fn test_softmax_numerical_stability() {
        let mut data = vec![1000.0, 1001.0, 1002.0];
        softmax_rows(&mut data, 1, 3);
        let sum: f32 = data.iter().sum();
        assert!((sum - 1.0).abs() < EPSILON_F32);
        assert!(!data.iter().any(|&x| x.is_nan() || x.is_infinite()));
    }

    #[test]
    fn test_activation_applies_matching_function() {
        let mut relu_data = vec![-1.0, 2.0];
        Activation::Relu.apply(&mut relu_data, 1, 2);
        assert_eq!(relu_data, vec![0.0, 2.0]);

        let mut softmax_data = vec![0.0, 0.0];
        Activation::Softmax.apply(&mut softmax_data, 1, 2);
        assert_eq!(softmax_data, vec![0.5, 0.5]);
    }

    #[test]
    fn test_activation_parses_from_lowercase_tags() {
        let relu: Activation = serde_json::from_str("\"relu\"").unwrap();
        let softmax: Activation = serde_json::from_str("\"softmax\"").unwrap();
        assert_eq!(relu, Activation::Relu);
        assert_eq!(softmax, Activation::Softmax);
        assert!(serde_json::from_str::<Activation>("\"sigmoid\"").is_err());
    }
}

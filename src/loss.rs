//! Cross-entropy loss for integer class labels.
//!
//! The gradient function returns the combined softmax/cross-entropy gradient
//! `(p - onehot) / batch`, expressed w.r.t. the output layer's pre-activation.
//! It is fed directly into the final dense layer's backward call.

use crate::tensor::Matrix;

/// Guard against `ln(0)` on a zero predicted probability.
const EPS: f32 = 1e-15;

/// Mean negative log-likelihood of the true classes.
///
/// `predictions` holds softmax probabilities, one row per sample; `labels`
/// holds one class index per sample.
///
/// # Panics
///
/// Panics if `labels` and `predictions` disagree on the batch size, or if a
/// label is outside `[0, num_classes)`.
pub fn cross_entropy_loss(predictions: &Matrix, labels: &[usize]) -> f32 {
    assert_eq!(
        predictions.rows,
        labels.len(),
        "one label per prediction row required"
    );

    let mut total = 0.0f32;
    for (b, &label) in labels.iter().enumerate() {
        assert!(label < predictions.cols, "label {} out of range", label);
        total -= (predictions.get(b, label) + EPS).ln();
    }
    total / predictions.rows as f32
}

/// Gradient of the cross-entropy loss w.r.t. the softmax pre-activation.
///
/// Each row is a copy of the prediction row with 1 subtracted at the true
/// label's column, and the whole matrix is divided by the batch size.
///
/// # Panics
///
/// Same conditions as [`cross_entropy_loss`].
pub fn cross_entropy_gradient(predictions: &Matrix, labels: &[usize]) -> Matrix {
    assert_eq!(
        predictions.rows,
        labels.len(),
        "one label per prediction row required"
    );

    let batch = predictions.rows as f32;
    let mut gradient = predictions.clone();
    for (b, &label) in labels.iter().enumerate() {
        assert!(label < predictions.cols, "label {} out of range", label);
        let v = gradient.get(b, label) - 1.0;
        gradient.set(b, label, v);
    }
    for value in gradient.data.iter_mut() {
        *value /= batch;
    }
    gradient
}

// Tests for the sequential orchestrator: the flatten/unflatten bridge
// between the spatial and dense stages, and end-to-end training.

use approx::assert_relative_eq;

use convnet::layers::{Conv2D, DenseLayer, MaxPool2D};
use convnet::loss::cross_entropy_loss;
use convnet::sequential::Sequential;
use convnet::tensor::{Matrix, Tensor};
use convnet::utils::{Activation, SimpleRng};

// ============================================================================
// Flatten / unflatten bridge
// ============================================================================

#[test]
fn test_flatten_unflatten_round_trip_for_assorted_shapes() {
    for &(b, h, w, c) in &[(1, 1, 1, 1), (2, 3, 4, 5), (4, 7, 2, 3), (3, 2, 2, 1)] {
        let mut fill = SimpleRng::new((b * 1000 + h * 100 + w * 10 + c) as u64);
        let data: Vec<f32> = (0..b * h * w * c).map(|_| fill.next_f32() * 2.0 - 1.0).collect();
        let tensor = Tensor::from_vec(b, h, w, c, data).unwrap();

        let rows = tensor.flatten_rows();
        let back = Tensor::from_rows(&rows, tensor.shape()).unwrap();
        // Bit-for-bit equality, not approximate.
        assert_eq!(back, tensor);
    }
}

#[test]
fn test_flatten_is_row_major_over_height_width_channel() {
    // One sample, 2x2x2: position (h, w, c) must land at index
    // (h * W + w) * C + c of the feature row.
    let tensor = Tensor::from_vec(
        1,
        2,
        2,
        2,
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
    )
    .unwrap();
    let rows = tensor.flatten_rows();
    assert_eq!(rows.data, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    assert_eq!(rows.cols, 8);
}

#[test]
fn test_unflatten_rejects_mismatched_shape() {
    let rows = Matrix::zeros(2, 9);
    assert!(Tensor::from_rows(&rows, [2, 2, 2, 2]).is_err());
}

// ============================================================================
// Training loop
// ============================================================================

fn separable_dataset() -> (Tensor, Vec<usize>) {
    // Two constant images with very different intensity; trivially separable.
    let mut images = Tensor::zeros(2, 4, 4, 1);
    for h in 0..4 {
        for w in 0..4 {
            images.set(0, h, w, 0, 1.0);
            images.set(1, h, w, 0, 0.25);
        }
    }
    (images, vec![0, 1])
}

fn overfit_model(rng: &mut SimpleRng) -> Sequential {
    let mut model = Sequential::new();
    // 4x4 -> conv3 -> 2x2 -> pool -> 1x1, one channel
    let mut conv = Conv2D::new(1, 1, 3, 3, rng);
    // Start from a live kernel so the ReLU cannot be dead for either sample.
    conv.set_weights(vec![0.1; 9]);
    model.add_spatial_layer(Box::new(conv));
    model.add_spatial_layer(Box::new(MaxPool2D::new()));
    model.add_dense_layer(DenseLayer::new(1, 2, Activation::Softmax, rng));
    model
}

#[test]
fn test_fit_reduces_loss_on_fixed_seed_data() {
    let mut rng = SimpleRng::new(23);
    let mut model = overfit_model(&mut rng);
    let (images, labels) = separable_dataset();

    let before = cross_entropy_loss(&model.forward(&images).unwrap(), &labels);
    model.fit(50, &images, &labels, 2, 0.1).unwrap();
    let after = cross_entropy_loss(&model.forward(&images).unwrap(), &labels);

    assert!(
        after < before,
        "loss did not decrease: before={} after={}",
        before,
        after
    );
}

#[test]
fn test_fit_overfits_tiny_separable_dataset() {
    let mut rng = SimpleRng::new(23);
    let mut model = overfit_model(&mut rng);
    let (images, labels) = separable_dataset();

    let predictions = model.fit(2000, &images, &labels, 2, 0.2).unwrap();

    let final_loss = cross_entropy_loss(&predictions, &labels);
    assert!(final_loss < 0.1, "final loss {} not near zero", final_loss);
    assert_eq!(predictions.argmax_rows(), labels);
}

#[test]
fn test_fit_is_deterministic_for_a_fixed_seed() {
    let run = || {
        let mut rng = SimpleRng::new(23);
        let mut model = overfit_model(&mut rng);
        let (images, labels) = separable_dataset();
        model.fit(25, &images, &labels, 2, 0.1).unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.data, second.data);
}

#[test]
fn test_fit_returns_full_dataset_predictions() {
    let mut rng = SimpleRng::new(23);
    let mut model = overfit_model(&mut rng);
    let (images, labels) = separable_dataset();

    // batch_size larger than the dataset: a single short batch.
    let predictions = model.fit(3, &images, &labels, 32, 0.05).unwrap();
    assert_eq!(predictions.rows, 2);
    assert_eq!(predictions.cols, 2);
    for b in 0..2 {
        let sum: f32 = (0..2).map(|j| predictions.get(b, j)).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
    }
}

#[test]
fn test_fit_handles_a_final_partial_batch() {
    let mut rng = SimpleRng::new(31);
    let mut model = Sequential::new();
    model.add_spatial_layer(Box::new(Conv2D::new(1, 2, 3, 3, &mut rng)));
    model.add_dense_layer(DenseLayer::new(2 * 2 * 2, 2, Activation::Softmax, &mut rng));

    // 5 samples with batch_size 2: batches of 2, 2, and 1.
    let mut images = Tensor::zeros(5, 4, 4, 1);
    let mut fill = SimpleRng::new(7);
    for value in images.data_mut().iter_mut() {
        *value = fill.next_f32();
    }
    let labels = vec![0, 1, 0, 1, 0];

    let predictions = model.fit(2, &images, &labels, 2, 0.01).unwrap();
    assert_eq!(predictions.rows, 5);
}

#[test]
fn test_fit_rejects_empty_dataset() {
    let mut rng = SimpleRng::new(23);
    let mut model = overfit_model(&mut rng);
    let images = Tensor::zeros(0, 4, 4, 1);
    assert!(model.fit(1, &images, &[], 2, 0.1).is_err());
}

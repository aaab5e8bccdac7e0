//! Sequential model: spatial layers, a flatten step, then dense layers.
//!
//! The orchestrator owns an ordered list of spatial layers (convolution and
//! pooling, behind the [`SpatialLayer`] trait) followed by an ordered list of
//! dense layers. Forward propagation flattens the final spatial output into
//! per-sample feature rows; backward propagation unflattens the gradient with
//! the shape recorded during forward and walks both chains in reverse.

use crate::error::{NetworkError, Result};
use crate::layers::{DenseLayer, SpatialLayer};
use crate::loss::{cross_entropy_gradient, cross_entropy_loss};
use crate::tensor::{Matrix, Tensor};

/// Fixed linear chain of spatial layers followed by dense layers.
pub struct Sequential {
    spatial_layers: Vec<Box<dyn SpatialLayer>>,
    dense_layers: Vec<DenseLayer>,
    /// Shape of the last spatial-layer output, recorded by `forward` and
    /// required to unflatten the gradient in `backward`.
    last_spatial_shape: Option<[usize; 4]>,
}

impl Sequential {
    pub fn new() -> Self {
        Self {
            spatial_layers: Vec::new(),
            dense_layers: Vec::new(),
            last_spatial_shape: None,
        }
    }

    /// Append a convolution or pooling layer to the spatial chain.
    pub fn add_spatial_layer(&mut self, layer: Box<dyn SpatialLayer>) {
        self.spatial_layers.push(layer);
    }

    /// Append a dense layer to the dense chain.
    pub fn add_dense_layer(&mut self, layer: DenseLayer) {
        self.dense_layers.push(layer);
    }

    pub fn spatial_layer_count(&self) -> usize {
        self.spatial_layers.len()
    }

    pub fn dense_layer_count(&self) -> usize {
        self.dense_layers.len()
    }

    /// Output classes of the final dense layer, if any.
    pub fn num_classes(&self) -> Option<usize> {
        self.dense_layers.last().map(|l| l.output_size())
    }

    /// Total trainable parameters across both chains.
    pub fn parameter_count(&self) -> usize {
        let spatial: usize = self.spatial_layers.iter().map(|l| l.parameter_count()).sum();
        let dense: usize = self.dense_layers.iter().map(|l| l.parameter_count()).sum();
        spatial + dense
    }

    /// Run the full forward pass and return the class probabilities, one row
    /// per sample.
    pub fn forward(&mut self, batch: &Tensor) -> Result<Matrix> {
        let mut current = batch.clone();
        for layer in self.spatial_layers.iter_mut() {
            current = layer.forward(&current)?;
        }
        self.last_spatial_shape = Some(current.shape());

        let mut rows = current.flatten_rows();
        for layer in self.dense_layers.iter_mut() {
            rows = layer.forward(&rows)?;
        }
        Ok(rows)
    }

    /// Run the full backward pass, updating every layer's parameters in
    /// place. `grad_loss` is the cross-entropy gradient for the most recent
    /// forward output. The gradient w.r.t. the original input is discarded.
    pub fn backward(&mut self, grad_loss: &Matrix, learning_rate: f32) -> Result<()> {
        let spatial_shape = self
            .last_spatial_shape
            .ok_or(NetworkError::MissingForwardState { layer: "sequential" })?;

        let mut grad = grad_loss.clone();
        for layer in self.dense_layers.iter_mut().rev() {
            grad = layer.backward(&grad, learning_rate)?;
        }

        let mut grad_tensor = Tensor::from_rows(&grad, spatial_shape)?;
        for layer in self.spatial_layers.iter_mut().rev() {
            grad_tensor = layer.backward(&grad_tensor, learning_rate)?;
        }
        Ok(())
    }

    /// Mini-batch gradient descent on the cross-entropy objective.
    ///
    /// Iterates the dataset in contiguous fixed-size batches in original
    /// order (no shuffling); a final short batch uses whatever remains. Mean
    /// loss is reported on the first epoch, every tenth after that, and the
    /// final epoch. After all epochs, runs one forward pass over the whole
    /// dataset and returns its output.
    pub fn fit(
        &mut self,
        epochs: usize,
        images: &Tensor,
        labels: &[usize],
        batch_size: usize,
        learning_rate: f32,
    ) -> Result<Matrix> {
        let total = images.batch();
        if labels.len() != total {
            return Err(NetworkError::ShapeMismatch {
                layer: "sequential",
                expected: format!("{} labels", total),
                actual: format!("{} labels", labels.len()),
            });
        }
        if total == 0 {
            return Err(NetworkError::Config("training set is empty".to_string()));
        }
        if batch_size == 0 {
            return Err(NetworkError::Config("batch_size must be positive".to_string()));
        }
        let classes = match self.dense_layers.last() {
            Some(layer) => layer.output_size(),
            None => {
                return Err(NetworkError::Config(
                    "model has no dense layers".to_string(),
                ))
            }
        };
        if let Some(&bad) = labels.iter().find(|&&l| l >= classes) {
            return Err(NetworkError::Config(format!(
                "label {} out of range for {} classes",
                bad, classes
            )));
        }

        for epoch in 1..=epochs {
            let mut total_loss = 0.0f32;

            for start in (0..total).step_by(batch_size) {
                let end = (start + batch_size).min(total);
                let batch = images.slice_batch(start, end);
                let batch_labels = &labels[start..end];

                let predictions = self.forward(&batch)?;
                let grad = cross_entropy_gradient(&predictions, batch_labels);
                self.backward(&grad, learning_rate)?;

                // Each batch's mean loss is weighted by one more than its
                // sample count.
                let weight = (end - start + 1) as f32;
                total_loss += cross_entropy_loss(&predictions, batch_labels) * weight;
            }

            if epoch % 10 == 1 || epoch == epochs {
                println!("Epoch {:02} | loss={:.6}", epoch, total_loss / total as f32);
            }
        }

        self.forward(images)
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

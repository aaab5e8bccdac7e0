//! Dense array types used throughout the network.
//!
//! Spatial data flows through the convolutional stage as a [`Tensor`] indexed
//! as (batch, height, width, channel); the dense stage works on a row-major
//! [`Matrix`] of (batch, feature). Both are backed by contiguous `Vec<f32>`
//! buffers; every layer allocates a fresh output rather than aliasing its
//! input.

use crate::error::{NetworkError, Result};

/// 4-dimensional dense array, channel-last: (batch, height, width, channels).
///
/// The channel index varies fastest in memory, so flattening one sample in
/// row-major (height, width, channel) order is a contiguous copy.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    batch: usize,
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
}

impl Tensor {
    /// Zero-filled tensor with the given dimensions.
    pub fn zeros(batch: usize, height: usize, width: usize, channels: usize) -> Self {
        Self {
            batch,
            height,
            width,
            channels,
            data: vec![0.0; batch * height * width * channels],
        }
    }

    /// Wrap an existing buffer. The buffer length must equal the product of
    /// the dimensions.
    pub fn from_vec(
        batch: usize,
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = batch * height * width * channels;
        if data.len() != expected {
            return Err(NetworkError::ShapeMismatch {
                layer: "tensor",
                expected: format!("{} values for {}x{}x{}x{}", expected, batch, height, width, channels),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            batch,
            height,
            width,
            channels,
            data,
        })
    }

    /// Dimensions as (batch, height, width, channels).
    pub fn shape(&self) -> [usize; 4] {
        [self.batch, self.height, self.width, self.channels]
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of features per sample after flattening.
    pub fn sample_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Flat offset of (b, h, w, c).
    #[inline]
    pub fn idx(&self, b: usize, h: usize, w: usize, c: usize) -> usize {
        ((b * self.height + h) * self.width + w) * self.channels + c
    }

    #[inline]
    pub fn get(&self, b: usize, h: usize, w: usize, c: usize) -> f32 {
        self.data[self.idx(b, h, w, c)]
    }

    #[inline]
    pub fn set(&mut self, b: usize, h: usize, w: usize, c: usize, value: f32) {
        let i = self.idx(b, h, w, c);
        self.data[i] = value;
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Copy of the samples in `[start, end)` as a new tensor.
    pub fn slice_batch(&self, start: usize, end: usize) -> Tensor {
        assert!(start <= end && end <= self.batch, "batch range out of bounds");
        let sample = self.sample_len();
        Tensor {
            batch: end - start,
            height: self.height,
            width: self.width,
            channels: self.channels,
            data: self.data[start * sample..end * sample].to_vec(),
        }
    }

    /// Flatten every sample into a feature row, row-major over
    /// (height, width, channel). The inverse is [`Tensor::from_rows`].
    pub fn flatten_rows(&self) -> Matrix {
        Matrix::from_vec(self.batch, self.sample_len(), self.data.clone())
    }

    /// Rebuild a tensor of the given shape from flattened feature rows.
    /// Exact positional inverse of [`Tensor::flatten_rows`].
    pub fn from_rows(rows: &Matrix, shape: [usize; 4]) -> Result<Tensor> {
        let [batch, height, width, channels] = shape;
        if rows.rows != batch || rows.cols != height * width * channels {
            return Err(NetworkError::ShapeMismatch {
                layer: "tensor",
                expected: format!("{}x{} matrix", batch, height * width * channels),
                actual: format!("{}x{} matrix", rows.rows, rows.cols),
            });
        }
        Tensor::from_vec(batch, height, width, channels, rows.data.clone())
    }
}

/// 2-dimensional row-major array: (batch, feature).
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), rows * cols, "matrix buffer length mismatch");
        Matrix { rows, cols, data }
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: f32) {
        self.data[r * self.cols + c] = value;
    }

    /// Index of the largest value in each row, first occurrence on ties.
    pub fn argmax_rows(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.rows);
        for row in self.data.chunks_exact(self.cols) {
            let mut best = row[0];
            let mut arg = 0usize;
            for (j, &v) in row.iter().enumerate().skip(1) {
                if v > best {
                    best = v;
                    arg = j;
                }
            }
            out.push(arg);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_indexing_is_channel_last() {
        let mut t = Tensor::zeros(1, 2, 2, 3);
        t.set(0, 1, 0, 2, 7.0);
        // (b*H + h)*W + w)*C + c = ((0*2+1)*2+0)*3+2 = 8
        assert_eq!(t.data()[8], 7.0);
        assert_eq!(t.get(0, 1, 0, 2), 7.0);
    }

    #[test]
    fn test_tensor_from_vec_rejects_bad_length() {
        let result = Tensor::from_vec(1, 2, 2, 1, vec![0.0; 3]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flatten_round_trip_is_exact() {
        let data: Vec<f32> = (0..2 * 3 * 4 * 2).map(|i| i as f32 * 0.37).collect();
        let t = Tensor::from_vec(2, 3, 4, 2, data).unwrap();
        let flat = t.flatten_rows();
        assert_eq!(flat.rows, 2);
        assert_eq!(flat.cols, 24);
        let back = Tensor::from_rows(&flat, t.shape()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_slice_batch_copies_samples() {
        let data: Vec<f32> = (0..3 * 2 * 2 * 1).map(|i| i as f32).collect();
        let t = Tensor::from_vec(3, 2, 2, 1, data).unwrap();
        let s = t.slice_batch(1, 3);
        assert_eq!(s.shape(), [2, 2, 2, 1]);
        assert_eq!(s.get(0, 0, 0, 0), 4.0);
        assert_eq!(s.get(1, 1, 1, 0), 11.0);
    }

    #[test]
    fn test_matrix_argmax_rows_first_on_tie() {
        let m = Matrix::from_vec(2, 3, vec![0.1, 0.8, 0.1, 0.5, 0.5, 0.0]);
        assert_eq!(m.argmax_rows(), vec![1, 0]);
    }
}

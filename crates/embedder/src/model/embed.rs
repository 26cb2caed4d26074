//! The embedding capability boundary.

use burn::prelude::*;

/// Anything that maps an image batch to unit-norm embedding vectors.
///
/// Concrete architectures (shallow conv, deeper conv, MLP, ...) are
/// interchangeable implementers; the trainer and the retrieval metric only
/// see this capability. Implementations must return L2-normalized rows so
/// Euclidean distance is monotonic with cosine similarity.
pub trait ImageEmbedder<B: Backend> {
    /// Output dimension of [`embed`](ImageEmbedder::embed).
    fn embedding_dim(&self) -> usize;

    /// Map `(batch, C, H, W)` images to `(batch, dim)` unit vectors.
    fn embed(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

/// L2-normalize each row of a `(batch, dim)` tensor.
///
/// The norm is clamped away from zero so an all-zero row divides cleanly
/// instead of producing NaN.
pub fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = x.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(1e-12);
    x / norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_rows_have_unit_norm() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[3.0_f32, 4.0], [0.5, 0.0]]),
            &device,
        );

        let normed = l2_normalize(x);
        let rows: Vec<f32> = normed.into_data().to_vec().unwrap();
        let norm0 = (rows[0] * rows[0] + rows[1] * rows[1]).sqrt();
        let norm1 = (rows[2] * rows[2] + rows[3] * rows[3]).sqrt();
        assert!((norm0 - 1.0).abs() < 1e-5);
        assert!((norm1 - 1.0).abs() < 1e-5);
        // Direction preserved: 3-4-5 triangle.
        assert!((rows[0] - 0.6).abs() < 1e-5);
        assert!((rows[1] - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_zero_row_stays_finite() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[0.0_f32, 0.0, 0.0]]),
            &device,
        );
        let normed = l2_normalize(x);
        let rows: Vec<f32> = normed.into_data().to_vec().unwrap();
        assert!(rows.iter().all(|v| v.is_finite()));
    }
}

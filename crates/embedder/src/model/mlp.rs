//! Small MLP embedding network — cheap enough for tests and smoke runs.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;

use crate::error::TrainError;
use crate::model::embed::{l2_normalize, ImageEmbedder};

/// Configuration for [`MlpEmbeddingNet`].
#[derive(Config, Debug)]
pub struct MlpEmbeddingNetConfig {
    /// Flattened input size, `C * H * W`.
    pub input_elems: usize,
    /// Hidden layer width.
    #[config(default = 64)]
    pub hidden_dim: usize,
    /// Output embedding dimension.
    #[config(default = 32)]
    pub embedding_dim: usize,
}

/// Two-layer MLP embedder with L2-normalized output.
#[derive(Module, Debug)]
pub struct MlpEmbeddingNet<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    embedding_dim: usize,
}

impl MlpEmbeddingNetConfig {
    /// Initialize the network.
    ///
    /// # Errors
    /// `InvalidConfig` if any dimension is zero.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<MlpEmbeddingNet<B>, TrainError> {
        if self.input_elems == 0 || self.hidden_dim == 0 || self.embedding_dim == 0 {
            return Err(TrainError::InvalidConfig(
                "all MLP dimensions must be > 0".to_string(),
            ));
        }
        Ok(MlpEmbeddingNet {
            fc1: LinearConfig::new(self.input_elems, self.hidden_dim).init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.embedding_dim).init(device),
            embedding_dim: self.embedding_dim,
        })
    }
}

impl<B: Backend> ImageEmbedder<B> for MlpEmbeddingNet<B> {
    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn embed(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = images.flatten::<2>(1, 3);
        let x = relu(self.fc1.forward(x));
        let x = self.fc2.forward(x);
        l2_normalize(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = MlpEmbeddingNetConfig::new(12)
            .with_hidden_dim(8)
            .with_embedding_dim(4)
            .init::<TestBackend>(&device)
            .unwrap();

        let images = Tensor::<TestBackend, 4>::random(
            [5, 3, 2, 2],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let out = model.embed(images);
        assert_eq!(out.dims(), [5, 4]);
        assert_eq!(model.embedding_dim(), 4);
    }

    #[test]
    fn test_different_inputs_different_embeddings() {
        let device = Default::default();
        let model = MlpEmbeddingNetConfig::new(8)
            .init::<TestBackend>(&device)
            .unwrap();

        let a = Tensor::<TestBackend, 4>::random(
            [2, 2, 2, 2],
            Distribution::Normal(5.0, 1.0),
            &device,
        );
        let b = Tensor::<TestBackend, 4>::random(
            [2, 2, 2, 2],
            Distribution::Normal(-5.0, 1.0),
            &device,
        );

        let diff: f32 = (model.embed(a) - model.embed(b))
            .abs()
            .sum()
            .into_scalar()
            .elem();
        assert!(diff > 1e-6);
    }

    #[test]
    fn test_zero_dims_rejected() {
        let device = Default::default();
        let err = MlpEmbeddingNetConfig::new(0)
            .init::<TestBackend>(&device)
            .unwrap_err();
        assert!(matches!(err, TrainError::InvalidConfig(_)));
    }
}

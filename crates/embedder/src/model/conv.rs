//! Convolutional embedding network.
//!
//! Conv blocks (conv3x3-same → batch-norm → ReLU → max-pool) followed by a
//! two-layer FC head and L2 normalization. The `channels` list controls
//! depth: `[32, 64]` gives the shallow grayscale variant, `[32, 64, 128]`
//! the deeper RGB one.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::relu;

use crate::error::TrainError;
use crate::model::embed::{l2_normalize, ImageEmbedder};

/// Configuration for [`ConvEmbeddingNet`].
#[derive(Config, Debug)]
pub struct ConvEmbeddingNetConfig {
    /// Input channels (1 grayscale, 3 RGB).
    pub in_channels: usize,
    /// Input height == width in pixels.
    pub image_size: usize,
    /// Output embedding dimension.
    #[config(default = 32)]
    pub embedding_dim: usize,
    /// Output channels per conv block; each block halves the spatial size.
    #[config(default = "vec![32, 64]")]
    pub channels: Vec<usize>,
    /// Hidden width of the FC head.
    #[config(default = 256)]
    pub hidden_dim: usize,
}

/// One conv block: conv3x3 (same padding) → batch-norm → ReLU → max-pool 2x2.
#[derive(Module, Debug)]
struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            norm: BatchNormConfig::new(out_channels).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);
        let x = relu(x);
        self.pool.forward(x)
    }
}

/// Trainable conv embedding network; output rows are L2-normalized.
#[derive(Module, Debug)]
pub struct ConvEmbeddingNet<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    embedding_dim: usize,
}

impl ConvEmbeddingNetConfig {
    /// Initialize the network.
    ///
    /// # Errors
    /// `InvalidConfig` if any dimension is zero, the block list is empty,
    /// or the pooling chain shrinks the image below one pixel.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ConvEmbeddingNet<B>, TrainError> {
        if self.in_channels == 0 || self.image_size == 0 {
            return Err(TrainError::InvalidConfig(
                "in_channels and image_size must be > 0".to_string(),
            ));
        }
        if self.embedding_dim == 0 || self.hidden_dim == 0 {
            return Err(TrainError::InvalidConfig(
                "embedding_dim and hidden_dim must be > 0".to_string(),
            ));
        }
        if self.channels.is_empty() {
            return Err(TrainError::InvalidConfig(
                "at least one conv block is required".to_string(),
            ));
        }

        let mut size = self.image_size;
        for _ in &self.channels {
            size /= 2;
        }
        if size == 0 {
            return Err(TrainError::InvalidConfig(format!(
                "image_size {} collapses to zero pixels after {} pooling stages",
                self.image_size,
                self.channels.len()
            )));
        }

        let mut blocks = Vec::with_capacity(self.channels.len());
        let mut in_channels = self.in_channels;
        for &out_channels in &self.channels {
            blocks.push(ConvBlock::new(in_channels, out_channels, device));
            in_channels = out_channels;
        }

        let flat = in_channels * size * size;
        Ok(ConvEmbeddingNet {
            blocks,
            fc1: LinearConfig::new(flat, self.hidden_dim).init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.embedding_dim).init(device),
            embedding_dim: self.embedding_dim,
        })
    }
}

impl<B: Backend> ImageEmbedder<B> for ConvEmbeddingNet<B> {
    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn embed(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = x.flatten::<2>(1, 3);
        let x = relu(self.fc1.forward(x));
        let x = self.fc2.forward(x);
        l2_normalize(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::optim::GradientsParams;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_forward_shape_and_unit_norm() {
        let device = Default::default();
        let model = ConvEmbeddingNetConfig::new(1, 16)
            .with_embedding_dim(8)
            .init::<TestBackend>(&device)
            .unwrap();

        let images = Tensor::<TestBackend, 4>::random(
            [4, 1, 16, 16],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let out = model.embed(images);
        assert_eq!(out.dims(), [4, 8]);

        let norms: Vec<f32> = out
            .powf_scalar(2.0)
            .sum_dim(1)
            .sqrt()
            .into_data()
            .to_vec()
            .unwrap();
        for n in norms {
            assert!((n - 1.0).abs() < 1e-4, "expected unit norm, got {n}");
        }
    }

    #[test]
    fn test_deeper_variant() {
        let device = Default::default();
        let model = ConvEmbeddingNetConfig::new(3, 32)
            .with_channels(vec![32, 64, 128])
            .with_embedding_dim(16)
            .init::<TestBackend>(&device)
            .unwrap();

        let images = Tensor::<TestBackend, 4>::random(
            [2, 3, 32, 32],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(model.embed(images).dims(), [2, 16]);
    }

    #[test]
    fn test_too_many_pools_rejected() {
        let device = Default::default();
        let err = ConvEmbeddingNetConfig::new(1, 8)
            .with_channels(vec![8, 16, 32, 64])
            .init::<TestBackend>(&device)
            .unwrap_err();
        assert!(matches!(err, TrainError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_dim_rejected() {
        let device = Default::default();
        let err = ConvEmbeddingNetConfig::new(1, 16)
            .with_embedding_dim(0)
            .init::<TestBackend>(&device)
            .unwrap_err();
        assert!(matches!(err, TrainError::InvalidConfig(_)));
    }

    #[test]
    fn test_gradient_reaches_first_block() {
        let device = Default::default();
        let model = ConvEmbeddingNetConfig::new(1, 16)
            .with_embedding_dim(4)
            .init::<TestAutodiffBackend>(&device)
            .unwrap();

        let images = Tensor::<TestAutodiffBackend, 4>::random(
            [4, 1, 16, 16],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let loss = model.embed(images).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &model);

        let conv_grad = grads
            .get::<NdArray<f32>, 4>(model.blocks[0].conv.weight.id)
            .expect("first conv weight should have a gradient");
        let grad_sum: f32 = conv_grad.abs().sum().into_scalar().elem();
        assert!(grad_sum > 0.0, "gradient did not reach the first conv block");
    }
}

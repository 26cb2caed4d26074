//! Batched embedding extraction with a trained (non-autodiff) model.

use burn::module::Module;
use burn::prelude::*;

use pairdata::LabeledDataset;

use crate::checkpoint::load_model;
use crate::error::TrainError;
use crate::model::bridge::{images_to_tensor, tensor_to_rows};
use crate::model::embed::ImageEmbedder;

const DEFAULT_BATCH_SIZE: usize = 32;

/// Wraps a trained model with a device and batching policy.
pub struct Embedder<B: Backend, M: ImageEmbedder<B> + Module<B>> {
    model: M,
    device: B::Device,
    batch_size: usize,
}

impl<B: Backend, M: ImageEmbedder<B> + Module<B>> Embedder<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Restore a model from a checkpoint directory and wrap it.
    ///
    /// `fresh` must match the checkpointed architecture.
    pub fn load(
        dir: &std::path::Path,
        experiment: &str,
        fresh: M,
        device: B::Device,
    ) -> Result<Self, TrainError> {
        let model = load_model(dir, experiment, fresh, &device)?;
        Ok(Self::new(model, device))
    }

    pub fn embedding_dim(&self) -> usize {
        self.model.embedding_dim()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Embed flat image rows of shape `dims`, preserving input order.
    pub fn embed_rows(
        &self,
        rows: &[Vec<f32>],
        dims: [usize; 3],
    ) -> Result<Vec<Vec<f32>>, TrainError> {
        let mut out = Vec::with_capacity(rows.len());
        for (batch_index, chunk) in rows.chunks(self.batch_size).enumerate() {
            let batch = images_to_tensor::<B>(chunk, dims, batch_index, &self.device)?;
            out.extend(tensor_to_rows(self.model.embed(batch)));
        }
        Ok(out)
    }

    /// Embed an entire dataset, returning embeddings and labels in dataset
    /// order.
    pub fn embed_dataset(
        &self,
        data: &dyn LabeledDataset,
    ) -> Result<(Vec<Vec<f32>>, Vec<i64>), TrainError> {
        let dims = data.image_dims();
        let mut rows = Vec::with_capacity(data.len());
        let mut labels = Vec::with_capacity(data.len());
        for i in 0..data.len() {
            let (image, label) = data.get(i).ok_or(TrainError::Pair(
                pairdata::PairError::IndexOutOfBounds { index: i, len: data.len() },
            ))?;
            rows.push(image);
            labels.push(label);
        }
        let embeddings = self.embed_rows(&rows, dims)?;
        Ok((embeddings, labels))
    }
}

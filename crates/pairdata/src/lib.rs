//! Data layer for contrastive embedding training.
//!
//! Provides the random-access labeled dataset boundary, a per-class index
//! over dataset positions, a stratified positive/negative pair sampler, and
//! the pair dataset consumed by the training loop. Does NOT load or decode
//! real image formats — datasets arrive through the [`LabeledDataset`] trait.

pub mod dataset;
pub mod error;
pub mod index;
pub mod pair_dataset;
pub mod sampler;
pub mod synthetic;

pub use dataset::{InMemoryDataset, LabeledDataset};
pub use error::PairError;
pub use index::ClassIndex;
pub use pair_dataset::{PairDataset, PairItem, PairMode};
pub use sampler::{PairSampler, PairSamplerConfig, SingletonPolicy};
pub use synthetic::cluster_dataset;
